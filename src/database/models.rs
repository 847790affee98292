//! Database models
//!
//! Rust structs representing stored coupon records and the inputs
//! used to create and edit them. All models use serde for
//! serialization at the app boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Merchandise category, mirroring the capture pipeline's AI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponCategory {
    Cafe,
    ConvenienceStore,
    Mart,
    Bakery,
    ChickenPizza,
    BurgerSandwich,
    FastFood,
    Dining,
    IceCream,
    Dessert,
    DepartmentStore,
    GiftCard,
    Culture,
    FashionBeauty,
    GasTransport,
    Etc,
}

/// A stored gifticon record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: String,
    /// Barcode/PIN value; empty when no code was scanned.
    /// Non-empty values are unique across the store at creation time.
    pub code: String,
    pub brand: String,
    pub name: String,
    /// Opaque reference to the coupon image (local path, blob id or URL)
    pub image_ref: String,
    pub is_monetary: bool,
    /// Currency amount; only meaningful when `is_monetary` is true
    pub amount: Option<i64>,
    /// Calendar date with no time component; None means "never expires"
    pub expiry: Option<NaiveDate>,
    pub category: Option<CouponCategory>,
    pub memo: Option<String>,
    pub is_used: bool,
    /// Set exactly when `is_used` flips to true, cleared on the way back
    pub used_at: Option<DateTime<Utc>>,
    /// True while a share entry exists for this record
    pub shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Candidate record produced by the capture/analysis pipeline.
/// Brand and name may still be missing here; `CouponService::create`
/// rejects candidates without them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateCoupon {
    pub brand: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub image_ref: String,
    pub is_monetary: bool,
    pub amount: Option<i64>,
    pub expiry: Option<NaiveDate>,
    pub category: Option<CouponCategory>,
    pub memo: Option<String>,
}

/// Field-level edit applied to an existing coupon.
/// `None` leaves the field unchanged; the barcode is not editable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouponEdit {
    pub brand: Option<String>,
    pub name: Option<String>,
    pub is_monetary: Option<bool>,
    pub amount: Option<i64>,
    pub expiry: Option<NaiveDate>,
    pub category: Option<CouponCategory>,
    pub memo: Option<String>,
}

/// Share-link entry mapping a public share id to a coupon snapshot
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShareEntry {
    pub share_id: String,
    pub coupon_id: String,
    /// JSON-encoded coupon, refreshed whenever the coupon mutates
    pub snapshot: String,
    pub shared_at: DateTime<Utc>,
}
