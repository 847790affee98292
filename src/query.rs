//! Query/derivation engine
//!
//! Pure functions of `(records, filter state, now)`. Every derivation
//! that depends on the clock takes `now` as an explicit parameter so
//! results are deterministic and testable. Nothing here performs I/O.

use crate::config::EXPIRING_SOON_DAYS;
use crate::database::models::{Coupon, CouponCategory};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Status filter applied to the coupon list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Used,
    Unused,
    Expired,
}

/// Field the coupon list is sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Expiry,
    CreatedAt,
    Brand,
    Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Transient per-view filter and sort state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterState {
    /// Free-text search over brand and product name
    pub query: String,
    /// Exact brand match when set
    pub brand: Option<String>,
    /// Exact category match when set
    pub category: Option<CouponCategory>,
    pub status: StatusFilter,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

/// Summary counters, always computed over the unfiltered record set.
/// They answer "how many coupons do I own", not "how many match my
/// search".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    /// Not used and not yet expired
    pub unused_count: usize,
    /// Unused with 0..=7 days remaining; always <= unused_count
    pub expiring_count: usize,
}

/// Result of running a query: the filtered, sorted list plus stats
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub items: Vec<Coupon>,
    pub stats: Stats,
}

/// Whole days until the expiry date, counted from the date of `now`.
/// A coupon expiring today yields 0 (still usable until midnight);
/// yesterday yields -1. `None` means "never expires" and compares as
/// later than any finite value.
pub fn days_until_expiry(expiry: Option<NaiveDate>, now: DateTime<Utc>) -> Option<i64> {
    expiry.map(|date| (date - now.date_naive()).num_days())
}

/// Whether a coupon's expiry date has passed
pub fn is_expired(coupon: &Coupon, now: DateTime<Utc>) -> bool {
    matches!(days_until_expiry(coupon.expiry, now), Some(days) if days < 0)
}

/// Unused, not expired, and within the expiring-soon window
pub fn is_expiring_soon(coupon: &Coupon, now: DateTime<Utc>) -> bool {
    !coupon.is_used
        && matches!(
            days_until_expiry(coupon.expiry, now),
            Some(days) if (0..=EXPIRING_SOON_DAYS).contains(&days)
        )
}

/// Run the full derivation: filter, sort, and aggregate.
pub fn run_query(records: &[Coupon], filter: &FilterState, now: DateTime<Utc>) -> QueryResult {
    let stats = compute_stats(records, now);

    let mut items: Vec<Coupon> = records
        .iter()
        .filter(|coupon| matches_filter(coupon, filter, now))
        .cloned()
        .collect();

    items.sort_by(|a, b| compare(a, b, filter.sort_field, filter.sort_order));

    QueryResult { items, stats }
}

/// Aggregate counters over the unfiltered record set
pub fn compute_stats(records: &[Coupon], now: DateTime<Utc>) -> Stats {
    Stats {
        total: records.len(),
        unused_count: records
            .iter()
            .filter(|c| !c.is_used && !is_expired(c, now))
            .count(),
        expiring_count: records.iter().filter(|c| is_expiring_soon(c, now)).count(),
    }
}

fn matches_filter(coupon: &Coupon, filter: &FilterState, now: DateTime<Utc>) -> bool {
    if !filter.query.is_empty() {
        let needle = filter.query.to_lowercase();
        let hit = coupon.brand.to_lowercase().contains(&needle)
            || coupon.name.to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }

    if let Some(brand) = &filter.brand {
        if &coupon.brand != brand {
            return false;
        }
    }

    if let Some(category) = filter.category {
        if coupon.category != Some(category) {
            return false;
        }
    }

    match filter.status {
        StatusFilter::All => true,
        StatusFilter::Used => coupon.is_used,
        StatusFilter::Unused => !coupon.is_used && !is_expired(coupon, now),
        StatusFilter::Expired => is_expired(coupon, now),
    }
}

fn compare(a: &Coupon, b: &Coupon, field: SortField, order: SortOrder) -> Ordering {
    let ordering = match field {
        SortField::Expiry => {
            // Records without a deadline always sort last; this rule
            // never flips with the sort order.
            return match (a.expiry, b.expiry) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => apply_order(x.cmp(&y), order),
            };
        }
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Brand => a.brand.to_lowercase().cmp(&b.brand.to_lowercase()),
        SortField::Amount => a.amount.unwrap_or(0).cmp(&b.amount.unwrap_or(0)),
    };

    apply_order(ordering, order)
}

fn apply_order(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}
