//! Services module
//!
//! Business logic services layered over the repository. The coupon
//! service is the sole writer; everything else reads through the
//! repository or delegates mutations to the coupon service.

pub mod coupons;
pub mod export;
pub mod reminders;
pub mod settings;
pub mod sharing;

pub use coupons::CouponService;
pub use export::ExportService;
pub use reminders::{ExpiryAlert, RemindersService};
pub use settings::{SettingsService, ViewPrefs};
pub use sharing::SharingService;
