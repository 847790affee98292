//! Application configuration constants
//!
//! Central location for all configuration constants, resource limits,
//! and validation boundaries used throughout the application.

// ===== Expiry Windows =====

/// Number of days (inclusive) before expiry at which a coupon counts
/// as "expiring soon" in aggregate stats and reminder checks.
pub const EXPIRING_SOON_DAYS: i64 = 7;

// ===== Reminder Scheduler =====

/// Interval between background scans for expiring coupons.
/// One hour keeps reminders timely without hammering the database.
pub const REMINDER_CHECK_INTERVAL_SECS: u64 = 3600;

// ===== Sync Bus =====

/// Buffered capacity of the change-event broadcast channel.
/// A lagged subscriber re-runs its query anyway, so a small buffer
/// is sufficient.
pub const SYNC_BUS_CAPACITY: usize = 64;

// ===== Validation Limits =====

/// Maximum length for brand and product name fields.
pub const MAX_FIELD_LENGTH: usize = 200;

/// Maximum length for a scanned barcode/PIN value.
pub const MAX_CODE_LENGTH: usize = 128;

/// Maximum length for the free-form user memo.
pub const MAX_MEMO_LENGTH: usize = 2000;
