//! ConKeep core
//!
//! Local gifticon (gift-card/coupon) store: persists coupon records,
//! keeps every open view consistent as records change, and derives
//! filtered/sorted lists and aggregate counts deterministically from
//! stored records plus an explicit clock. Capture, barcode decoding,
//! AI analysis and UI are external collaborators.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod query;
pub mod services;
pub mod sync;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging. Call once from the hosting binary.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conkeep=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
