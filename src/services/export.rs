//! Export service
//!
//! Serializes the full record set to JSON and re-imports it through
//! the coordinator, so imported records go through the same validation
//! and duplicate detection as freshly captured ones.

use crate::database::{Coupon, Repository};
use crate::error::{AppError, Result};
use crate::services::coupons::CouponService;

/// Service for exporting and importing coupon data
#[derive(Clone)]
pub struct ExportService {
    repo: Repository,
    coupons: CouponService,
}

impl ExportService {
    pub fn new(repo: Repository, coupons: CouponService) -> Self {
        Self { repo, coupons }
    }

    /// Serialize every stored coupon to pretty JSON
    pub async fn export_json(&self) -> Result<String> {
        let coupons = self.repo.get_all().await?;

        tracing::info!("Exporting {} coupons", coupons.len());
        Ok(serde_json::to_string_pretty(&coupons)?)
    }

    /// Import a previously exported record set through the
    /// coordinator's restore path, so records keep their ids, used
    /// state and original timestamps. Records with a barcode that is
    /// already stored are skipped with a warning. Returns the number
    /// of records imported.
    pub async fn import_json(&self, payload: &str) -> Result<usize> {
        let records: Vec<Coupon> = serde_json::from_str(payload)?;
        let total = records.len();
        let mut imported = 0;

        for record in records {
            match self.coupons.restore(record).await {
                Ok(_) => imported += 1,
                Err(AppError::DuplicateCode(code)) => {
                    tracing::warn!("Skipping import of already-registered barcode {}", code);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!("Imported {}/{} coupons", imported, total);
        Ok(imported)
    }
}
