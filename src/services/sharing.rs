//! Sharing service — the share registry
//!
//! Maps public share ids to coupon snapshots so a separate limited
//! view can load one record and toggle its used state without full
//! store access. The share id equals the coupon id, and resolution
//! falls back to the record store directly, so links keep working even
//! when no registry entry was ever persisted.

use crate::database::{Coupon, Repository, ShareEntry};
use crate::error::{AppError, Result};
use crate::services::coupons::CouponService;
use chrono::{DateTime, Utc};

/// Service for producing and resolving share links
#[derive(Clone)]
pub struct SharingService {
    repo: Repository,
    coupons: CouponService,
}

impl SharingService {
    pub fn new(repo: Repository, coupons: CouponService) -> Self {
        Self { repo, coupons }
    }

    /// Create (or refresh) a share entry for a coupon and return the
    /// public share id. The coupon's `shared` flag is flipped through
    /// the coordinator so every open view sees it.
    pub async fn create_share(&self, coupon_id: &str, now: DateTime<Utc>) -> Result<String> {
        let coupon = self.coupons.set_shared(coupon_id, true, now).await?;

        let entry = ShareEntry {
            share_id: coupon.id.clone(),
            coupon_id: coupon.id.clone(),
            snapshot: serde_json::to_string(&coupon)?,
            shared_at: now,
        };
        self.repo.put_share(&entry).await?;

        tracing::info!("Created share link for coupon {}", coupon_id);
        Ok(entry.share_id)
    }

    /// Resolve a share id to coupon data.
    ///
    /// Checks the registry first, then falls back to treating the
    /// share id as a coupon id against the record store. A deleted
    /// coupon resolves to `ShareNotFound`, never to stale data,
    /// because deletion removes its registry entries.
    pub async fn resolve(&self, share_id: &str) -> Result<Coupon> {
        if let Some(entry) = self.repo.get_share(share_id).await? {
            let coupon: Coupon = serde_json::from_str(&entry.snapshot)?;
            return Ok(coupon);
        }

        match self.repo.get_by_id(share_id).await {
            Ok(coupon) => Ok(coupon),
            Err(AppError::CouponNotFound(_)) => {
                Err(AppError::ShareNotFound(share_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Toggle the used state of a shared coupon.
    ///
    /// Delegates to the coordinator using the coupon's real id; the
    /// coordinator refreshes any persisted snapshot, so a second
    /// resolve in the same session reflects the change before any
    /// broadcast propagates.
    pub async fn set_used_via_share(
        &self,
        share_id: &str,
        used: bool,
        now: DateTime<Utc>,
    ) -> Result<Coupon> {
        let resolved = self.resolve(share_id).await?;
        self.coupons.set_used(&resolved.id, used, now).await
    }

    /// Remove a share entry and clear the coupon's `shared` flag
    pub async fn revoke(&self, share_id: &str, now: DateTime<Utc>) -> Result<()> {
        let entry = self.repo.get_share(share_id).await?;
        self.repo.delete_share(share_id).await?;

        if let Some(entry) = entry {
            match self.coupons.set_shared(&entry.coupon_id, false, now).await {
                Ok(_) => {}
                // The coupon may already be gone; revoking is still done
                Err(AppError::CouponNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        tracing::info!("Revoked share link {}", share_id);
        Ok(())
    }
}
