//! Coupon service — the mutation coordinator
//!
//! The only component that constructs or transitions coupon records.
//! Enforces the store invariants: required fields, unique non-empty
//! barcodes at creation, `used_at` set iff `is_used`, and `amount`
//! cleared when a coupon is not monetary. Every successful mutation
//! broadcasts a change event on the sync bus; failures leave the store
//! untouched and broadcast nothing.

use crate::config::{MAX_CODE_LENGTH, MAX_FIELD_LENGTH, MAX_MEMO_LENGTH};
use crate::database::{CandidateCoupon, Coupon, CouponEdit, Repository};
use crate::error::{AppError, Result};
use crate::sync::{ChangeEvent, SyncBus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Service for managing coupon records
#[derive(Clone)]
pub struct CouponService {
    repo: Repository,
    sync: SyncBus,
}

impl CouponService {
    pub fn new(repo: Repository, sync: SyncBus) -> Self {
        Self { repo, sync }
    }

    /// Validate a candidate and register it as a new coupon.
    ///
    /// Fails with `DuplicateCode` when the candidate carries a
    /// non-empty barcode that is already stored; no write happens in
    /// that case.
    pub async fn create(&self, candidate: CandidateCoupon, now: DateTime<Utc>) -> Result<Coupon> {
        let brand = required_field(candidate.brand, "brand")?;
        let name = required_field(candidate.name, "product name")?;
        let code = candidate.code.unwrap_or_default().trim().to_string();

        if code.len() > MAX_CODE_LENGTH {
            return Err(AppError::Validation(format!(
                "barcode exceeds {} characters",
                MAX_CODE_LENGTH
            )));
        }
        validate_memo(&candidate.memo)?;

        if !code.is_empty() && self.repo.exists_by_code(&code).await? {
            return Err(AppError::DuplicateCode(code));
        }

        let amount = normalize_amount(candidate.is_monetary, candidate.amount)?;

        let coupon = Coupon {
            id: Uuid::new_v4().to_string(),
            code,
            brand,
            name,
            image_ref: candidate.image_ref,
            is_monetary: candidate.is_monetary,
            amount,
            expiry: candidate.expiry,
            category: candidate.category,
            memo: candidate.memo,
            is_used: false,
            used_at: None,
            shared: false,
            created_at: now,
            updated_at: now,
        };

        self.repo.put(&coupon).await?;

        tracing::info!("Registered coupon {} ({} / {})", coupon.id, coupon.brand, coupon.name);
        self.sync.broadcast(ChangeEvent::created(&coupon.id));

        Ok(coupon)
    }

    /// Get a coupon by id
    pub async fn get(&self, id: &str) -> Result<Coupon> {
        self.repo.get_by_id(id).await
    }

    /// Every stored coupon; ordering and filtering are the query
    /// engine's job.
    pub async fn list(&self) -> Result<Vec<Coupon>> {
        self.repo.get_all().await
    }

    /// Flip the used state. Idempotent: marking an already-used coupon
    /// used again only refreshes `updated_at`.
    pub async fn set_used(&self, id: &str, used: bool, now: DateTime<Utc>) -> Result<Coupon> {
        let mut coupon = self.repo.get_by_id(id).await?;

        // used_at marks the false→true transition; a redundant call
        // leaves it alone
        if used && !coupon.is_used {
            coupon.used_at = Some(now);
        } else if !used {
            coupon.used_at = None;
        }
        coupon.is_used = used;
        coupon.updated_at = now;

        self.write_back(&coupon).await?;

        tracing::debug!("Coupon {} marked {}", id, if used { "used" } else { "unused" });
        self.sync.broadcast(ChangeEvent::updated(id, used));

        Ok(coupon)
    }

    /// Apply a field-level edit, re-validating required fields
    pub async fn update(&self, id: &str, edit: CouponEdit, now: DateTime<Utc>) -> Result<Coupon> {
        let mut coupon = self.repo.get_by_id(id).await?;

        if let Some(brand) = edit.brand {
            coupon.brand = brand;
        }
        if let Some(name) = edit.name {
            coupon.name = name;
        }
        if let Some(is_monetary) = edit.is_monetary {
            coupon.is_monetary = is_monetary;
        }
        if let Some(amount) = edit.amount {
            coupon.amount = Some(amount);
        }
        if let Some(expiry) = edit.expiry {
            coupon.expiry = Some(expiry);
        }
        if let Some(category) = edit.category {
            coupon.category = Some(category);
        }
        if edit.memo.is_some() {
            coupon.memo = edit.memo;
        }

        coupon.brand = required_field(Some(coupon.brand), "brand")?;
        coupon.name = required_field(Some(coupon.name), "product name")?;
        validate_memo(&coupon.memo)?;
        coupon.amount = normalize_amount(coupon.is_monetary, coupon.amount)?;
        coupon.updated_at = now;

        self.write_back(&coupon).await?;

        tracing::debug!("Updated coupon {}", id);
        self.sync.broadcast(ChangeEvent::updated(id, coupon.is_used));

        Ok(coupon)
    }

    /// Record whether a share link exists for the coupon
    pub async fn set_shared(&self, id: &str, shared: bool, now: DateTime<Utc>) -> Result<Coupon> {
        let mut coupon = self.repo.get_by_id(id).await?;

        coupon.shared = shared;
        coupon.updated_at = now;

        self.write_back(&coupon).await?;

        self.sync.broadcast(ChangeEvent::updated(id, coupon.is_used));

        Ok(coupon)
    }

    /// Delete a coupon and invalidate any share entries pointing at
    /// it, in one transaction, so a later share resolution reports
    /// not-found instead of serving stale data. Idempotent.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.repo.delete_with_shares(id).await?;

        tracing::info!("Deleted coupon {}", id);
        self.sync.broadcast(ChangeEvent::deleted(id));

        Ok(())
    }

    /// Wipe every coupon and share entry
    pub async fn wipe_all(&self) -> Result<()> {
        self.repo.clear().await?;
        self.repo.clear_shares().await?;

        tracing::info!("Wiped all coupon data");
        self.sync.broadcast(ChangeEvent::cleared());

        Ok(())
    }

    /// Re-register a previously exported record, keeping its id, used
    /// state and timestamps. Duplicate barcodes are rejected exactly
    /// as in `create`; share entries are never part of an archive, so
    /// the restored record starts unshared.
    pub async fn restore(&self, record: Coupon) -> Result<Coupon> {
        let brand = required_field(Some(record.brand), "brand")?;
        let name = required_field(Some(record.name), "product name")?;
        let code = record.code.trim().to_string();

        if code.len() > MAX_CODE_LENGTH {
            return Err(AppError::Validation(format!(
                "barcode exceeds {} characters",
                MAX_CODE_LENGTH
            )));
        }
        validate_memo(&record.memo)?;

        if !code.is_empty() && self.repo.exists_by_code(&code).await? {
            return Err(AppError::DuplicateCode(code));
        }

        let amount = normalize_amount(record.is_monetary, record.amount)?;

        let coupon = Coupon {
            id: record.id,
            code,
            brand,
            name,
            image_ref: record.image_ref,
            is_monetary: record.is_monetary,
            amount,
            expiry: record.expiry,
            category: record.category,
            memo: record.memo,
            is_used: record.is_used,
            // Re-establish the used_at iff is_used invariant for
            // archives written by other variants
            used_at: if record.is_used {
                Some(record.used_at.unwrap_or(record.updated_at))
            } else {
                None
            },
            shared: false,
            created_at: record.created_at,
            updated_at: record.updated_at.max(record.created_at),
        };

        self.repo.put(&coupon).await?;

        tracing::info!("Restored coupon {} ({} / {})", coupon.id, coupon.brand, coupon.name);
        self.sync.broadcast(ChangeEvent::created(&coupon.id));

        Ok(coupon)
    }

    /// Persist a mutated record; when it is shared, the record write
    /// and the share-snapshot refresh land in one transaction so a
    /// failure leaves no partial effect.
    async fn write_back(&self, coupon: &Coupon) -> Result<()> {
        if coupon.shared {
            let snapshot = serde_json::to_string(coupon)?;
            self.repo.put_refreshing_shares(coupon, &snapshot).await
        } else {
            self.repo.put(coupon).await
        }
    }
}

fn required_field(value: Option<String>, label: &str) -> Result<String> {
    let value = value.unwrap_or_default().trim().to_string();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", label)));
    }
    if value.len() > MAX_FIELD_LENGTH {
        return Err(AppError::Validation(format!(
            "{} exceeds {} characters",
            label, MAX_FIELD_LENGTH
        )));
    }
    Ok(value)
}

fn validate_memo(memo: &Option<String>) -> Result<()> {
    if let Some(memo) = memo {
        if memo.len() > MAX_MEMO_LENGTH {
            return Err(AppError::Validation(format!(
                "memo exceeds {} characters",
                MAX_MEMO_LENGTH
            )));
        }
    }
    Ok(())
}

fn normalize_amount(is_monetary: bool, amount: Option<i64>) -> Result<Option<i64>> {
    match amount {
        Some(value) if value < 0 => Err(AppError::Validation(
            "amount must be non-negative".to_string(),
        )),
        // A non-monetary coupon carries no amount
        _ if !is_monetary => Ok(None),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_service() -> CouponService {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        CouponService::new(Repository::new(pool), SyncBus::new())
    }

    fn candidate(brand: &str, name: &str, code: &str) -> CandidateCoupon {
        CandidateCoupon {
            brand: Some(brand.to_string()),
            name: Some(name.to_string()),
            code: Some(code.to_string()),
            image_ref: "blobs/test.png".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_fills_metadata() {
        let service = create_test_service().await;
        let now = Utc::now();

        let coupon = service
            .create(candidate("Starbucks", "Americano", "12345"), now)
            .await
            .unwrap();

        assert!(!coupon.id.is_empty());
        assert!(!coupon.is_used);
        assert!(coupon.used_at.is_none());
        assert_eq!(coupon.created_at, now);
        assert_eq!(coupon.updated_at, now);
    }

    #[tokio::test]
    async fn test_create_requires_brand_and_name() {
        let service = create_test_service().await;

        let result = service
            .create(candidate("  ", "Americano", ""), Utc::now())
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = service
            .create(candidate("Starbucks", "", ""), Utc::now())
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let list = service.list().await.unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected_without_write() {
        let service = create_test_service().await;

        service
            .create(candidate("Starbucks", "Americano", "12345"), Utc::now())
            .await
            .unwrap();

        let result = service
            .create(candidate("Ediya", "Latte", "12345"), Utc::now())
            .await;
        assert!(matches!(result, Err(AppError::DuplicateCode(_))));

        let list = service.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].brand, "Starbucks");
    }

    #[tokio::test]
    async fn test_empty_codes_never_collide() {
        let service = create_test_service().await;

        service
            .create(candidate("Starbucks", "Americano", ""), Utc::now())
            .await
            .unwrap();
        service
            .create(candidate("Ediya", "Latte", ""), Utc::now())
            .await
            .unwrap();

        assert_eq!(service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_amount_cleared_for_non_monetary() {
        let service = create_test_service().await;

        let mut cand = candidate("Starbucks", "Americano", "");
        cand.is_monetary = false;
        cand.amount = Some(4500);

        let coupon = service.create(cand, Utc::now()).await.unwrap();
        assert_eq!(coupon.amount, None);
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let service = create_test_service().await;

        let mut cand = candidate("Starbucks", "Americano", "");
        cand.is_monetary = true;
        cand.amount = Some(-1);

        let result = service.create(cand, Utc::now()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_set_used_is_idempotent() {
        let service = create_test_service().await;
        let now = Utc::now();

        let coupon = service
            .create(candidate("Starbucks", "Americano", ""), now)
            .await
            .unwrap();

        let first = service.set_used(&coupon.id, true, now).await.unwrap();
        assert!(first.is_used);
        assert_eq!(first.used_at, Some(now));

        // Marking an already-used coupon used again may only move
        // updated_at; used_at keeps the original transition time
        let later = now + chrono::Duration::minutes(5);
        let second = service.set_used(&coupon.id, true, later).await.unwrap();
        assert!(second.is_used);
        assert_eq!(second.used_at, Some(now));
        assert_eq!(second.updated_at, later);
        assert_eq!(second.id, first.id);

        // And back: used_at must clear with is_used
        let unused = service.set_used(&coupon.id, false, later).await.unwrap();
        assert!(!unused.is_used);
        assert!(unused.used_at.is_none());

        // A fresh false→true transition records the new time
        let again = now + chrono::Duration::minutes(10);
        let reused = service.set_used(&coupon.id, true, again).await.unwrap();
        assert_eq!(reused.used_at, Some(again));
    }

    #[tokio::test]
    async fn test_set_used_on_missing_id_fails() {
        let service = create_test_service().await;

        let result = service.set_used("missing", true, Utc::now()).await;
        assert!(matches!(result, Err(AppError::CouponNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_re_validates_required_fields() {
        let service = create_test_service().await;
        let now = Utc::now();

        let coupon = service
            .create(candidate("Starbucks", "Americano", ""), now)
            .await
            .unwrap();

        let result = service
            .update(
                &coupon.id,
                CouponEdit {
                    brand: Some("   ".to_string()),
                    ..Default::default()
                },
                now,
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        // The stored record is unchanged
        let stored = service.get(&coupon.id).await.unwrap();
        assert_eq!(stored.brand, "Starbucks");
    }

    #[tokio::test]
    async fn test_update_bumps_updated_at_only() {
        let service = create_test_service().await;
        let created = Utc::now();

        let coupon = service
            .create(candidate("Starbucks", "Americano", ""), created)
            .await
            .unwrap();

        let edited = created + chrono::Duration::hours(1);
        let updated = service
            .update(
                &coupon.id,
                CouponEdit {
                    name: Some("Caffe Latte".to_string()),
                    ..Default::default()
                },
                edited,
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Caffe Latte");
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.updated_at, edited);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_broadcast() {
        let service = create_test_service().await;

        let coupon = service
            .create(candidate("Starbucks", "Americano", ""), Utc::now())
            .await
            .unwrap();

        service.delete(&coupon.id).await.unwrap();
        assert!(matches!(
            service.get(&coupon.id).await,
            Err(AppError::CouponNotFound(_))
        ));

        // Deleting again is nothing-to-do, not an error
        service.delete(&coupon.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_mutations_broadcast_events() {
        let service = create_test_service().await;
        let mut rx = service.sync.subscribe();
        let now = Utc::now();

        let coupon = service
            .create(candidate("Starbucks", "Americano", ""), now)
            .await
            .unwrap();
        service.set_used(&coupon.id, true, now).await.unwrap();
        service.delete(&coupon.id).await.unwrap();

        use crate::sync::ChangeKind;
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Created);

        let updated = rx.recv().await.unwrap();
        assert_eq!(updated.kind, ChangeKind::Updated);
        assert_eq!(updated.is_used, Some(true));

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Deleted);
    }

    #[tokio::test]
    async fn test_failed_create_broadcasts_nothing() {
        let service = create_test_service().await;

        service
            .create(candidate("Starbucks", "Americano", "12345"), Utc::now())
            .await
            .unwrap();

        let mut rx = service.sync.subscribe();
        let result = service
            .create(candidate("Ediya", "Latte", "12345"), Utc::now())
            .await;
        assert!(matches!(result, Err(AppError::DuplicateCode(_))));

        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_wipe_all() {
        let service = create_test_service().await;

        service
            .create(candidate("Starbucks", "Americano", "1"), Utc::now())
            .await
            .unwrap();
        service
            .create(candidate("Ediya", "Latte", "2"), Utc::now())
            .await
            .unwrap();

        service.wipe_all().await.unwrap();

        assert!(service.list().await.unwrap().is_empty());
    }
}
