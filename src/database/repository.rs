//! Repository layer — the coupon record store
//!
//! Durable CRUD over whole coupon records keyed by id, plus equality
//! lookup by barcode for duplicate detection. Records are always
//! written whole; partial field updates are a service-layer concern.

use super::models::{Coupon, ShareEntry};
use crate::error::{AppError, Result};
use sqlx::SqlitePool;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a coupon by id. The whole record is written
    /// in a single statement, so a reader never observes a partial
    /// update.
    pub async fn put(&self, coupon: &Coupon) -> Result<()> {
        upsert_coupon(&self.pool, coupon).await?;

        tracing::debug!("Stored coupon: {}", coupon.id);
        Ok(())
    }

    /// Write a coupon and refresh every share snapshot referencing it
    /// in one transaction, so the record and its share entries are
    /// never observed out of step.
    pub async fn put_refreshing_shares(&self, coupon: &Coupon, snapshot: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        upsert_coupon(&mut *tx, coupon).await?;

        sqlx::query("UPDATE shares SET snapshot = ? WHERE coupon_id = ?")
            .bind(snapshot)
            .bind(&coupon.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("Stored coupon {} and refreshed share snapshots", coupon.id);
        Ok(())
    }

    /// Get a coupon by id
    pub async fn get_by_id(&self, id: &str) -> Result<Coupon> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::CouponNotFound(id.to_string()))?;

        Ok(coupon)
    }

    /// Every stored coupon, in no particular order; ordering is the
    /// query engine's job.
    pub async fn get_all(&self) -> Result<Vec<Coupon>> {
        let coupons = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons")
            .fetch_all(&self.pool)
            .await?;

        Ok(coupons)
    }

    /// Delete a coupon. Idempotent: deleting a missing id is not an
    /// error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM coupons WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows > 0 {
            tracing::debug!("Deleted coupon: {}", id);
        }
        Ok(())
    }

    /// Delete a coupon and every share entry referencing it in one
    /// transaction. Idempotent; share resolution never sees a window
    /// where the record is gone but an entry lingers.
    pub async fn delete_with_shares(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM coupons WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM shares WHERE coupon_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("Deleted coupon {} and its share entries", id);
        Ok(())
    }

    /// Whether any stored record carries this non-empty barcode.
    /// Used only for pre-creation duplicate detection.
    pub async fn exists_by_code(&self, code: &str) -> Result<bool> {
        if code.is_empty() {
            return Ok(false);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM coupons WHERE code = ?)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    /// Remove all coupons (the explicit "wipe all data" operation)
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM coupons").execute(&self.pool).await?;

        tracing::info!("Cleared all coupons");
        Ok(())
    }

    /// Insert or replace a share entry
    pub async fn put_share(&self, entry: &ShareEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shares (share_id, coupon_id, snapshot, shared_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(share_id) DO UPDATE SET
                coupon_id = excluded.coupon_id,
                snapshot = excluded.snapshot,
                shared_at = excluded.shared_at
            "#,
        )
        .bind(&entry.share_id)
        .bind(&entry.coupon_id)
        .bind(&entry.snapshot)
        .bind(entry.shared_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Stored share entry: {}", entry.share_id);
        Ok(())
    }

    /// Look up a share entry by its public id
    pub async fn get_share(&self, share_id: &str) -> Result<Option<ShareEntry>> {
        let entry =
            sqlx::query_as::<_, ShareEntry>("SELECT * FROM shares WHERE share_id = ?")
                .bind(share_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(entry)
    }

    /// Remove a share entry; idempotent
    pub async fn delete_share(&self, share_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM shares WHERE share_id = ?")
            .bind(share_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Remove all share entries
    pub async fn clear_shares(&self) -> Result<()> {
        sqlx::query("DELETE FROM shares").execute(&self.pool).await?;

        Ok(())
    }

    /// Get/set settings
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Set setting: {} = {}", key, value);
        Ok(())
    }
}

/// Whole-record upsert, shared by the plain and transactional write
/// paths
async fn upsert_coupon<'e, E>(executor: E, coupon: &Coupon) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO coupons (
            id, code, brand, name, image_ref, is_monetary, amount,
            expiry, category, memo, is_used, used_at, shared,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            code = excluded.code,
            brand = excluded.brand,
            name = excluded.name,
            image_ref = excluded.image_ref,
            is_monetary = excluded.is_monetary,
            amount = excluded.amount,
            expiry = excluded.expiry,
            category = excluded.category,
            memo = excluded.memo,
            is_used = excluded.is_used,
            used_at = excluded.used_at,
            shared = excluded.shared,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&coupon.id)
    .bind(&coupon.code)
    .bind(&coupon.brand)
    .bind(&coupon.name)
    .bind(&coupon.image_ref)
    .bind(coupon.is_monetary)
    .bind(coupon.amount)
    .bind(coupon.expiry)
    .bind(coupon.category)
    .bind(&coupon.memo)
    .bind(coupon.is_used)
    .bind(coupon.used_at)
    .bind(coupon.shared)
    .bind(coupon.created_at)
    .bind(coupon.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}
