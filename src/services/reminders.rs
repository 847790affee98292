//! Reminders service
//!
//! Scans the store for unused coupons nearing expiry and pushes
//! alerts to a consumer channel. Day counts come from the query
//! engine's `days_until_expiry`, never a local reimplementation, so a
//! reminder can never disagree with what the list shows.

use crate::config::{EXPIRING_SOON_DAYS, REMINDER_CHECK_INTERVAL_SECS};
use crate::database::Repository;
use crate::error::Result;
use crate::query;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Alert for one coupon nearing its expiry date
#[derive(Debug, Clone, Serialize)]
pub struct ExpiryAlert {
    pub coupon_id: String,
    pub brand: String,
    pub name: String,
    pub days_left: i64,
}

/// Reminders service with background scheduler
#[derive(Clone)]
pub struct RemindersService {
    repo: Repository,
}

impl RemindersService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Unused coupons with 0..=7 days remaining
    pub async fn upcoming_expiries(&self, now: DateTime<Utc>) -> Result<Vec<ExpiryAlert>> {
        let coupons = self.repo.get_all().await?;

        let alerts = coupons
            .iter()
            .filter(|c| !c.is_used)
            .filter_map(|c| match query::days_until_expiry(c.expiry, now) {
                Some(days) if (0..=EXPIRING_SOON_DAYS).contains(&days) => Some(ExpiryAlert {
                    coupon_id: c.id.clone(),
                    brand: c.brand.clone(),
                    name: c.name.clone(),
                    days_left: days,
                }),
                _ => None,
            })
            .collect();

        Ok(alerts)
    }

    /// Push at most one alert per coupon per day into the channel
    pub async fn check_and_notify(
        &self,
        now: DateTime<Utc>,
        tx: &mpsc::Sender<ExpiryAlert>,
    ) -> Result<()> {
        let today = now.date_naive().to_string();

        for alert in self.upcoming_expiries(now).await? {
            let key = format!("reminder.last_notified.{}", alert.coupon_id);
            if self.repo.get_setting(&key).await?.as_deref() == Some(today.as_str()) {
                continue;
            }
            self.repo.set_setting(&key, &today).await?;

            tracing::info!(
                "Coupon {} ({}) expires in {} days",
                alert.coupon_id,
                alert.name,
                alert.days_left
            );

            if tx.send(alert).await.is_err() {
                // Receiver gone; nothing left to notify
                break;
            }
        }

        Ok(())
    }

    /// Start the background scheduler
    pub fn start_scheduler(self, tx: mpsc::Sender<ExpiryAlert>) {
        tokio::spawn(async move {
            tracing::info!("Starting expiry reminder scheduler");

            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
                REMINDER_CHECK_INTERVAL_SECS,
            ));

            loop {
                interval.tick().await;

                if let Err(e) = self.check_and_notify(Utc::now(), &tx).await {
                    tracing::error!("Error checking expiring coupons: {}", e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{initialize_database, CandidateCoupon};
    use crate::services::coupons::CouponService;
    use crate::sync::SyncBus;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_services() -> (RemindersService, CouponService) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);
        let coupons = CouponService::new(repo.clone(), SyncBus::new());

        (RemindersService::new(repo), coupons)
    }

    async fn create_with_expiry(
        coupons: &CouponService,
        name: &str,
        days_from_now: i64,
        now: DateTime<Utc>,
    ) -> String {
        let coupon = coupons
            .create(
                CandidateCoupon {
                    brand: Some("GS25".to_string()),
                    name: Some(name.to_string()),
                    image_ref: "img".to_string(),
                    expiry: Some(now.date_naive() + Duration::days(days_from_now)),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        coupon.id
    }

    #[tokio::test]
    async fn test_upcoming_expiries_window() {
        let (reminders, coupons) = create_test_services().await;
        let now = Utc::now();

        create_with_expiry(&coupons, "today", 0, now).await;
        create_with_expiry(&coupons, "week", 7, now).await;
        create_with_expiry(&coupons, "later", 8, now).await;
        create_with_expiry(&coupons, "gone", -1, now).await;

        let alerts = reminders.upcoming_expiries(now).await.unwrap();
        let mut names: Vec<&str> = alerts.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, ["today", "week"]);
    }

    #[tokio::test]
    async fn test_used_coupons_are_not_alerted() {
        let (reminders, coupons) = create_test_services().await;
        let now = Utc::now();

        let id = create_with_expiry(&coupons, "soon", 2, now).await;
        coupons.set_used(&id, true, now).await.unwrap();

        let alerts = reminders.upcoming_expiries(now).await.unwrap();
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_check_and_notify_dedupes_per_day() {
        let (reminders, coupons) = create_test_services().await;
        let now = Utc::now();

        create_with_expiry(&coupons, "soon", 2, now).await;

        let (tx, mut rx) = mpsc::channel(8);

        reminders.check_and_notify(now, &tx).await.unwrap();
        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.name, "soon");
        assert_eq!(alert.days_left, 2);

        // Second run the same day stays quiet
        reminders.check_and_notify(now, &tx).await.unwrap();
        assert!(rx.try_recv().is_err());

        // A new day notifies again
        let tomorrow = now + Duration::days(1);
        reminders.check_and_notify(tomorrow, &tx).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().days_left, 1);
    }
}
