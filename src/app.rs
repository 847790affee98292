//! Application wiring
//!
//! Builds the component graph once at startup: pool → repository →
//! services, all sharing one sync bus. Views hold references to the
//! services they need; there is no ambient global instance.

use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{
    CouponService, ExportService, RemindersService, SettingsService, SharingService,
};
use crate::sync::SyncBus;
use std::path::{Path, PathBuf};

/// One fully wired app instance
#[derive(Clone)]
pub struct App {
    pub data_dir: PathBuf,
    pub repo: Repository,
    pub sync: SyncBus,
    pub coupons: CouponService,
    pub sharing: SharingService,
    pub reminders: RemindersService,
    pub export: ExportService,
    pub settings: SettingsService,
}

impl App {
    /// Initialize storage under `data_dir` and wire every service
    pub async fn init(data_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing application at {:?}", data_dir);

        std::fs::create_dir_all(data_dir)?;

        let pool = create_pool(&data_dir.join("conkeep.db")).await?;
        let repo = Repository::new(pool);
        let sync = SyncBus::new();

        let coupons = CouponService::new(repo.clone(), sync.clone());
        let sharing = SharingService::new(repo.clone(), coupons.clone());
        let reminders = RemindersService::new(repo.clone());
        let export = ExportService::new(repo.clone(), coupons.clone());
        let settings = SettingsService::new(repo.clone());

        tracing::info!("Application initialized successfully");

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            repo,
            sync,
            coupons,
            sharing,
            reminders,
            export,
            settings,
        })
    }
}
