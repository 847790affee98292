//! Settings service
//!
//! Persists per-user view preferences (sort field and order) in the
//! settings table, so the dashboard reopens the way it was left.
//! These are conveniences only; they carry no store invariants.

use crate::database::Repository;
use crate::error::Result;
use crate::query::{SortField, SortOrder};
use serde::{Deserialize, Serialize};

const VIEW_PREFS_KEY: &str = "view.sort";

/// Persisted sort preferences for the coupon list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPrefs {
    #[serde(default)]
    pub sort_field: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// Service for view preference persistence
#[derive(Clone)]
pub struct SettingsService {
    repo: Repository,
}

impl SettingsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Load the saved sort preferences, falling back to defaults when
    /// none were saved or the stored value no longer parses.
    pub async fn view_prefs(&self) -> Result<ViewPrefs> {
        match self.repo.get_setting(VIEW_PREFS_KEY).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(prefs) => Ok(prefs),
                Err(e) => {
                    tracing::warn!("Discarding unreadable sort preferences: {}", e);
                    Ok(ViewPrefs::default())
                }
            },
            None => Ok(ViewPrefs::default()),
        }
    }

    pub async fn set_view_prefs(&self, prefs: ViewPrefs) -> Result<()> {
        self.repo
            .set_setting(VIEW_PREFS_KEY, &serde_json::to_string(&prefs)?)
            .await
    }
}
