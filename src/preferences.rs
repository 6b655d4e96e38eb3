//! User notification preferences
//!
//! Stored as pretty-printed JSON next to the cursor file. Fields missing from
//! the file take their default values, so older files keep working.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NotifierError, Result};

/// Current preferences format version
pub const PREFERENCES_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub version: String,
    pub notify_on: NotifyOn,
    pub notification_sound: bool,
    /// Seconds to wait before retrying after a failed fetch
    pub check_interval_on_error: u64,
}

/// Per-category enable flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyOn {
    pub folder_errors: bool,
    pub item_errors: bool,
    pub conflicts: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION.to_string(),
            notify_on: NotifyOn::default(),
            notification_sound: true,
            check_interval_on_error: 5,
        }
    }
}

impl Default for NotifyOn {
    fn default() -> Self {
        Self {
            folder_errors: true,
            item_errors: true,
            conflicts: true,
        }
    }
}

impl Preferences {
    pub fn error_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_on_error)
    }
}

/// Loads and saves [`Preferences`] at a fixed path.
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences, writing defaults on first run.
    ///
    /// A file that can't be read or parsed is left alone and the defaults are
    /// used for this run.
    pub fn load_or_create(&self) -> Result<Preferences> {
        if !self.path.exists() {
            let prefs = Preferences::default();
            self.save(&prefs)?;
            tracing::info!("Created default config at: {}", self.path.display());
            return Ok(prefs);
        }

        let mut prefs = match self.read() {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!("Failed to load config: {}", e);
                return Ok(Preferences::default());
            }
        };

        if prefs.version != PREFERENCES_VERSION {
            tracing::info!(
                "Migrating preferences from version {} to {}",
                prefs.version,
                PREFERENCES_VERSION
            );
            prefs.version = PREFERENCES_VERSION.to_string();
            if let Err(e) = self.save(&prefs) {
                tracing::warn!("Failed to save migrated config: {}", e);
            }
        }

        Ok(prefs)
    }

    fn read(&self) -> Result<Preferences> {
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| NotifierError::Preferences(format!("{}: {}", self.path.display(), e)))
    }

    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, content)?;

        Ok(())
    }
}
