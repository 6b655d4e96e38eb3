//! Runtime configuration
//!
//! Command-line flags (with environment fallbacks) and the locations of the
//! notifier's own state files.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::monitor::DEFAULT_POLL_TIMEOUT;

#[derive(Parser, Debug)]
#[command(name = "syncthing-notifier")]
#[command(version, about = "Desktop notifications for Syncthing errors and conflicts")]
pub struct Args {
    /// Path to Syncthing's config.xml (auto-detected when omitted)
    #[arg(long, env = "SYNCTHING_CONFIG")]
    pub syncthing_config: Option<PathBuf>,

    /// Directory for preferences and the event cursor
    #[arg(long, env = "SYNCTHING_NOTIFIER_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Server-side long-poll timeout in seconds
    #[arg(long, default_value_t = DEFAULT_POLL_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_timeout: u64,

    /// Skip the "Monitor Started" notification
    #[arg(long)]
    pub no_startup_notification: bool,
}

impl Args {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout)
    }

    pub fn paths(&self) -> Paths {
        match &self.config_dir {
            Some(dir) => Paths::in_dir(dir),
            None => Paths::default(),
        }
    }
}

/// Files owned by the notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub dir: PathBuf,
    pub preferences: PathBuf,
    pub cursor: PathBuf,
}

impl Paths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            preferences: dir.join("config.json"),
            cursor: dir.join("last_event_id"),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::in_dir(&config_dir.join("syncthing-notifier"))
    }
}
