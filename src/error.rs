//! Error types for syncthing-notifier

use std::path::PathBuf;
use thiserror::Error;

/// Failure to locate or read Syncthing's own configuration.
///
/// Always fatal: without an endpoint and API key there is nothing to monitor.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Syncthing config not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Syncthing config not found; searched {}", display_paths(.0))]
    NoneFound(Vec<PathBuf>),

    #[error("Invalid Syncthing config: {0}")]
    Invalid(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no default locations".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Preferences error: {0}")]
    Preferences(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, NotifierError>;
