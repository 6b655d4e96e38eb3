//! Syncthing Notifier
//!
//! Follows a Syncthing daemon's event stream and raises desktop notifications
//! for folder errors, per-item sync errors and conflict copies.

pub mod classifier;
pub mod client;
pub mod config;
pub mod cursor;
pub mod dedup;
pub mod discovery;
pub mod error;
pub mod events;
pub mod monitor;
pub mod notifier;
pub mod preferences;

pub use classifier::{classify, Category, DedupKey, NotificationIntent};
pub use client::{EventSource, FetchOutcome, StreamClient};
pub use cursor::CursorStore;
pub use discovery::Endpoint;
pub use error::{DiscoveryError, NotifierError, Result};
pub use events::{EventType, RawEvent};
pub use monitor::{Monitor, MonitorState, MonitorStats};
pub use notifier::{DesktopNotifier, Notifier};
pub use preferences::{PreferenceStore, Preferences};
