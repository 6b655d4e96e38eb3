//! Event classification
//!
//! Turns a raw Syncthing event into at most one notification intent. Each
//! notification category is a `Rule`: an enable flag from the user's
//! preferences plus a classify function. Rules are tried in table order and
//! the first one that produces an intent wins, which is how an item error
//! takes precedence over a conflict for the same `ItemFinished` event.

use std::path::Path;

use crate::events::{EventType, RawEvent};
use crate::preferences::{NotifyOn, Preferences};

/// Filename substring Syncthing puts into conflict copies
pub const CONFLICT_MARKER: &str = ".sync-conflict-";

pub const MESSAGE_LIMIT: usize = 100;
pub const NAME_LIMIT: usize = 50;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    FolderError,
    ItemError,
    Conflict,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FolderError => "FolderError",
            Category::ItemError => "ItemError",
            Category::Conflict => "Conflict",
        }
    }
}

/// Identifies "the same underlying condition" within one batch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    FolderError { folder: String, message: String },
    ItemError { folder: String, item: String, error: String },
    Conflict { folder: String, item: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationIntent {
    pub category: Category,
    pub dedup_key: DedupKey,
    pub title: String,
    pub subtitle: String,
    pub body: String,
}

struct Rule {
    category: Category,
    event_type: EventType,
    enabled: fn(&NotifyOn) -> bool,
    classify: fn(&RawEvent) -> Option<NotificationIntent>,
}

const RULES: &[Rule] = &[
    Rule {
        category: Category::FolderError,
        event_type: EventType::FolderErrors,
        enabled: folder_errors_enabled,
        classify: folder_error,
    },
    Rule {
        category: Category::ItemError,
        event_type: EventType::ItemFinished,
        enabled: item_errors_enabled,
        classify: item_error,
    },
    Rule {
        category: Category::Conflict,
        event_type: EventType::ItemFinished,
        enabled: conflicts_enabled,
        classify: conflict,
    },
];

fn folder_errors_enabled(n: &NotifyOn) -> bool {
    n.folder_errors
}

fn item_errors_enabled(n: &NotifyOn) -> bool {
    n.item_errors
}

fn conflicts_enabled(n: &NotifyOn) -> bool {
    n.conflicts
}

/// Classify one event against the user's preferences.
pub fn classify(event: &RawEvent, prefs: &Preferences) -> Option<NotificationIntent> {
    RULES
        .iter()
        .filter(|rule| rule.event_type == event.event_type)
        .filter(|rule| (rule.enabled)(&prefs.notify_on))
        .find_map(|rule| {
            let intent = (rule.classify)(event)?;
            debug_assert_eq!(intent.category, rule.category);
            Some(intent)
        })
}

fn folder_error(event: &RawEvent) -> Option<NotificationIntent> {
    let errors = event.data.get("errors")?.as_array()?;
    let first = errors.first()?;
    let folder = event.data_str_or_unknown("folder");
    let message = first
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("Unknown error");

    Some(NotificationIntent {
        category: Category::FolderError,
        dedup_key: DedupKey::FolderError {
            folder: folder.to_string(),
            message: message.to_string(),
        },
        title: "Syncthing Folder Error".to_string(),
        subtitle: format!("Folder: {} ({} error(s))", folder, errors.len()),
        body: truncate(message, MESSAGE_LIMIT),
    })
}

fn item_error(event: &RawEvent) -> Option<NotificationIntent> {
    let error = item_error_text(event)?;
    let folder = event.data_str_or_unknown("folder");
    let item = event.data_str_or_unknown("item");

    Some(NotificationIntent {
        category: Category::ItemError,
        dedup_key: DedupKey::ItemError {
            folder: folder.to_string(),
            item: item.to_string(),
            error: error.to_string(),
        },
        title: "Syncthing Sync Error".to_string(),
        subtitle: format!("{} in {}", truncate(display_name(item), NAME_LIMIT), folder),
        body: truncate(error, MESSAGE_LIMIT),
    })
}

fn conflict(event: &RawEvent) -> Option<NotificationIntent> {
    if item_error_text(event).is_some() {
        return None;
    }

    let item = event.data_str_or_unknown("item");
    if !item.contains(CONFLICT_MARKER) {
        return None;
    }
    let folder = event.data_str_or_unknown("folder");

    Some(NotificationIntent {
        category: Category::Conflict,
        dedup_key: DedupKey::Conflict {
            folder: folder.to_string(),
            item: item.to_string(),
        },
        title: "Syncthing Conflict".to_string(),
        subtitle: format!("Folder: {}", folder),
        body: truncate(display_name(item), NAME_LIMIT),
    })
}

/// Non-empty `error` field of an `ItemFinished` event
fn item_error_text(event: &RawEvent) -> Option<&str> {
    event.data_str("error").filter(|e| !e.is_empty())
}

/// Final path component of a synced item
fn display_name(item: &str) -> &str {
    Path::new(item)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(item)
}

/// Cut `text` to at most `limit` characters, ending with `...` when shortened.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}
