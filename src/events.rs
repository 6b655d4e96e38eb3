//! Syncthing event stream types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Event types the monitor subscribes to.
///
/// Anything else the daemon might send is folded into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    FolderErrors,
    ItemFinished,
    /// Folder state heartbeat; keeps the long-poll responsive, never notified
    StateChanged,
    #[serde(other)]
    Other,
}

impl EventType {
    /// Types requested from `/rest/events`
    pub const SUBSCRIBED: [EventType; 3] = [
        EventType::FolderErrors,
        EventType::ItemFinished,
        EventType::StateChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::FolderErrors => "FolderErrors",
            EventType::ItemFinished => "ItemFinished",
            EventType::StateChanged => "StateChanged",
            EventType::Other => "Other",
        }
    }

    /// Comma-separated filter for the `events` query parameter
    pub fn filter(types: &[EventType]) -> String {
        types
            .iter()
            .filter(|t| **t != EventType::Other)
            .map(EventType::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event as delivered by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Strictly increasing across the stream
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub data: Value,
}

impl RawEvent {
    /// String field from `data`, if present and a string
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// String field from `data`, or the `Unknown` placeholder
    pub fn data_str_or_unknown(&self, key: &str) -> &str {
        self.data_str(key).unwrap_or(UNKNOWN)
    }
}

/// Placeholder for missing `folder` / `item` fields
pub const UNKNOWN: &str = "Unknown";

/// Parse a response body into events.
///
/// The body must be a JSON array. Elements that are not readable as an event
/// are counted in the second value. One that still carries a numeric `id` is
/// kept as an `Other` event so the cursor can move past it; one without is
/// dropped.
pub fn parse_batch(body: &[u8]) -> serde_json::Result<(Vec<RawEvent>, usize)> {
    let items: Vec<Value> = serde_json::from_slice(body)?;
    let mut events = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for item in items {
        let id = item.get("id").and_then(Value::as_u64);
        match serde_json::from_value::<RawEvent>(item) {
            Ok(mut event) => {
                if event.data.is_null() {
                    event.data = Value::Object(Default::default());
                }
                events.push(event);
            }
            Err(e) => {
                skipped += 1;
                match id {
                    Some(id) => {
                        tracing::warn!("Ignoring unreadable event {}: {}", id, e);
                        events.push(RawEvent {
                            id,
                            event_type: EventType::Other,
                            data: Value::Object(Default::default()),
                        });
                    }
                    None => tracing::warn!("Skipping unreadable event: {}", e),
                }
            }
        }
    }

    Ok((events, skipped))
}
