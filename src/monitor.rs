//! Event monitor loop
//!
//! Pulls batches from an [`EventSource`], classifies and deduplicates them,
//! hands the surviving notifications to a [`Notifier`] and persists the
//! cursor once per batch.
//!
//! ```text
//! Idle ─▶ Fetching ─▶ Processing ─▶ Persisting ─▶ Idle
//!            │  ▲
//!            ▼  │
//!          Backoff
//! ```
//!
//! A transient fetch failure never advances the cursor, so the retry asks for
//! the same events again. Duplicate suppression only spans one batch: after a
//! crash the last unpersisted batch is delivered again and may re-notify.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::classifier::{self, NotificationIntent};
use crate::client::{EventSource, FetchOutcome};
use crate::cursor::CursorStore;
use crate::dedup::BatchDeduplicator;
use crate::events::{EventType, RawEvent};
use crate::notifier::Notifier;
use crate::preferences::Preferences;

/// Default server-side long-poll timeout
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Fetching,
    Processing,
    Persisting,
    Backoff,
    Stopped,
}

/// Counters over the lifetime of one monitor
#[derive(Debug, Clone, Default)]
pub struct MonitorStats {
    pub batches_processed: u64,
    pub events_seen: u64,
    pub notifications_sent: u64,
    pub duplicates_suppressed: u64,
    pub transient_failures: u64,
}

/// What happened to one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub events: usize,
    pub dispatched: usize,
    pub suppressed: usize,
}

pub struct Monitor<S, N> {
    source: S,
    notifier: N,
    cursor_store: CursorStore,
    preferences: Preferences,
    poll_timeout: Duration,
    cursor: u64,
    persisted: u64,
    state: MonitorState,
    stats: MonitorStats,
}

impl<S: EventSource, N: Notifier> Monitor<S, N> {
    /// Create a monitor resuming from the cursor in `cursor_store`.
    pub fn new(source: S, notifier: N, cursor_store: CursorStore, preferences: Preferences) -> Self {
        let cursor = cursor_store.load();
        Self {
            source,
            notifier,
            cursor_store,
            preferences,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            cursor,
            persisted: cursor,
            state: MonitorState::Idle,
            stats: MonitorStats::default(),
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Highest event id processed so far
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    /// Run until `token` is cancelled, then persist and return the cursor.
    pub async fn run(&mut self, token: CancellationToken) -> u64 {
        info!("Resuming from event ID: {}", self.cursor);
        info!("Waiting for events...");

        while !token.is_cancelled() {
            self.transition(MonitorState::Fetching);

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                outcome = self.source.fetch(self.cursor, &EventType::SUBSCRIBED, self.poll_timeout) => outcome,
            };

            match outcome {
                FetchOutcome::TransientError => {
                    self.stats.transient_failures += 1;
                    self.transition(MonitorState::Backoff);

                    let interval = self.preferences.error_interval();
                    warn!("Connection error, retrying in {}s", interval.as_secs());

                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
                FetchOutcome::Empty => {
                    trace!("Long-poll returned no events");
                }
                FetchOutcome::Batch(events) => {
                    self.transition(MonitorState::Processing);
                    self.process_batch(&events);

                    self.transition(MonitorState::Persisting);
                    self.persist();
                }
            }

            self.transition(MonitorState::Idle);
        }

        self.shutdown()
    }

    /// Classify and dispatch one batch, advancing the in-memory cursor.
    ///
    /// Does not persist; [`Monitor::run`] saves the cursor once the whole
    /// batch has been dispatched.
    pub fn process_batch(&mut self, events: &[RawEvent]) -> BatchReport {
        let mut dedup = BatchDeduplicator::new();
        let mut report = BatchReport {
            events: events.len(),
            ..Default::default()
        };

        for event in events {
            self.cursor = self.cursor.max(event.id);
            self.stats.events_seen += 1;

            let Some(intent) = classifier::classify(event, &self.preferences) else {
                trace!("Event {} ({}) needs no notification", event.id, event.event_type);
                continue;
            };

            if !dedup.admit(&intent.dedup_key) {
                debug!("Suppressed duplicate {:?}", intent.dedup_key);
                report.suppressed += 1;
                continue;
            }

            self.dispatch(&intent);
            report.dispatched += 1;
        }

        self.stats.batches_processed += 1;
        self.stats.notifications_sent += report.dispatched as u64;
        self.stats.duplicates_suppressed += report.suppressed as u64;
        report
    }

    fn dispatch(&self, intent: &NotificationIntent) {
        info!("[{}] {}: {}", intent.category.as_str(), intent.subtitle, intent.body);
        self.notifier.notify(
            &intent.title,
            &intent.subtitle,
            &intent.body,
            self.preferences.notification_sound,
        );
    }

    fn persist(&mut self) {
        if self.cursor == self.persisted {
            return;
        }
        match self.cursor_store.save(self.cursor) {
            Ok(()) => self.persisted = self.cursor,
            Err(e) => error!("Failed to save event cursor {}: {}", self.cursor, e),
        }
    }

    fn shutdown(&mut self) -> u64 {
        info!("Stopping monitor...");
        self.persist();
        self.transition(MonitorState::Stopped);

        let stats = &self.stats;
        info!(
            "Processed {} events in {} batches: {} notifications, {} duplicates suppressed, {} connection errors",
            stats.events_seen,
            stats.batches_processed,
            stats.notifications_sent,
            stats.duplicates_suppressed,
            stats.transient_failures
        );
        self.cursor
    }

    fn transition(&mut self, next: MonitorState) {
        if self.state != next {
            trace!("Monitor {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct NoSource;

    impl EventSource for NoSource {
        async fn fetch(&self, _since: u64, _types: &[EventType], _poll: Duration) -> FetchOutcome {
            FetchOutcome::Empty
        }
    }

    #[derive(Default)]
    struct Sent(Mutex<Vec<(String, bool)>>);

    impl Notifier for Sent {
        fn notify(&self, title: &str, _subtitle: &str, _body: &str, play_sound: bool) {
            self.0.lock().unwrap().push((title.to_string(), play_sound));
        }
    }

    fn event(id: u64, event_type: &str, data: serde_json::Value) -> RawEvent {
        serde_json::from_value(json!({"id": id, "type": event_type, "data": data})).unwrap()
    }

    #[test]
    fn test_process_batch_dedups_and_advances_cursor() {
        let dir = TempDir::new().unwrap();
        let mut monitor = Monitor::new(
            NoSource,
            Sent::default(),
            CursorStore::new(dir.path().join("last_event_id")),
            Preferences::default(),
        );

        let error = json!({"folder": "Docs", "item": "a.txt", "error": "denied"});
        let report = monitor.process_batch(&[
            event(10, "ItemFinished", error.clone()),
            event(11, "StateChanged", json!({"folder": "Docs"})),
            event(12, "ItemFinished", error),
        ]);

        assert_eq!(report, BatchReport { events: 3, dispatched: 1, suppressed: 1 });
        assert_eq!(monitor.cursor(), 12);
        assert_eq!(monitor.notifier.0.lock().unwrap().len(), 1);
        // nothing is written until the batch is persisted
        assert_eq!(CursorStore::new(dir.path().join("last_event_id")).load(), 0);
    }

    #[test]
    fn test_dedup_does_not_span_batches() {
        let dir = TempDir::new().unwrap();
        let mut monitor = Monitor::new(
            NoSource,
            Sent::default(),
            CursorStore::new(dir.path().join("last_event_id")),
            Preferences::default(),
        );

        let data = json!({"folder": "Docs", "errors": [{"error": "disk full"}]});
        monitor.process_batch(&[event(1, "FolderErrors", data.clone())]);
        monitor.process_batch(&[event(2, "FolderErrors", data)]);

        assert_eq!(monitor.notifier.0.lock().unwrap().len(), 2);
        assert_eq!(monitor.stats().batches_processed, 2);
    }

    #[test]
    fn test_sound_preference_is_forwarded() {
        let dir = TempDir::new().unwrap();
        let mut prefs = Preferences::default();
        prefs.notification_sound = false;
        let mut monitor = Monitor::new(
            NoSource,
            Sent::default(),
            CursorStore::new(dir.path().join("last_event_id")),
            prefs,
        );

        monitor.process_batch(&[event(1, "ItemFinished", json!({"item": "x.sync-conflict-1"}))]);
        let sent = monitor.notifier.0.lock().unwrap();
        assert_eq!(sent.as_slice(), &[("Syncthing Conflict".to_string(), false)]);
    }

    #[test]
    fn test_cursor_never_moves_backwards() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::new(dir.path().join("last_event_id"));
        store.save(50).unwrap();

        let mut monitor = Monitor::new(NoSource, Sent::default(), store, Preferences::default());
        monitor.process_batch(&[event(3, "StateChanged", json!({}))]);
        assert_eq!(monitor.cursor(), 50);
    }

    /// Hands out batches while the cursor directory is blocked by a plain
    /// file, then clears the way and cancels.
    struct BlockedStateDir {
        blocker: std::path::PathBuf,
        batches: Mutex<std::collections::VecDeque<u64>>,
        since: Mutex<Vec<u64>>,
        token: CancellationToken,
    }

    impl EventSource for BlockedStateDir {
        async fn fetch(&self, since: u64, _types: &[EventType], _poll: Duration) -> FetchOutcome {
            self.since.lock().unwrap().push(since);
            match self.batches.lock().unwrap().pop_front() {
                Some(id) => FetchOutcome::Batch(vec![event(id, "StateChanged", json!({}))]),
                None => {
                    std::fs::remove_file(&self.blocker).unwrap();
                    std::fs::create_dir(&self.blocker).unwrap();
                    self.token.cancel();
                    FetchOutcome::Empty
                }
            }
        }
    }

    #[tokio::test]
    async fn test_failed_save_keeps_running_and_shutdown_persists() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("state");
        std::fs::write(&blocker, "not a directory").unwrap();
        let cursor_path = blocker.join("last_event_id");

        let token = CancellationToken::new();
        let source = BlockedStateDir {
            blocker,
            batches: Mutex::new(vec![10, 11].into()),
            since: Mutex::new(Vec::new()),
            token: token.clone(),
        };
        let mut monitor = Monitor::new(
            source,
            Sent::default(),
            CursorStore::new(&cursor_path),
            Preferences::default(),
        );

        assert_eq!(monitor.run(token).await, 11);
        assert_eq!(monitor.source.since.lock().unwrap().as_slice(), &[0, 10, 11]);
        assert_eq!(monitor.stats().batches_processed, 2);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(CursorStore::new(&cursor_path).load(), 11);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_persists_nothing_new() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::new(dir.path().join("last_event_id"));
        store.save(9).unwrap();

        let mut monitor = Monitor::new(NoSource, Sent::default(), store, Preferences::default());
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(monitor.run(token).await, 9);
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }
}
