//! Per-batch duplicate suppression

use std::collections::HashSet;

use crate::classifier::DedupKey;

/// Remembers the dedup keys dispatched during one polled batch.
///
/// Construct a fresh one per batch; nothing carries over between batches.
#[derive(Debug, Default)]
pub struct BatchDeduplicator {
    seen: HashSet<DedupKey>,
}

impl BatchDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `key` is offered in this batch.
    pub fn admit(&mut self, key: &DedupKey) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.clone())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
