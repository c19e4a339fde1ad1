//! Engine metrics for in-process inspection

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by one dispatch engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Poll cycles executed
    polls: AtomicU64,
    /// Entries seen for the first time
    entries_seen: AtomicU64,
    /// Entry-to-inbox routings (one entry to two observers counts twice)
    entries_routed: AtomicU64,
    /// New entries no registered observer was interested in
    entries_unmatched: AtomicU64,
    /// Non-empty batches handed to callbacks
    batches_delivered: AtomicU64,
    /// Callbacks that panicked
    callback_panics: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_poll(&self, new_entries: usize, routed: usize, unmatched: usize) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.entries_seen
            .fetch_add(new_entries as u64, Ordering::Relaxed);
        self.entries_routed
            .fetch_add(routed as u64, Ordering::Relaxed);
        self.entries_unmatched
            .fetch_add(unmatched as u64, Ordering::Relaxed);
    }

    pub fn inc_batches_delivered(&self) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_callback_panics(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    pub fn batches_delivered(&self) -> u64 {
        self.batches_delivered.load(Ordering::Relaxed)
    }

    pub fn callback_panics(&self) -> u64 {
        self.callback_panics.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            polls: self.polls(),
            entries_seen: self.entries_seen.load(Ordering::Relaxed),
            entries_routed: self.entries_routed.load(Ordering::Relaxed),
            entries_unmatched: self.entries_unmatched.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered(),
            callback_panics: self.callback_panics(),
        }
    }
}

/// Snapshot of engine metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineMetricsSnapshot {
    pub polls: u64,
    pub entries_seen: u64,
    pub entries_routed: u64,
    pub entries_unmatched: u64,
    pub batches_delivered: u64,
    pub callback_panics: u64,
}
