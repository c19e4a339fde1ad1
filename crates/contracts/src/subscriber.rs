//! Subscriber trait - the engine's view of a registered observer

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::{EntryList, PerformanceEntry};

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Registry key for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate a fresh process-unique id
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Registered interest holder
///
/// The engine routes entries into the inbox during a poll, and later drains it
/// into a single [`EntryList`] per flush. Implementations keep their own
/// interior mutability; the engine never holds its own locks while calling in.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;

    /// True if `entry_type` is in this subscriber's category set
    fn is_interested(&self, entry_type: &str) -> bool;

    /// Add an entry to the inbox
    fn enqueue(&self, entry: Arc<PerformanceEntry>);

    /// Remove and return everything in the inbox
    fn take_inbox(&self) -> Vec<Arc<PerformanceEntry>>;

    /// Hand a non-empty batch to the subscriber's callback
    fn deliver(&self, entries: EntryList);
}
