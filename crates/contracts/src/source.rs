//! EntrySource trait - pull interface over a shared entry buffer

use std::sync::Arc;

use crate::PerformanceEntry;

/// Source of recorded performance entries
///
/// The dispatch engine assumes no cursor or incremental API: every pull returns
/// the full current buffer and the engine deduplicates on its own.
pub trait EntrySource: Send + Sync {
    /// Snapshot of every entry currently held, in a stable order
    fn entries(&self) -> Vec<Arc<PerformanceEntry>>;
}

impl<F> EntrySource for F
where
    F: Fn() -> Vec<Arc<PerformanceEntry>> + Send + Sync,
{
    fn entries(&self) -> Vec<Arc<PerformanceEntry>> {
        self()
    }
}
