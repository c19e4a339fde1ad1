//! PerformanceEntry - immutable instrumentation record
//!
//! Entries are produced by an external source and shared as
//! `Arc<PerformanceEntry>`. Identity is the [`EntryId`] assigned at
//! construction, so two separately recorded entries with identical fields are
//! still two entries.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::EntryType;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique entry identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> Self {
        Self(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single recorded performance entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    #[serde(skip)]
    id: EntryId,
    name: String,
    entry_type: String,
    /// Milliseconds since the timeline origin
    start_time: f64,
    /// Milliseconds
    duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<Value>,
}

impl PerformanceEntry {
    /// Create an entry with a free-form entry type
    pub fn new(
        name: impl Into<String>,
        entry_type: impl Into<String>,
        start_time: f64,
        duration: f64,
    ) -> Self {
        Self {
            id: EntryId::next(),
            name: name.into(),
            entry_type: entry_type.into(),
            start_time,
            duration,
            detail: None,
        }
    }

    /// Create an entry for one of the observable categories
    pub fn of_type(
        entry_type: EntryType,
        name: impl Into<String>,
        start_time: f64,
        duration: f64,
    ) -> Self {
        Self::new(name, entry_type.as_str(), start_time, duration)
    }

    /// Attach user-supplied detail
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    /// Observable category, if the entry type is one
    pub fn category(&self) -> Option<EntryType> {
        EntryType::parse(&self.entry_type)
    }
}

impl PartialEq for PerformanceEntry {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PerformanceEntry {}

impl Hash for PerformanceEntry {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}
