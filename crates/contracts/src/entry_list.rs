//! EntryList - read-only view handed to observer callbacks

use std::ops::Deref;
use std::sync::Arc;

use crate::PerformanceEntry;

/// Immutable snapshot of performance entries
///
/// Cloning only bumps a reference count; the list is never mutated after
/// construction and is safe to hand to external callback code.
#[derive(Debug, Clone, Default)]
pub struct EntryList {
    entries: Arc<[Arc<PerformanceEntry>]>,
}

impl EntryList {
    pub fn new(entries: Vec<Arc<PerformanceEntry>>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Every entry in the list
    pub fn all(&self) -> &[Arc<PerformanceEntry>] {
        &self.entries
    }

    /// Entries whose `entry_type` equals `entry_type`
    pub fn by_type(&self, entry_type: &str) -> Vec<Arc<PerformanceEntry>> {
        self.entries
            .iter()
            .filter(|e| e.entry_type() == entry_type)
            .cloned()
            .collect()
    }

    /// Entries named `name`, narrowed by type when one is given
    pub fn by_name(&self, name: &str, entry_type: Option<&str>) -> Vec<Arc<PerformanceEntry>> {
        self.entries
            .iter()
            .filter(|e| e.name() == name)
            .filter(|e| entry_type.is_none_or(|t| e.entry_type() == t))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<PerformanceEntry>> {
        self.entries.iter()
    }
}

impl Deref for EntryList {
    type Target = [Arc<PerformanceEntry>];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a EntryList {
    type Item = &'a Arc<PerformanceEntry>;
    type IntoIter = std::slice::Iter<'a, Arc<PerformanceEntry>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Arc<PerformanceEntry>> for EntryList {
    fn from_iter<I: IntoIterator<Item = Arc<PerformanceEntry>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
