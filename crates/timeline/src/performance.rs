//! PerformanceTimeline - capped buffers of recorded entries
//!
//! Navigation entries are kept in full. User timing (marks, measures and any
//! other non-resource type) and resource timings each live in a ring buffer;
//! when a ring is full the oldest entry is overwritten.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use contracts::{EntrySource, EntryType, ObserverError, PerformanceEntry, TimelineConfig};
use ringbuf::{traits::*, HeapRb};
use serde_json::Value;
use tracing::{debug, trace};

static GLOBAL_TIMELINE: OnceLock<Arc<PerformanceTimeline>> = OnceLock::new();

/// Process-wide timeline, created with default capacities on first use
pub fn global_timeline() -> Arc<PerformanceTimeline> {
    Arc::clone(GLOBAL_TIMELINE.get_or_init(|| Arc::new(PerformanceTimeline::default())))
}

struct TimelineBuffers {
    navigation: Vec<Arc<PerformanceEntry>>,
    user_timing: HeapRb<Arc<PerformanceEntry>>,
    resources: HeapRb<Arc<PerformanceEntry>>,
    overwritten: u64,
}

/// Shared performance entry buffer
pub struct PerformanceTimeline {
    origin: Instant,
    buffers: Mutex<TimelineBuffers>,
}

impl fmt::Debug for PerformanceTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffers = self.lock();
        f.debug_struct("PerformanceTimeline")
            .field("navigation", &buffers.navigation.len())
            .field("user_timing", &buffers.user_timing.occupied_len())
            .field("resources", &buffers.resources.occupied_len())
            .field("overwritten", &buffers.overwritten)
            .finish()
    }
}

impl Default for PerformanceTimeline {
    fn default() -> Self {
        Self::new(&TimelineConfig::default())
    }
}

impl PerformanceTimeline {
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            origin: Instant::now(),
            buffers: Mutex::new(TimelineBuffers {
                navigation: Vec::new(),
                user_timing: HeapRb::new(config.user_timing_buffer_size.max(1)),
                resources: HeapRb::new(config.resource_buffer_size.max(1)),
                overwritten: 0,
            }),
        }
    }

    /// Milliseconds since the timeline was created
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    /// Record a mark at the current time
    pub fn mark(&self, name: impl Into<String>) -> Arc<PerformanceEntry> {
        self.record(PerformanceEntry::of_type(EntryType::Mark, name, self.now(), 0.0))
    }

    /// Record a mark with an explicit start time and optional detail
    pub fn mark_at(
        &self,
        name: impl Into<String>,
        start_time: f64,
        detail: Option<Value>,
    ) -> Arc<PerformanceEntry> {
        let mut entry = PerformanceEntry::of_type(EntryType::Mark, name, start_time, 0.0);
        if let Some(detail) = detail {
            entry = entry.with_detail(detail);
        }
        self.record(entry)
    }

    /// Record a measure between two marks
    ///
    /// A missing start mark means the timeline origin, a missing end mark
    /// means now. The most recent mark with a given name is used.
    ///
    /// # Errors
    /// Returns `UnknownMark` if a named mark has not been recorded.
    pub fn measure(
        &self,
        name: impl Into<String>,
        start_mark: Option<&str>,
        end_mark: Option<&str>,
    ) -> Result<Arc<PerformanceEntry>, ObserverError> {
        let start = match start_mark {
            Some(mark) => self.mark_time(mark)?,
            None => 0.0,
        };
        let end = match end_mark {
            Some(mark) => self.mark_time(mark)?,
            None => self.now(),
        };
        Ok(self.record(PerformanceEntry::of_type(
            EntryType::Measure,
            name,
            start,
            end - start,
        )))
    }

    /// Record a resource timing
    pub fn record_resource(
        &self,
        name: impl Into<String>,
        start_time: f64,
        duration: f64,
    ) -> Arc<PerformanceEntry> {
        self.record(PerformanceEntry::of_type(
            EntryType::Resource,
            name,
            start_time,
            duration,
        ))
    }

    /// Record a navigation timing starting at the timeline origin
    pub fn record_navigation(&self, name: impl Into<String>, duration: f64) -> Arc<PerformanceEntry> {
        self.record(PerformanceEntry::of_type(EntryType::Navigation, name, 0.0, duration))
    }

    /// Record an arbitrary entry into the buffer matching its type
    pub fn record(&self, entry: PerformanceEntry) -> Arc<PerformanceEntry> {
        let entry = Arc::new(entry);
        let mut buffers = self.lock();
        let evicted = match entry.category() {
            Some(EntryType::Navigation) => {
                buffers.navigation.push(Arc::clone(&entry));
                None
            }
            Some(EntryType::Resource) => buffers.resources.push_overwrite(Arc::clone(&entry)),
            _ => buffers.user_timing.push_overwrite(Arc::clone(&entry)),
        };
        if let Some(old) = evicted {
            buffers.overwritten += 1;
            trace!(evicted = %old.name(), entry_type = %old.entry_type(), "Timeline buffer full, oldest entry overwritten");
        }
        entry
    }

    /// Entries of one type, ordered by start time
    pub fn entries_by_type(&self, entry_type: &str) -> Vec<Arc<PerformanceEntry>> {
        self.entries()
            .into_iter()
            .filter(|e| e.entry_type() == entry_type)
            .collect()
    }

    /// Entries with a given name, narrowed by type when one is given
    pub fn entries_by_name(&self, name: &str, entry_type: Option<&str>) -> Vec<Arc<PerformanceEntry>> {
        self.entries()
            .into_iter()
            .filter(|e| e.name() == name)
            .filter(|e| entry_type.is_none_or(|t| e.entry_type() == t))
            .collect()
    }

    /// Remove marks, all of them or those with one name
    pub fn clear_marks(&self, name: Option<&str>) -> usize {
        self.clear_user_timing(EntryType::Mark, name)
    }

    /// Remove measures, all of them or those with one name
    pub fn clear_measures(&self, name: Option<&str>) -> usize {
        self.clear_user_timing(EntryType::Measure, name)
    }

    /// Remove every resource timing
    pub fn clear_resource_timings(&self) -> usize {
        let cleared = self.lock().resources.clear();
        debug!(cleared, "Resource timings cleared");
        cleared
    }

    /// Resize the resource buffer, keeping the newest entries that still fit
    pub fn set_resource_timing_buffer_size(&self, size: usize) {
        let mut guard = self.lock();
        let buffers = &mut *guard;
        let mut resized = HeapRb::new(size.max(1));
        for entry in buffers.resources.pop_iter() {
            if resized.push_overwrite(entry).is_some() {
                buffers.overwritten += 1;
            }
        }
        buffers.resources = resized;
        debug!(size, "Resource timing buffer resized");
    }

    /// Entries lost to buffer overwrites so far
    pub fn overwritten_count(&self) -> u64 {
        self.lock().overwritten
    }

    fn clear_user_timing(&self, entry_type: EntryType, name: Option<&str>) -> usize {
        let mut buffers = self.lock();
        let before = buffers.user_timing.occupied_len();
        let kept: Vec<_> = buffers
            .user_timing
            .pop_iter()
            .filter(|e| !(e.entry_type() == entry_type.as_str() && name.is_none_or(|n| e.name() == n)))
            .collect();
        let cleared = before - kept.len();
        for entry in kept {
            let _ = buffers.user_timing.push_overwrite(entry);
        }
        debug!(entry_type = %entry_type, name = ?name, cleared, "User timing entries cleared");
        cleared
    }

    fn mark_time(&self, name: &str) -> Result<f64, ObserverError> {
        self.lock()
            .user_timing
            .iter()
            .filter(|e| e.entry_type() == EntryType::Mark.as_str() && e.name() == name)
            .last()
            .map(|e| e.start_time())
            .ok_or_else(|| ObserverError::unknown_mark(name))
    }

    fn lock(&self) -> MutexGuard<'_, TimelineBuffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EntrySource for PerformanceTimeline {
    /// Every buffered entry, ordered by start time (ties keep record order)
    fn entries(&self) -> Vec<Arc<PerformanceEntry>> {
        let mut entries: Vec<_> = {
            let buffers = self.lock();
            buffers
                .navigation
                .iter()
                .chain(buffers.user_timing.iter())
                .chain(buffers.resources.iter())
                .cloned()
                .collect()
        };
        entries.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
        entries
    }
}
