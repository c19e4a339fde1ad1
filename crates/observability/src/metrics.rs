//! Dispatch engine metrics
//!
//! Recorders go through the `metrics` facade and are no-ops until a recorder
//! (e.g. the Prometheus exporter) is installed. [`DeliveryStats`] aggregates
//! in memory for end-of-run summaries.

use std::collections::BTreeMap;
use std::fmt;

use contracts::Advisory;
use metrics::{counter, gauge, histogram};

/// Record one poll cycle
pub fn record_poll(pulled: usize, new_entries: usize, routed: usize) {
    counter!("perf_observer_polls_total").increment(1);
    gauge!("perf_observer_source_entries").set(pulled as f64);
    if new_entries > 0 {
        counter!("perf_observer_entries_seen_total").increment(new_entries as u64);
    }
    if routed > 0 {
        counter!("perf_observer_entries_routed_total").increment(routed as u64);
    }
}

/// Record entries that matched no registered observer
pub fn record_unmatched(entry_type: &str, count: usize) {
    counter!(
        "perf_observer_entries_unmatched_total",
        "entry_type" => entry_type.to_string()
    )
    .increment(count as u64);
}

/// Record a batch handed to an observer callback
pub fn record_batch_delivered(size: usize) {
    counter!("perf_observer_batches_delivered_total").increment(1);
    histogram!("perf_observer_batch_size").record(size as f64);
}

/// Record a panicking observer callback
pub fn record_callback_panic() {
    counter!("perf_observer_callback_panics_total").increment(1);
}

/// Record the registry size after add / remove
pub fn record_registered_observers(count: usize) {
    gauge!("perf_observer_registered_observers").set(count as f64);
}

/// Record an advisory raised by `observe`
pub fn record_advisory(advisory: &Advisory) {
    let kind = match advisory {
        Advisory::InvalidEntryTypesDropped { .. } => "invalid_entry_types_dropped",
        Advisory::NothingToObserve { .. } => "nothing_to_observe",
    };
    counter!("perf_observer_advisories_total", "kind" => kind).increment(1);
}

/// In-memory delivery statistics
#[derive(Debug, Clone, Default)]
pub struct DeliveryStats {
    /// Batches delivered
    pub batches: u64,
    /// Entries delivered across all batches
    pub entries: u64,
    /// Batch size statistics
    pub batch_size: RunningStats,
    /// Entries delivered per entry type
    pub per_type: BTreeMap<String, u64>,
}

impl DeliveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one delivered batch
    pub fn update<'a>(&mut self, entry_types: impl IntoIterator<Item = &'a str>) {
        let mut size = 0u64;
        for entry_type in entry_types {
            *self.per_type.entry(entry_type.to_string()).or_insert(0) += 1;
            size += 1;
        }
        self.batches += 1;
        self.entries += size;
        self.batch_size.push(size as f64);
    }

    /// Fold another aggregator into this one
    pub fn merge(&mut self, other: &DeliveryStats) {
        self.batches += other.batches;
        self.entries += other.entries;
        self.batch_size.merge(&other.batch_size);
        for (entry_type, count) in &other.per_type {
            *self.per_type.entry(entry_type.clone()).or_insert(0) += count;
        }
    }

    pub fn summary(&self) -> DeliverySummary {
        DeliverySummary {
            batches: self.batches,
            entries: self.entries,
            batch_size: StatsSummary::from(&self.batch_size),
            per_type: self.per_type.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Delivery summary
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub batches: u64,
    pub entries: u64,
    pub batch_size: StatsSummary,
    pub per_type: BTreeMap<String, u64>,
}

impl fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Batches delivered: {}", self.batches)?;
        writeln!(f, "Entries delivered: {}", self.entries)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        if !self.per_type.is_empty() {
            writeln!(f, "Entries per type:")?;
            for (entry_type, count) in &self.per_type {
                writeln!(f, "  {}: {}", entry_type, count)?;
            }
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Combine two accumulators (Chan et al. parallel update)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        self.mean += delta * other.count as f64 / count as f64;
        self.m2 += other.m2 + delta * delta * (self.count as f64 * other.count as f64) / count as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
