//! Session statistics.

use std::time::Duration;

use contracts::EntryType;
use dispatcher::EngineMetricsSnapshot;
use observability::{DeliveryStats, DeliverySummary};

/// Delivery report for one observer
#[derive(Debug, Clone)]
pub struct ObserverReport {
    /// Entry types as requested on the command line
    pub label: String,
    /// Entry types actually observed
    pub entry_types: Vec<EntryType>,
    pub delivery: DeliverySummary,
}

/// Statistics from a session run
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total duration of the session
    pub duration: Duration,

    /// Entries recorded by the workload
    pub recorded: u64,

    /// Entries overwritten in the timeline's capped buffers
    pub overwritten: u64,

    /// Engine counters at the end of the run
    pub engine: EngineMetricsSnapshot,

    /// Deliveries across all observers
    pub total: DeliveryStats,

    pub observers: Vec<ObserverReport>,
}

impl SessionStats {
    /// Delivered entries per second
    pub fn delivery_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total.entries as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Session Statistics ===\n");

        println!("Overview");
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Entries recorded: {}", self.recorded);
        println!("  Entries overwritten: {}", self.overwritten);
        println!("  Entries delivered: {}", self.total.entries);
        println!("  Delivery rate: {:.2}/s", self.delivery_rate());

        println!("\nEngine");
        println!("  Polls: {}", self.engine.polls);
        println!("  Entries seen: {}", self.engine.entries_seen);
        println!("  Entries routed: {}", self.engine.entries_routed);
        println!("  Entries unmatched: {}", self.engine.entries_unmatched);
        println!("  Batches delivered: {}", self.engine.batches_delivered);
        println!("  Callback panics: {}", self.engine.callback_panics);

        for report in &self.observers {
            println!("\nObserver [{}] observing {:?}", report.label, report.entry_types);
            print!("{}", report.delivery);
        }

        println!();
    }
}
