//! Mock workload
//!
//! Records synthetic marks, measures and resource timings into a timeline at
//! a fixed rate. Used by the CLI and by tests that need a live source.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::PerformanceTimeline;

const RESOURCE_NAMES: [&str; 6] = [
    "/static/app.js",
    "/static/vendor.js",
    "/static/app.css",
    "/api/session",
    "/api/feed",
    "/images/hero.webp",
];

/// Mock workload configuration
#[derive(Debug, Clone)]
pub struct MockWorkloadConfig {
    /// Recording rate (operations per second)
    pub rate_hz: f64,

    /// Probability that an operation records a resource timing
    pub resource_ratio: f64,

    /// Record one navigation entry when the workload starts
    pub navigation: bool,

    /// Fixed RNG seed (random when `None`)
    pub seed: Option<u64>,
}

impl Default for MockWorkloadConfig {
    fn default() -> Self {
        Self {
            rate_hz: 50.0,
            resource_ratio: 0.4,
            navigation: true,
            seed: None,
        }
    }
}

/// Counts of entries recorded by a workload
#[derive(Debug, Default)]
pub struct WorkloadCounters {
    pub marks: AtomicU64,
    pub measures: AtomicU64,
    pub resources: AtomicU64,
    pub navigations: AtomicU64,
}

impl WorkloadCounters {
    pub fn total(&self) -> u64 {
        self.marks.load(Ordering::Relaxed)
            + self.measures.load(Ordering::Relaxed)
            + self.resources.load(Ordering::Relaxed)
            + self.navigations.load(Ordering::Relaxed)
    }
}

/// Synthetic instrumentation source
pub struct MockWorkload {
    config: MockWorkloadConfig,
    running: Arc<AtomicBool>,
    counters: Arc<WorkloadCounters>,
}

impl MockWorkload {
    pub fn new(config: MockWorkloadConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(WorkloadCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<WorkloadCounters> {
        Arc::clone(&self.counters)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start recording into `timeline` on a background task
    pub fn start(&self, timeline: Arc<PerformanceTimeline>) -> JoinHandle<()> {
        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let counters = Arc::clone(&self.counters);

        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let period = Duration::from_secs_f64(1.0 / config.rate_hz.max(0.001));
            let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
            let mut op: u64 = 0;

            debug!(rate_hz = config.rate_hz, "mock workload started");

            if config.navigation {
                timeline.record_navigation("https://app.local/", rng.random_range(200.0..1200.0));
                counters.navigations.fetch_add(1, Ordering::Relaxed);
            }

            while running.load(Ordering::Relaxed) {
                op += 1;
                record_one(&timeline, &counters, &mut rng, op, config.resource_ratio);
                tokio::time::sleep(period).await;
            }

            debug!(operations = op, "mock workload stopped");
        })
    }

    /// Stop after the current operation
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn record_one(
    timeline: &PerformanceTimeline,
    counters: &WorkloadCounters,
    rng: &mut StdRng,
    op: u64,
    resource_ratio: f64,
) {
    if rng.random_bool(resource_ratio.clamp(0.0, 1.0)) {
        let name = RESOURCE_NAMES[rng.random_range(0..RESOURCE_NAMES.len())];
        let duration = rng.random_range(1.0..250.0);
        timeline.record_resource(name, timeline.now(), duration);
        counters.resources.fetch_add(1, Ordering::Relaxed);
        trace!(name, duration, "mock resource recorded");
        return;
    }

    let mark = format!("task-{op}");
    timeline.mark(mark.clone());
    counters.marks.fetch_add(1, Ordering::Relaxed);

    // Every other task closes a measure from the previous mark
    if op % 2 == 0 {
        let previous = format!("task-{}", op - 1);
        if timeline
            .measure(format!("span-{op}"), Some(&previous), Some(&mark))
            .is_ok()
        {
            counters.measures.fetch_add(1, Ordering::Relaxed);
        }
    }
}
