//! Session runner - wires timeline, workload, engine and observers.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use config_loader::ObserverSettings;
use dispatcher::PollingDispatcher;
use observability::DeliveryStats;
use observer::{ObserveOptions, PerformanceObserver};
use timeline::{MockWorkload, MockWorkloadConfig, PerformanceTimeline};
use tracing::{debug, info, warn};

use super::{ObserverReport, SessionStats};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Validated settings
    pub settings: ObserverSettings,

    /// One entry-type list per observer
    pub observers: Vec<Vec<String>>,

    /// Run time (None = until shutdown)
    pub duration: Option<Duration>,

    /// Synthetic workload driving the timeline
    pub workload: MockWorkloadConfig,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

struct ObserverSlot {
    label: String,
    observer: PerformanceObserver,
    stats: Arc<Mutex<DeliveryStats>>,
}

/// One observation session
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run until the configured duration elapses or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<SessionStats> {
        let start_time = Instant::now();
        let settings = &self.config.settings;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let timeline = Arc::new(PerformanceTimeline::new(&settings.timeline));
        let dispatcher = PollingDispatcher::builder(timeline.clone())
            .config(settings.engine.clone())
            .build()
            .context("Failed to build dispatch engine")?;

        let slots = self.register_observers(&dispatcher)?;
        if slots.iter().all(|slot| !slot.observer.is_observing()) {
            warn!("No observer registered, nothing will be delivered");
        }

        let workload = MockWorkload::new(self.config.workload.clone());
        let workload_handle = workload.start(Arc::clone(&timeline));
        info!(
            rate_hz = self.config.workload.rate_hz,
            observers = slots.len(),
            "Session started"
        );

        let deadline = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = deadline => info!("Session duration elapsed"),
            _ = shutdown => warn!("Received shutdown signal, stopping session..."),
        }

        workload.stop();
        workload_handle
            .await
            .context("Mock workload task failed")?;

        // Let the last recordings go through one more poll and flush
        let drain = settings.engine.poll_interval() + settings.engine.frame_interval() * 2;
        debug!(drain_ms = drain.as_millis() as u64, "Draining");
        tokio::time::sleep(drain).await;

        let mut stats = SessionStats {
            duration: start_time.elapsed(),
            recorded: workload.counters().total(),
            overwritten: timeline.overwritten_count(),
            engine: dispatcher.metrics(),
            ..SessionStats::default()
        };
        for slot in slots {
            slot.observer.disconnect();
            let delivered = slot
                .stats
                .lock()
                .map(|stats| stats.clone())
                .unwrap_or_default();
            stats.total.merge(&delivered);
            stats.observers.push(ObserverReport {
                label: slot.label,
                entry_types: slot.observer.entry_types(),
                delivery: delivered.summary(),
            });
        }

        info!(
            recorded = stats.recorded,
            delivered = stats.total.entries,
            duration_secs = stats.duration.as_secs_f64(),
            "Session finished"
        );
        Ok(stats)
    }

    fn register_observers(&self, dispatcher: &PollingDispatcher) -> Result<Vec<ObserverSlot>> {
        let mut slots = Vec::with_capacity(self.config.observers.len());

        for types in &self.config.observers {
            let stats = Arc::new(Mutex::new(DeliveryStats::new()));
            let sink = Arc::clone(&stats);
            let observer = PerformanceObserver::with_dispatcher(
                move |entries, observer| {
                    debug!(observer = %observer.id(), batch = entries.len(), "Batch received");
                    if let Ok(mut stats) = sink.lock() {
                        stats.update(entries.iter().map(|entry| entry.entry_type()));
                    }
                },
                dispatcher.clone(),
            );

            let label = types.join(",");
            observer
                .observe(ObserveOptions::entry_types(types.iter().cloned()))
                .with_context(|| format!("Failed to observe '{label}'"))?;
            info!(
                observer = %observer.id(),
                entry_types = ?observer.entry_types(),
                "Observer registered"
            );

            slots.push(ObserverSlot {
                label,
                observer,
                stats,
            });
        }

        Ok(slots)
    }
}
