//! # Integration Tests
//!
//! Integration and end-to-end tests.
//!
//! Covers:
//! - Contract snapshots
//! - Settings files driving the engine and timeline
//! - Façade + engine + timeline on a virtual clock
//! - A live tokio run with the mock workload

#[cfg(test)]
mod contract_tests {
    use contracts::{EntryType, ObserverSettings};

    #[test]
    fn test_supported_entry_types_snapshot() {
        let names: Vec<_> = EntryType::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, ["mark", "measure", "navigation", "resource"]);
    }

    #[test]
    fn test_default_settings_snapshot() {
        let value = serde_json::to_value(ObserverSettings::default()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "engine": {
                    "poll_interval_ms": 100,
                    "flush_mode": "frame",
                    "frame_interval_ms": 16
                },
                "timeline": {
                    "resource_buffer_size": 250,
                    "user_timing_buffer_size": 10000
                }
            })
        );
    }
}

#[cfg(test)]
mod settings_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::PollingDispatcher;
    use observability::DeliveryStats;
    use observer::{ObserveOptions, PerformanceObserver};
    use scheduler::ManualScheduler;
    use timeline::PerformanceTimeline;

    const SETTINGS: &str = r#"
[engine]
poll_interval_ms = 40
flush_mode = "immediate"

[timeline]
resource_buffer_size = 3
"#;

    /// Loaded settings size the timeline buffers and pace the engine
    #[test]
    fn test_loaded_settings_drive_timeline_and_engine() {
        let settings = ConfigLoader::load_from_str(SETTINGS, ConfigFormat::Toml).unwrap();
        let timeline = Arc::new(PerformanceTimeline::new(&settings.timeline));
        let scheduler = Arc::new(ManualScheduler::new());
        let dispatcher = PollingDispatcher::builder(timeline.clone())
            .config(settings.engine.clone())
            .timer(scheduler.clone())
            .scheduler(scheduler.clone())
            .build()
            .unwrap();

        let stats = Arc::new(Mutex::new(DeliveryStats::new()));
        let sink = Arc::clone(&stats);
        let observer = PerformanceObserver::with_dispatcher(
            move |entries, _| {
                sink.lock()
                    .unwrap()
                    .update(entries.iter().map(|e| e.entry_type()));
            },
            dispatcher.clone(),
        );
        observer
            .observe(ObserveOptions::entry_types(["resource", "mark"]))
            .unwrap();

        for i in 0..5 {
            timeline.record_resource(format!("/asset-{i}.js"), f64::from(i), 1.0);
        }
        timeline.mark("ready");

        // Nothing before the configured interval elapses
        assert_eq!(scheduler.advance_and_flush(Duration::from_millis(39)), 0);
        assert_eq!(stats.lock().unwrap().batches, 0);

        assert_eq!(scheduler.advance_and_flush(Duration::from_millis(1)), 1);
        let summary = stats.lock().unwrap().summary();
        assert_eq!(summary.batches, 1);
        assert_eq!(summary.entries, 4);
        assert_eq!(summary.per_type.get("resource"), Some(&3));
        assert_eq!(summary.per_type.get("mark"), Some(&1));

        observer.disconnect();
        assert!(!dispatcher.is_active());
    }

    #[test]
    fn test_invalid_settings_never_reach_the_engine() {
        let result = ConfigLoader::load_from_str(
            "[engine]\npoll_interval_ms = 10\nframe_interval_ms = 16\n",
            ConfigFormat::Toml,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("engine.frame_interval_ms"), "{err}");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{Advisory, EngineConfig, EntryList, EntryType, RecordingDiagnostics};
    use dispatcher::PollingDispatcher;
    use observer::{ObserveOptions, PerformanceObserver};
    use scheduler::ManualScheduler;
    use timeline::PerformanceTimeline;

    const TICK: Duration = Duration::from_millis(100);

    /// Timeline -> PollingDispatcher -> observers, on a virtual clock
    struct World {
        timeline: Arc<PerformanceTimeline>,
        scheduler: Arc<ManualScheduler>,
        diagnostics: Arc<RecordingDiagnostics>,
        dispatcher: PollingDispatcher,
    }

    impl World {
        fn new() -> Self {
            Self::with_scheduler(ManualScheduler::with_frames())
        }

        fn with_scheduler(scheduler: ManualScheduler) -> Self {
            let timeline = Arc::new(PerformanceTimeline::default());
            let scheduler = Arc::new(scheduler);
            let diagnostics = Arc::new(RecordingDiagnostics::new());
            let dispatcher = PollingDispatcher::builder(timeline.clone())
                .config(EngineConfig::default())
                .timer(scheduler.clone())
                .scheduler(scheduler.clone())
                .diagnostics(diagnostics.clone())
                .build()
                .unwrap();

            Self {
                timeline,
                scheduler,
                diagnostics,
                dispatcher,
            }
        }

        fn observer(&self) -> (PerformanceObserver, Arc<Mutex<Vec<EntryList>>>) {
            let batches = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&batches);
            let observer = PerformanceObserver::with_dispatcher(
                move |entries, _| sink.lock().unwrap().push(entries.clone()),
                self.dispatcher.clone(),
            );
            (observer, batches)
        }

        fn tick(&self) {
            self.scheduler.advance_and_flush(TICK);
        }

        fn assert_lifecycle_invariant(&self) {
            assert_eq!(
                self.dispatcher.is_active(),
                self.dispatcher.registered_count() > 0
            );
            assert_eq!(
                self.scheduler.active_timers(),
                usize::from(self.dispatcher.is_active())
            );
        }
    }

    fn names(batches: &Mutex<Vec<EntryList>>) -> Vec<Vec<String>> {
        batches
            .lock()
            .unwrap()
            .iter()
            .map(|batch| batch.iter().map(|e| e.name().to_string()).collect())
            .collect()
    }

    #[test]
    fn test_mark_and_resource_observers() {
        let world = World::new();
        let (marks, mark_batches) = world.observer();
        let (resources, resource_batches) = world.observer();
        marks.observe(ObserveOptions::entry_types(["mark"])).unwrap();
        resources.observe(ObserveOptions::entry_types(["resource"])).unwrap();

        world.timeline.mark("a");
        world.timeline.record_resource("/r", 0.0, 5.0);
        world.tick();

        assert_eq!(names(&mark_batches), vec![vec!["a"]]);
        assert_eq!(names(&resource_batches), vec![vec!["/r"]]);

        world.tick();
        assert_eq!(mark_batches.lock().unwrap().len(), 1);
        assert_eq!(resource_batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_one_batch_per_cycle_in_recording_order() {
        let world = World::new();
        let (observer, batches) = world.observer();
        observer
            .observe(ObserveOptions::entry_types(["mark", "measure"]))
            .unwrap();

        world.timeline.mark_at("start", 1.0, None);
        world.timeline.mark_at("end", 5.0, None);
        world
            .timeline
            .measure("span", Some("start"), Some("end"))
            .unwrap();
        world.tick();

        // Source order is start time, ties in recording order
        assert_eq!(names(&batches), vec![vec!["start", "span", "end"]]);
    }

    #[test]
    fn test_partially_invalid_request() {
        let world = World::new();
        let (observer, _) = world.observer();

        observer
            .observe(ObserveOptions::entry_types(["resource", "bogus"]))
            .unwrap();

        assert_eq!(observer.entry_types(), vec![EntryType::Resource]);
        assert_eq!(world.diagnostics.advisories().len(), 1);
        assert!(world.dispatcher.is_active());
    }

    #[test]
    fn test_fully_invalid_request() {
        let world = World::new();
        let (observer, batches) = world.observer();

        observer
            .observe(ObserveOptions::entry_types(["bogus"]))
            .unwrap();

        assert!(matches!(
            world.diagnostics.advisories().as_slice(),
            [Advisory::NothingToObserve { .. }]
        ));
        assert!(!world.dispatcher.is_active());

        world.timeline.mark("ignored");
        world.tick();
        assert!(batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_conflicting_forms_rejected() {
        let world = World::new();
        let (observer, _) = world.observer();

        let result = observer.observe(ObserveOptions {
            entry_types: Some(vec!["mark".to_string()]),
            type_: Some("mark".to_string()),
        });

        assert!(matches!(
            result,
            Err(observer::ObserverError::ConflictingCategorySpec)
        ));
        assert_eq!(world.dispatcher.registered_count(), 0);
    }

    #[test]
    fn test_uninvolved_observer_never_called() {
        let world = World::new();
        let (navigation, navigation_batches) = world.observer();
        let (marks, _) = world.observer();
        navigation.observe(ObserveOptions::single("navigation")).unwrap();
        marks.observe(ObserveOptions::single("mark")).unwrap();

        for i in 0..10 {
            world.timeline.mark(format!("m{i}"));
            world.timeline.record_resource(format!("/r{i}"), 0.0, 1.0);
            world.tick();
        }

        assert!(navigation_batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_lifecycle_invariant_across_operations() {
        let world = World::new();
        let (a, _) = world.observer();
        let (b, _) = world.observer();
        world.assert_lifecycle_invariant();

        a.observe(ObserveOptions::single("mark")).unwrap();
        world.assert_lifecycle_invariant();
        b.observe(ObserveOptions::single("measure")).unwrap();
        world.assert_lifecycle_invariant();
        a.observe(ObserveOptions::single("resource")).unwrap();
        world.assert_lifecycle_invariant();

        a.disconnect();
        world.assert_lifecycle_invariant();
        a.disconnect();
        world.assert_lifecycle_invariant();
        b.disconnect();
        world.assert_lifecycle_invariant();
        assert!(!world.dispatcher.is_active());

        b.observe(ObserveOptions::single("measure")).unwrap();
        world.assert_lifecycle_invariant();
        assert!(world.dispatcher.is_active());
    }

    #[test]
    fn test_exactly_once_while_registered() {
        let world = World::new();
        let (observer, batches) = world.observer();
        observer.observe(ObserveOptions::single("mark")).unwrap();

        for round in 0..5 {
            for i in 0..3 {
                world.timeline.mark(format!("r{round}-{i}"));
            }
            world.tick();
        }

        let delivered: Vec<String> = names(&batches).into_iter().flatten().collect();
        assert_eq!(delivered.len(), 15);
        let mut unique = delivered.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 15);
    }

    #[test]
    fn test_entries_seen_before_registration_not_delivered() {
        let world = World::new();
        let (marks, _) = world.observer();
        marks.observe(ObserveOptions::single("mark")).unwrap();

        world.timeline.record_resource("/early", 0.0, 1.0);
        world.tick();

        let (late, late_batches) = world.observer();
        late.observe(ObserveOptions::single("resource")).unwrap();
        world.timeline.record_resource("/late", 0.0, 1.0);
        world.tick();

        assert_eq!(names(&late_batches), vec![vec!["/late"]]);
    }

    #[test]
    fn test_panicking_observer_isolated() {
        let world = World::new();
        let panicking = PerformanceObserver::with_dispatcher(
            |_, _| panic!("observer blew up"),
            world.dispatcher.clone(),
        );
        let (healthy, batches) = world.observer();
        panicking.observe(ObserveOptions::single("mark")).unwrap();
        healthy.observe(ObserveOptions::single("mark")).unwrap();

        world.timeline.mark("m");
        world.tick();

        assert_eq!(names(&batches), vec![vec!["m"]]);
        let panics = world.diagnostics.panics();
        assert_eq!(panics.len(), 1);
        assert_eq!(panics[0].subscriber, panicking.id());
    }

    #[test]
    fn test_frame_mode_without_frames_uses_defer() {
        let world = World::with_scheduler(ManualScheduler::new());
        let (observer, batches) = world.observer();
        observer.observe(ObserveOptions::single("mark")).unwrap();

        world.timeline.mark("m");
        world.scheduler.advance(TICK);
        assert_eq!(world.scheduler.pending_deferred(), 1);
        assert_eq!(world.scheduler.pending_frames(), 0);

        world.scheduler.run_deferred();
        assert_eq!(names(&batches), vec![vec!["m"]]);
    }

    #[test]
    fn test_cleared_marks_do_not_redeliver() {
        let world = World::new();
        let (observer, batches) = world.observer();
        observer.observe(ObserveOptions::single("mark")).unwrap();

        world.timeline.mark("a");
        world.tick();
        world.timeline.clear_marks(None);
        world.timeline.mark("a");
        world.tick();

        // Same name, new entry
        assert_eq!(names(&batches), vec![vec!["a"], vec!["a"]]);
        assert_eq!(world.dispatcher.seen_count(), 2);
    }
}

#[cfg(test)]
mod live_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{EngineConfig, FlushMode};
    use dispatcher::PollingDispatcher;
    use observer::{ObserveOptions, PerformanceObserver};
    use timeline::{MockWorkload, MockWorkloadConfig, PerformanceTimeline};

    /// MockWorkload -> PerformanceTimeline -> tokio-driven engine -> observer
    #[tokio::test]
    async fn test_live_workload_delivers_every_entry() {
        let timeline = Arc::new(PerformanceTimeline::default());
        let dispatcher = PollingDispatcher::builder(timeline.clone())
            .config(EngineConfig {
                poll_interval_ms: 10,
                flush_mode: FlushMode::Frame,
                frame_interval_ms: 4,
            })
            .build()
            .unwrap();

        let delivered = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&delivered);
        let observer = PerformanceObserver::with_dispatcher(
            move |entries, _| {
                counter.fetch_add(entries.len() as u64, Ordering::SeqCst);
            },
            dispatcher.clone(),
        );
        observer
            .observe(ObserveOptions::entry_types([
                "mark",
                "measure",
                "navigation",
                "resource",
            ]))
            .unwrap();

        let workload = MockWorkload::new(MockWorkloadConfig {
            rate_hz: 500.0,
            seed: Some(3),
            ..MockWorkloadConfig::default()
        });
        let handle = workload.start(Arc::clone(&timeline));
        tokio::time::sleep(Duration::from_millis(150)).await;
        workload.stop();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        observer.disconnect();

        let recorded = workload.counters().total();
        assert!(recorded > 0);
        assert_eq!(delivered.load(Ordering::SeqCst), recorded);
        assert!(!dispatcher.is_active());
    }
}
