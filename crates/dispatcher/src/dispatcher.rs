//! PollingDispatcher - pull, deduplicate, route, batch

use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use contracts::{
    CallbackPanic, DeferredScheduler, DeferredTask, Diagnostics, EngineConfig, EntryId,
    EntryList, EntrySource, FlushMode, ObserverError, Subscriber, SubscriberId, Timer,
    TimerHandle, TracingDiagnostics,
};
use scheduler::{TokioDeferred, TokioTimer};
use tracing::{debug, info, instrument, trace, warn};

use crate::metrics::{EngineMetrics, EngineMetricsSnapshot};

/// Builder for creating a PollingDispatcher
///
/// Timer and scheduler default to the tokio collaborators of the current
/// runtime; diagnostics default to tracing.
pub struct DispatcherBuilder {
    config: EngineConfig,
    source: Arc<dyn EntrySource>,
    timer: Option<Arc<dyn Timer>>,
    scheduler: Option<Arc<dyn DeferredScheduler>>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl DispatcherBuilder {
    pub fn new(source: Arc<dyn EntrySource>) -> Self {
        Self {
            config: EngineConfig::default(),
            source,
            timer: None,
            scheduler: None,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn DeferredScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Build the dispatcher (Idle until the first observer is added)
    ///
    /// # Errors
    /// Returns `NoRuntime` if a tokio collaborator is needed and there is no
    /// current runtime.
    #[instrument(name = "dispatcher_builder_build", skip(self), fields(poll_interval_ms = self.config.poll_interval_ms))]
    pub fn build(self) -> Result<PollingDispatcher, ObserverError> {
        let timer: Arc<dyn Timer> = match self.timer {
            Some(timer) => timer,
            None => Arc::new(TokioTimer::new()?),
        };
        let scheduler: Arc<dyn DeferredScheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => match self.config.flush_mode {
                FlushMode::Frame => Arc::new(TokioDeferred::with_frames(self.config.frame_interval())?),
                FlushMode::Immediate => Arc::new(TokioDeferred::new()?),
            },
        };

        Ok(PollingDispatcher {
            inner: Arc::new(Inner {
                config: self.config,
                source: self.source,
                timer,
                scheduler,
                diagnostics: self.diagnostics,
                state: Mutex::new(EngineState::default()),
                metrics: EngineMetrics::new(),
            }),
        })
    }
}

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Entries returned by the source
    pub pulled: usize,
    /// Entries not seen before this poll
    pub new_entries: usize,
    /// Entry-to-inbox routings
    pub routed: usize,
    /// New entries no observer wanted
    pub unmatched: usize,
}

#[derive(Default)]
struct EngineState {
    registry: BTreeMap<SubscriberId, Arc<dyn Subscriber>>,
    seen: HashSet<EntryId>,
    // Claimed by a poll that is routing them; moved to `seen` afterwards
    routing: HashSet<EntryId>,
    timer: Option<TimerHandle>,
}

struct Inner {
    config: EngineConfig,
    source: Arc<dyn EntrySource>,
    timer: Arc<dyn Timer>,
    scheduler: Arc<dyn DeferredScheduler>,
    diagnostics: Arc<dyn Diagnostics>,
    // Never held across a call into a subscriber, timer or scheduler
    state: Mutex<EngineState>,
    metrics: EngineMetrics,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = state.timer.take() {
            self.timer.stop(handle);
        }
    }
}

/// Polling dispatch engine
///
/// Cheap to clone; clones share one registry, seen-set and timer.
#[derive(Clone)]
pub struct PollingDispatcher {
    inner: Arc<Inner>,
}

impl PollingDispatcher {
    pub fn builder(source: Arc<dyn EntrySource>) -> DispatcherBuilder {
        DispatcherBuilder::new(source)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.inner.diagnostics
    }

    /// Both handles refer to the same engine
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a subscriber; starts polling on the 0 -> 1 transition
    ///
    /// Adding an already registered subscriber is a no-op.
    #[instrument(name = "dispatcher_add", skip_all, fields(observer = %subscriber.id()))]
    pub fn add(&self, subscriber: Arc<dyn Subscriber>) {
        let id = subscriber.id();
        let (registered, current) = {
            let mut state = self.inner.lock_state();
            if state.registry.contains_key(&id) {
                trace!("Observer already registered");
                return;
            }
            state.registry.insert(id, subscriber);
            (state.registry.len(), state.timer)
        };

        match current {
            None => self.ensure_polling(None),
            Some(handle) if !self.inner.timer.is_running(handle) => {
                warn!(timer = %handle, "Polling timer died, restarting");
                self.ensure_polling(Some(handle));
            }
            Some(_) => {}
        }

        observability::record_registered_observers(registered);
        debug!(registered, "Observer registered");
    }

    /// Unregister a subscriber; stops polling on the 1 -> 0 transition
    ///
    /// Removing an unknown subscriber is a no-op. A removed subscriber's
    /// undelivered entries are discarded.
    #[instrument(name = "dispatcher_remove", skip(self), fields(observer = %id))]
    pub fn remove(&self, id: SubscriberId) {
        let (removed, registered, stopped) = {
            let mut state = self.inner.lock_state();
            let Some(removed) = state.registry.remove(&id) else {
                trace!("Observer not registered");
                return;
            };
            let registered = state.registry.len();
            let stopped = if registered == 0 { state.timer.take() } else { None };
            (removed, registered, stopped)
        };

        if let Some(handle) = stopped {
            self.inner.timer.stop(handle);
            info!(timer = %handle, "Polling stopped");
        }

        let discarded = removed.take_inbox().len();
        observability::record_registered_observers(registered);
        debug!(registered, discarded, "Observer unregistered");
    }

    /// One poll cycle: pull, route unseen entries, mark them seen, then
    /// schedule a single flush pass
    ///
    /// Routing runs against a snapshot of the registry with no engine lock
    /// held, so subscribers may call back into the engine.
    #[instrument(level = "trace", name = "dispatcher_poll", skip(self))]
    pub fn poll_once(&self) -> PollReport {
        let pulled = self.inner.source.entries();
        let mut report = PollReport {
            pulled: pulled.len(),
            ..PollReport::default()
        };

        let (fresh, subscribers) = {
            let mut state = self.inner.lock_state();
            let state = &mut *state;
            let fresh: Vec<_> = pulled
                .into_iter()
                .filter(|entry| !state.seen.contains(&entry.id()) && state.routing.insert(entry.id()))
                .collect();
            let subscribers: Vec<Arc<dyn Subscriber>> = if fresh.is_empty() {
                Vec::new()
            } else {
                state.registry.values().cloned().collect()
            };
            (fresh, subscribers)
        };

        report.new_entries = fresh.len();
        for entry in &fresh {
            let mut matched = 0;
            for subscriber in &subscribers {
                if subscriber.is_interested(entry.entry_type()) {
                    subscriber.enqueue(Arc::clone(entry));
                    matched += 1;
                }
            }
            if matched == 0 {
                report.unmatched += 1;
                observability::record_unmatched(entry.entry_type(), 1);
            }
            report.routed += matched;
        }

        if !fresh.is_empty() {
            // Seen only after routing to every interested observer
            let mut state = self.inner.lock_state();
            for entry in &fresh {
                state.routing.remove(&entry.id());
                state.seen.insert(entry.id());
            }
        }

        self.inner
            .metrics
            .record_poll(report.new_entries, report.routed, report.unmatched);
        observability::record_poll(report.pulled, report.new_entries, report.routed);
        if report.new_entries > 0 {
            debug!(
                pulled = report.pulled,
                new_entries = report.new_entries,
                routed = report.routed,
                unmatched = report.unmatched,
                "Poll routed new entries"
            );
        }

        self.schedule_flush();
        report
    }

    /// Deliver every registered subscriber's inbox
    ///
    /// Subscribers removed before their turn are skipped. Returns the number
    /// of callbacks invoked.
    #[instrument(level = "trace", name = "dispatcher_flush_all", skip(self))]
    pub fn flush_all(&self) -> usize {
        let subscribers: Vec<_> = self.inner.lock_state().registry.values().cloned().collect();

        let mut invoked = 0;
        for subscriber in subscribers {
            if !self.is_registered(subscriber.id()) {
                continue;
            }
            if self.flush(subscriber.as_ref()) {
                invoked += 1;
            }
        }
        invoked
    }

    /// Deliver one subscriber's inbox as a single batch
    ///
    /// An empty inbox invokes nothing. A panicking callback is reported to
    /// diagnostics and its batch is not re-queued. Returns whether the
    /// callback was invoked.
    pub fn flush(&self, subscriber: &dyn Subscriber) -> bool {
        let entries = subscriber.take_inbox();
        if entries.is_empty() {
            return false;
        }

        let id = subscriber.id();
        let list = EntryList::new(entries);
        let size = list.len();

        match panic::catch_unwind(AssertUnwindSafe(|| subscriber.deliver(list))) {
            Ok(()) => {
                self.inner.metrics.inc_batches_delivered();
                observability::record_batch_delivered(size);
                trace!(observer = %id, size, "Batch delivered");
            }
            Err(payload) => {
                let report = CallbackPanic::from_payload(id, payload.as_ref());
                self.inner.metrics.inc_callback_panics();
                observability::record_callback_panic();
                self.inner.diagnostics.unhandled(&report);
            }
        }
        true
    }

    /// Polling timer is running
    pub fn is_active(&self) -> bool {
        let timer = self.inner.lock_state().timer;
        timer.is_some_and(|handle| self.inner.timer.is_running(handle))
    }

    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.inner.lock_state().registry.contains_key(&id)
    }

    pub fn registered_count(&self) -> usize {
        self.inner.lock_state().registry.len()
    }

    /// Size of the seen-set
    pub fn seen_count(&self) -> usize {
        self.inner.lock_state().seen.len()
    }

    pub fn metrics(&self) -> EngineMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Start a poll timer and install it in place of `stale`
    ///
    /// A concurrent `add` may have installed its own timer, or a concurrent
    /// `remove` may have emptied the registry, while the lock was released.
    /// Either way the new timer is stopped again.
    fn ensure_polling(&self, stale: Option<TimerHandle>) {
        let handle = self.start_timer();

        let (installed, replaced) = {
            let mut state = self.inner.lock_state();
            if !state.registry.is_empty() && state.timer == stale {
                (true, state.timer.replace(handle))
            } else {
                (false, None)
            }
        };

        if !installed {
            self.inner.timer.stop(handle);
            trace!(timer = %handle, "Redundant poll timer stopped");
            return;
        }
        if let Some(old) = replaced {
            self.inner.timer.stop(old);
        }
        info!(
            timer = %handle,
            interval_ms = self.inner.config.poll_interval_ms,
            "Polling started"
        );
    }

    fn start_timer(&self) -> TimerHandle {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.timer.start_recurring(
            self.inner.config.poll_interval(),
            Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    PollingDispatcher { inner }.poll_once();
                }
            }),
        )
    }

    fn schedule_flush(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task: DeferredTask = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                PollingDispatcher { inner }.flush_all();
            }
        });

        let scheduler = &self.inner.scheduler;
        match self.inner.config.flush_mode {
            FlushMode::Frame => {
                if let Err(task) = scheduler.request_frame(task) {
                    scheduler.defer(task);
                }
            }
            FlushMode::Immediate => scheduler.defer(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EntryType, PerformanceEntry, RecordingDiagnostics};
    use scheduler::ManualScheduler;
    use std::time::Duration;

    /// Subscriber with a fixed category set that records every batch
    struct TestSubscriber {
        id: SubscriberId,
        types: Vec<EntryType>,
        inbox: Mutex<Vec<Arc<PerformanceEntry>>>,
        batches: Mutex<Vec<EntryList>>,
        panic_on_deliver: bool,
    }

    impl TestSubscriber {
        fn new(types: &[EntryType]) -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::next(),
                types: types.to_vec(),
                inbox: Mutex::new(Vec::new()),
                batches: Mutex::new(Vec::new()),
                panic_on_deliver: false,
            })
        }

        fn panicking(types: &[EntryType]) -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::next(),
                types: types.to_vec(),
                inbox: Mutex::new(Vec::new()),
                batches: Mutex::new(Vec::new()),
                panic_on_deliver: true,
            })
        }

        fn batches(&self) -> Vec<EntryList> {
            self.batches.lock().unwrap().clone()
        }

        fn inbox_len(&self) -> usize {
            self.inbox.lock().unwrap().len()
        }
    }

    impl Subscriber for TestSubscriber {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn is_interested(&self, entry_type: &str) -> bool {
            self.types.iter().any(|t| *t == entry_type)
        }

        fn enqueue(&self, entry: Arc<PerformanceEntry>) {
            self.inbox.lock().unwrap().push(entry);
        }

        fn take_inbox(&self) -> Vec<Arc<PerformanceEntry>> {
            std::mem::take(&mut *self.inbox.lock().unwrap())
        }

        fn deliver(&self, entries: EntryList) {
            if self.panic_on_deliver {
                panic!("callback failure");
            }
            self.batches.lock().unwrap().push(entries);
        }
    }

    type SharedEntries = Arc<Mutex<Vec<Arc<PerformanceEntry>>>>;

    struct Harness {
        entries: SharedEntries,
        scheduler: Arc<ManualScheduler>,
        diagnostics: Arc<RecordingDiagnostics>,
        dispatcher: PollingDispatcher,
    }

    impl Harness {
        fn new(flush_mode: FlushMode, scheduler: ManualScheduler) -> Self {
            let entries: SharedEntries = Arc::new(Mutex::new(Vec::new()));
            let source_entries = Arc::clone(&entries);
            let scheduler = Arc::new(scheduler);
            let diagnostics = Arc::new(RecordingDiagnostics::new());

            let dispatcher = PollingDispatcher::builder(Arc::new(move || {
                source_entries.lock().unwrap().clone()
            }))
            .config(EngineConfig {
                flush_mode,
                ..EngineConfig::default()
            })
            .timer(scheduler.clone())
            .scheduler(scheduler.clone())
            .diagnostics(diagnostics.clone())
            .build()
            .unwrap();

            Self {
                entries,
                scheduler,
                diagnostics,
                dispatcher,
            }
        }

        fn immediate() -> Self {
            Self::new(FlushMode::Immediate, ManualScheduler::new())
        }

        fn push(&self, entry_type: EntryType, name: &str) -> Arc<PerformanceEntry> {
            let entry = Arc::new(PerformanceEntry::of_type(entry_type, name, 0.0, 0.0));
            self.entries.lock().unwrap().push(Arc::clone(&entry));
            entry
        }

        fn tick(&self) {
            self.scheduler.advance_and_flush(Duration::from_millis(100));
        }
    }

    #[test]
    fn test_add_starts_polling_once() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Mark]);
        let b = TestSubscriber::new(&[EntryType::Mark]);

        assert!(!h.dispatcher.is_active());
        h.dispatcher.add(a.clone());
        assert!(h.dispatcher.is_active());
        h.dispatcher.add(b.clone());
        h.dispatcher.add(a.clone());

        assert_eq!(h.dispatcher.registered_count(), 2);
        assert_eq!(h.scheduler.active_timers(), 1);
    }

    #[test]
    fn test_remove_last_stops_polling() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Mark]);
        let b = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());
        h.dispatcher.add(b.clone());

        h.dispatcher.remove(a.id());
        assert!(h.dispatcher.is_active());
        h.dispatcher.remove(b.id());
        assert!(!h.dispatcher.is_active());
        assert_eq!(h.scheduler.active_timers(), 0);

        // Second removal is a no-op
        h.dispatcher.remove(b.id());
        assert!(!h.dispatcher.is_active());
        assert_eq!(h.dispatcher.registered_count(), 0);
    }

    #[test]
    fn test_poll_only_routes_new_entries() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Resource]);
        h.dispatcher.add(a.clone());

        h.push(EntryType::Resource, "/a.js");
        h.push(EntryType::Resource, "/b.js");
        let first = h.dispatcher.poll_once();
        assert_eq!(first.new_entries, 2);

        h.push(EntryType::Resource, "/c.js");
        let second = h.dispatcher.poll_once();
        assert_eq!(second.pulled, 3);
        assert_eq!(second.new_entries, 1);
        assert_eq!(a.inbox_len(), 3);
        assert_eq!(h.dispatcher.seen_count(), 3);
    }

    #[test]
    fn test_routes_by_entry_type() {
        let h = Harness::immediate();
        let resources_1 = TestSubscriber::new(&[EntryType::Resource]);
        let marks = TestSubscriber::new(&[EntryType::Mark]);
        let resources_2 = TestSubscriber::new(&[EntryType::Resource]);
        h.dispatcher.add(resources_1.clone());
        h.dispatcher.add(marks.clone());
        h.dispatcher.add(resources_2.clone());

        for i in 0..5 {
            h.push(EntryType::Resource, &format!("/{i}.js"));
        }
        h.push(EntryType::Measure, "m");

        let report = h.dispatcher.poll_once();
        assert_eq!(report.routed, 10);
        assert_eq!(report.unmatched, 1);
        assert_eq!(resources_1.inbox_len(), 5);
        assert_eq!(marks.inbox_len(), 0);
        assert_eq!(resources_2.inbox_len(), 5);
        assert_eq!(h.dispatcher.seen_count(), 6);
    }

    #[test]
    fn test_one_batch_per_poll() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());

        h.push(EntryType::Mark, "one");
        h.push(EntryType::Mark, "two");
        h.push(EntryType::Mark, "three");
        h.tick();

        let batches = a.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(a.inbox_len(), 0);
    }

    #[test]
    fn test_flush_pass_is_deferred() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());
        h.push(EntryType::Mark, "one");

        h.scheduler.advance(Duration::from_millis(100));
        assert_eq!(h.scheduler.pending_deferred(), 1);
        assert!(a.batches().is_empty());

        h.scheduler.run_deferred();
        assert_eq!(a.batches().len(), 1);
    }

    #[test]
    fn test_empty_inbox_is_not_delivered() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Navigation]);
        h.dispatcher.add(a.clone());
        h.push(EntryType::Mark, "unrelated");

        h.tick();
        h.tick();
        assert!(a.batches().is_empty());
        assert_eq!(h.dispatcher.metrics().batches_delivered, 0);
    }

    #[test]
    fn test_each_entry_delivered_once() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());

        let entry = h.push(EntryType::Mark, "once");
        for _ in 0..5 {
            h.tick();
        }

        let delivered: Vec<_> = a.batches().iter().flat_map(|b| b.all().to_vec()).collect();
        assert_eq!(delivered, vec![entry]);
    }

    #[test]
    fn test_unmatched_entry_is_never_redelivered() {
        let h = Harness::immediate();
        let marks = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(marks.clone());

        h.push(EntryType::Resource, "/early.js");
        h.tick();

        let late = TestSubscriber::new(&[EntryType::Resource]);
        h.dispatcher.add(late.clone());
        h.tick();

        assert!(late.batches().is_empty());
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let h = Harness::immediate();
        let bad = TestSubscriber::panicking(&[EntryType::Mark]);
        let good = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(bad.clone());
        h.dispatcher.add(good.clone());

        h.push(EntryType::Mark, "m");
        h.tick();

        assert_eq!(good.batches().len(), 1);
        let panics = h.diagnostics.panics();
        assert_eq!(panics.len(), 1);
        assert_eq!(panics[0].subscriber, bad.id());
        assert_eq!(panics[0].message, "callback failure");
        assert_eq!(h.dispatcher.metrics().callback_panics, 1);

        // Not retried
        h.tick();
        assert_eq!(h.diagnostics.panics().len(), 1);
        assert!(h.dispatcher.is_active());
    }

    #[test]
    fn test_removed_between_poll_and_flush_gets_nothing() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Mark]);
        let b = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());
        h.dispatcher.add(b.clone());
        h.push(EntryType::Mark, "m");

        h.scheduler.advance(Duration::from_millis(100));
        h.dispatcher.remove(a.id());
        h.scheduler.run_until_idle();

        assert!(a.batches().is_empty());
        assert_eq!(a.inbox_len(), 0);
        assert_eq!(b.batches().len(), 1);
    }

    #[test]
    fn test_pending_flush_runs_after_last_removal() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());
        h.push(EntryType::Mark, "m");

        h.scheduler.advance(Duration::from_millis(100));
        h.dispatcher.remove(a.id());
        assert!(!h.dispatcher.is_active());

        // The scheduled pass still runs, finds nobody registered
        assert_eq!(h.scheduler.run_until_idle(), 1);
        assert!(a.batches().is_empty());
    }

    #[test]
    fn test_frame_mode_prefers_frames() {
        let h = Harness::new(FlushMode::Frame, ManualScheduler::with_frames());
        let a = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());
        h.push(EntryType::Mark, "m");

        h.scheduler.advance(Duration::from_millis(100));
        assert_eq!(h.scheduler.pending_frames(), 1);
        assert_eq!(h.scheduler.pending_deferred(), 0);

        h.scheduler.run_frame();
        assert_eq!(a.batches().len(), 1);
    }

    #[test]
    fn test_frame_mode_falls_back_to_defer() {
        let h = Harness::new(FlushMode::Frame, ManualScheduler::new());
        let a = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());
        h.push(EntryType::Mark, "m");

        h.scheduler.advance(Duration::from_millis(100));
        assert_eq!(h.scheduler.pending_deferred(), 1);
        h.scheduler.run_deferred();
        assert_eq!(a.batches().len(), 1);
    }

    #[test]
    fn test_polls_follow_interval() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());

        h.scheduler.advance(Duration::from_millis(350));
        assert_eq!(h.dispatcher.metrics().polls, 3);

        h.dispatcher.remove(a.id());
        h.scheduler.advance(Duration::from_millis(1000));
        assert_eq!(h.dispatcher.metrics().polls, 3);
    }

    #[test]
    fn test_dropping_dispatcher_stops_timer() {
        let h = Harness::immediate();
        let a = TestSubscriber::new(&[EntryType::Mark]);
        h.dispatcher.add(a.clone());
        assert_eq!(h.scheduler.active_timers(), 1);

        let scheduler = Arc::clone(&h.scheduler);
        drop(h);
        assert_eq!(scheduler.active_timers(), 0);
    }

    /// Subscriber that reads engine state from inside its own callbacks
    struct ReentrantSubscriber {
        id: SubscriberId,
        engine: PollingDispatcher,
        inbox: Mutex<Vec<Arc<PerformanceEntry>>>,
        counts_seen: Mutex<Vec<usize>>,
        delivered: Mutex<usize>,
    }

    impl Subscriber for ReentrantSubscriber {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn is_interested(&self, _entry_type: &str) -> bool {
            self.engine.is_registered(self.id)
        }

        fn enqueue(&self, entry: Arc<PerformanceEntry>) {
            self.counts_seen.lock().unwrap().push(self.engine.registered_count());
            self.inbox.lock().unwrap().push(entry);
        }

        fn take_inbox(&self) -> Vec<Arc<PerformanceEntry>> {
            std::mem::take(&mut *self.inbox.lock().unwrap())
        }

        fn deliver(&self, entries: EntryList) {
            *self.delivered.lock().unwrap() += entries.len();
        }
    }

    #[test]
    fn test_subscriber_may_call_back_into_engine() {
        let h = Harness::immediate();
        let reentrant = Arc::new(ReentrantSubscriber {
            id: SubscriberId::next(),
            engine: h.dispatcher.clone(),
            inbox: Mutex::new(Vec::new()),
            counts_seen: Mutex::new(Vec::new()),
            delivered: Mutex::new(0),
        });
        h.dispatcher.add(reentrant.clone());
        h.push(EntryType::Mark, "m");

        let dispatcher = h.dispatcher.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(dispatcher.poll_once());
        });
        let report = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("poll_once blocked while routing to a reentrant subscriber");

        assert_eq!(report.routed, 1);
        assert_eq!(*reentrant.counts_seen.lock().unwrap(), vec![1]);
        assert_eq!(h.dispatcher.seen_count(), 1);

        h.scheduler.run_until_idle();
        assert_eq!(*reentrant.delivered.lock().unwrap(), 1);

        // Breaks the subscriber -> engine -> registry cycle
        h.dispatcher.remove(reentrant.id);
    }

    /// Manual timer whose ticking can be cut off without `stop`
    struct KillableTimer {
        clock: Arc<ManualScheduler>,
        killed: Mutex<HashSet<TimerHandle>>,
        started: Mutex<Vec<TimerHandle>>,
    }

    impl KillableTimer {
        fn kill_latest(&self) {
            let handle = *self.started.lock().unwrap().last().unwrap();
            self.clock.stop(handle);
            self.killed.lock().unwrap().insert(handle);
        }
    }

    impl Timer for KillableTimer {
        fn start_recurring(&self, interval: Duration, tick: contracts::TickFn) -> TimerHandle {
            let handle = self.clock.start_recurring(interval, tick);
            self.started.lock().unwrap().push(handle);
            handle
        }

        fn stop(&self, handle: TimerHandle) {
            self.clock.stop(handle);
        }

        fn is_running(&self, handle: TimerHandle) -> bool {
            !self.killed.lock().unwrap().contains(&handle) && self.clock.is_running(handle)
        }
    }

    #[test]
    fn test_dead_timer_is_restarted_on_add() {
        let clock = Arc::new(ManualScheduler::new());
        let timer = Arc::new(KillableTimer {
            clock: Arc::clone(&clock),
            killed: Mutex::new(HashSet::new()),
            started: Mutex::new(Vec::new()),
        });
        let entries: SharedEntries = Arc::new(Mutex::new(Vec::new()));
        let source_entries = Arc::clone(&entries);
        let dispatcher = PollingDispatcher::builder(Arc::new(move || {
            source_entries.lock().unwrap().clone()
        }))
        .config(EngineConfig {
            flush_mode: FlushMode::Immediate,
            ..EngineConfig::default()
        })
        .timer(timer.clone())
        .scheduler(clock.clone())
        .build()
        .unwrap();

        let a = TestSubscriber::new(&[EntryType::Mark]);
        dispatcher.add(a.clone());
        assert!(dispatcher.is_active());

        timer.kill_latest();
        assert!(!dispatcher.is_active());

        let b = TestSubscriber::new(&[EntryType::Mark]);
        dispatcher.add(b.clone());
        assert!(dispatcher.is_active());
        assert_eq!(timer.started.lock().unwrap().len(), 2);
        assert_eq!(clock.active_timers(), 1);

        entries
            .lock()
            .unwrap()
            .push(Arc::new(PerformanceEntry::of_type(EntryType::Mark, "m", 0.0, 0.0)));
        clock.advance_and_flush(Duration::from_millis(100));
        assert_eq!(a.batches().len(), 1);
        assert_eq!(b.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_builder_defaults_use_tokio() {
        let dispatcher = PollingDispatcher::builder(Arc::new(Vec::<Arc<PerformanceEntry>>::new))
            .build()
            .unwrap();
        assert!(!dispatcher.is_active());
        assert_eq!(dispatcher.config(), &EngineConfig::default());
    }

    #[test]
    fn test_builder_without_runtime_fails() {
        let result = PollingDispatcher::builder(Arc::new(Vec::<Arc<PerformanceEntry>>::new)).build();
        assert!(matches!(result, Err(ObserverError::NoRuntime { .. })));
    }
}
