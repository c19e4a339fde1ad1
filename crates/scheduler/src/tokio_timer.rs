//! TokioTimer - recurring timers as spawned interval tasks

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{ObserverError, TickFn, Timer, TimerHandle};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Timer collaborator backed by tokio
///
/// Each recurring timer is one spawned task; stopping aborts it. Timers are
/// spawned on the runtime of the caller of `start_recurring`, falling back to
/// the runtime captured at construction when called from outside any runtime.
pub struct TokioTimer {
    runtime: Handle,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TimerHandle, JoinHandle<()>>>,
}

impl TokioTimer {
    /// Bind to the runtime of the calling context
    ///
    /// # Errors
    /// Returns `NoRuntime` when called outside a tokio runtime.
    pub fn new() -> Result<Self, ObserverError> {
        let runtime = Handle::try_current().map_err(|e| ObserverError::no_runtime(e.to_string()))?;
        Ok(Self::with_handle(runtime))
    }

    /// Bind to an explicit runtime handle
    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of timers currently running
    pub fn active_timers(&self) -> usize {
        self.lock_tasks().len()
    }

    fn spawn_handle(&self) -> Handle {
        Handle::try_current().unwrap_or_else(|_| {
            trace!("No current runtime, spawning on the construction runtime");
            self.runtime.clone()
        })
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<TimerHandle, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Timer for TokioTimer {
    fn start_recurring(&self, interval: Duration, tick: TickFn) -> TimerHandle {
        let handle = TimerHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));

        let task = self.spawn_handle().spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                trace!(timer = %handle, "Timer tick");
                tick();
            }
        });

        self.lock_tasks().insert(handle, task);
        debug!(timer = %handle, interval_ms = interval.as_millis() as u64, "Recurring timer started");
        handle
    }

    fn stop(&self, handle: TimerHandle) {
        if let Some(task) = self.lock_tasks().remove(&handle) {
            task.abort();
            debug!(timer = %handle, "Recurring timer stopped");
        }
    }

    /// A task whose runtime shut down has finished even though it was never
    /// stopped
    fn is_running(&self, handle: TimerHandle) -> bool {
        self.lock_tasks()
            .get(&handle)
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for (_, task) in self.lock_tasks().drain() {
            task.abort();
        }
    }
}
