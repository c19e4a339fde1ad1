//! ManualScheduler - virtual clock for deterministic tests
//!
//! Nothing runs on its own. `advance` moves the clock and fires due timer
//! ticks in deadline order; deferred and frame tasks sit in queues until
//! `run_deferred`, `run_frame` or `run_until_idle` drains them.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{DeferredScheduler, DeferredTask, TickFn, Timer, TimerHandle};
use tracing::trace;

struct ManualTimer {
    interval: Duration,
    next_fire: Duration,
    tick: TickFn,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<u64, ManualTimer>,
    deferred: VecDeque<DeferredTask>,
    frames: VecDeque<DeferredTask>,
}

/// Virtual-time timer and deferred scheduler
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
    frames_enabled: bool,
}

impl ManualScheduler {
    /// Scheduler without frame support (frame requests fall back to `defer`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler that accepts frame-aligned requests
    pub fn with_frames() -> Self {
        Self {
            frames_enabled: true,
            ..Self::default()
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    pub fn active_timers(&self) -> usize {
        self.lock().timers.len()
    }

    pub fn pending_deferred(&self) -> usize {
        self.lock().deferred.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.lock().frames.len()
    }

    /// Move the clock forward, firing every tick that falls due
    ///
    /// Returns the number of ticks fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut fired = 0;

        loop {
            let tick = {
                let mut state = self.lock();
                let due = state
                    .timers
                    .iter()
                    .filter(|(_, t)| t.next_fire <= target)
                    .min_by_key(|(id, t)| (t.next_fire, **id))
                    .map(|(id, _)| *id);

                let Some(id) = due else {
                    state.now = target;
                    break;
                };

                let Some(timer) = state.timers.get_mut(&id) else {
                    break;
                };
                let fire_at = timer.next_fire;
                timer.next_fire += timer.interval;
                let tick = timer.tick.clone();
                state.now = fire_at;
                trace!(timer = id, at_ms = fire_at.as_millis() as u64, "Manual tick");
                tick
            };

            // Tick runs without the lock so it may start or stop timers
            tick();
            fired += 1;
        }

        fired
    }

    /// Run queued zero-delay tasks, including ones queued while running
    pub fn run_deferred(&self) -> usize {
        self.drain(|state| state.deferred.pop_front())
    }

    /// Run queued frame-aligned tasks
    pub fn run_frame(&self) -> usize {
        self.drain(|state| state.frames.pop_front())
    }

    /// Run both queues until neither has work
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_frame() + self.run_deferred();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }

    /// `advance` followed by `run_until_idle`
    pub fn advance_and_flush(&self, by: Duration) -> usize {
        let ticks = self.advance(by);
        self.run_until_idle();
        ticks
    }

    fn drain(&self, mut next: impl FnMut(&mut ManualState) -> Option<DeferredTask>) -> usize {
        let mut ran = 0;
        loop {
            let Some(task) = next(&mut self.lock()) else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Timer for ManualScheduler {
    fn start_recurring(&self, interval: Duration, tick: TickFn) -> TimerHandle {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        let interval = interval.max(Duration::from_nanos(1));
        let next_fire = state.now + interval;
        state.timers.insert(
            id,
            ManualTimer {
                interval,
                next_fire,
                tick,
            },
        );
        TimerHandle::new(id)
    }

    fn stop(&self, handle: TimerHandle) {
        self.lock().timers.remove(&handle.get());
    }

    fn is_running(&self, handle: TimerHandle) -> bool {
        self.lock().timers.contains_key(&handle.get())
    }
}

impl DeferredScheduler for ManualScheduler {
    fn defer(&self, task: DeferredTask) {
        self.lock().deferred.push_back(task);
    }

    fn request_frame(&self, task: DeferredTask) -> Result<(), DeferredTask> {
        if !self.frames_enabled {
            return Err(task);
        }
        self.lock().frames.push_back(task);
        Ok(())
    }
}
