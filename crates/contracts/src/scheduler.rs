//! Timer and deferred-task collaborators
//!
//! The dispatch engine never touches a concrete runtime. It starts and stops
//! its recurring poll through [`Timer`] and queues the batched flush pass
//! through [`DeferredScheduler`], so tests can swap in a manual clock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback fired on every tick of a recurring timer
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// One-shot task queued on a [`DeferredScheduler`]
pub type DeferredTask = Box<dyn FnOnce() + Send>;

/// Opaque handle returned by [`Timer::start_recurring`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Recurring timer collaborator
pub trait Timer: Send + Sync {
    /// Start calling `tick` every `interval`, first call one interval from now
    fn start_recurring(&self, interval: Duration, tick: TickFn) -> TimerHandle;

    /// Stop a timer. Stopping an unknown or already stopped handle is a no-op.
    fn stop(&self, handle: TimerHandle);

    /// Timer is still ticking
    ///
    /// A timer can die without `stop`, e.g. when the runtime driving it shuts
    /// down. The engine restarts polling when it finds its timer dead.
    fn is_running(&self, handle: TimerHandle) -> bool {
        let _ = handle;
        true
    }
}

/// "Run once, soon" collaborator
pub trait DeferredScheduler: Send + Sync {
    /// Run `task` after the current unit of work, with no added delay
    fn defer(&self, task: DeferredTask);

    /// Run `task` aligned to the next frame
    ///
    /// Returns the task back when the environment has no notion of frames;
    /// callers fall back to [`DeferredScheduler::defer`].
    fn request_frame(&self, task: DeferredTask) -> Result<(), DeferredTask> {
        Err(task)
    }
}
