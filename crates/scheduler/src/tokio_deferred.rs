//! TokioDeferred - "run once, soon" on a tokio runtime

use std::time::Duration;

use contracts::{DeferredScheduler, DeferredTask, ObserverError};
use tokio::runtime::Handle;
use tokio::time::{sleep_until, Instant};

/// Deferred-task collaborator backed by tokio
///
/// `defer` spawns the task immediately. When built with a frame interval,
/// `request_frame` runs the task at the next frame boundary measured from the
/// scheduler's creation; otherwise frame requests are refused. Tasks go to the
/// caller's runtime when there is one, else to the construction runtime.
pub struct TokioDeferred {
    runtime: Handle,
    frame_interval: Option<Duration>,
    origin: Instant,
}

impl TokioDeferred {
    /// Zero-delay scheduler without frame support
    ///
    /// # Errors
    /// Returns `NoRuntime` when called outside a tokio runtime.
    pub fn new() -> Result<Self, ObserverError> {
        let runtime = Handle::try_current().map_err(|e| ObserverError::no_runtime(e.to_string()))?;
        Ok(Self::with_handle(runtime, None))
    }

    /// Scheduler with frame-aligned scheduling every `frame_interval`
    ///
    /// # Errors
    /// Returns `NoRuntime` when called outside a tokio runtime.
    pub fn with_frames(frame_interval: Duration) -> Result<Self, ObserverError> {
        let runtime = Handle::try_current().map_err(|e| ObserverError::no_runtime(e.to_string()))?;
        Ok(Self::with_handle(runtime, Some(frame_interval)))
    }

    pub fn with_handle(runtime: Handle, frame_interval: Option<Duration>) -> Self {
        Self {
            runtime,
            frame_interval: frame_interval.filter(|f| !f.is_zero()),
            origin: Instant::now(),
        }
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval
    }

    fn spawn_handle(&self) -> Handle {
        Handle::try_current().unwrap_or_else(|_| self.runtime.clone())
    }
}

impl DeferredScheduler for TokioDeferred {
    fn defer(&self, task: DeferredTask) {
        self.spawn_handle().spawn(async move { task() });
    }

    fn request_frame(&self, task: DeferredTask) -> Result<(), DeferredTask> {
        let Some(frame) = self.frame_interval else {
            return Err(task);
        };
        let deadline = next_frame_deadline(self.origin, Instant::now(), frame);
        self.spawn_handle().spawn(async move {
            sleep_until(deadline).await;
            task()
        });
        Ok(())
    }
}

/// First frame boundary strictly after `now`
fn next_frame_deadline(origin: Instant, now: Instant, frame: Duration) -> Instant {
    let frame_ns = frame.as_nanos().max(1);
    let elapsed_ns = now.saturating_duration_since(origin).as_nanos();
    let next = (elapsed_ns / frame_ns + 1) * frame_ns;
    origin + Duration::from_nanos(u64::try_from(next).unwrap_or(u64::MAX))
}
