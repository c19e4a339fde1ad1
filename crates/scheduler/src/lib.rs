//! # Scheduler
//!
//! Timer and deferred-task collaborators for the dispatch engine.
//!
//! - [`TokioTimer`] / [`TokioDeferred`]: production collaborators bound to a
//!   tokio runtime
//! - [`ManualScheduler`]: virtual clock for deterministic tests, implements
//!   both traits

mod manual;
mod tokio_deferred;
mod tokio_timer;

pub use contracts::{DeferredScheduler, DeferredTask, TickFn, Timer, TimerHandle};
pub use manual::ManualScheduler;
pub use tokio_deferred::TokioDeferred;
pub use tokio_timer::TokioTimer;
