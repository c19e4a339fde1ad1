//! # Dispatcher
//!
//! The polling dispatch engine.
//!
//! Responsibilities:
//! - Poll the entry source on a recurring timer while observers are registered
//! - Deduplicate entries through a seen-set
//! - Route each new entry to every observer interested in its type
//! - Deliver each observer's inbox as one batch per poll, on a deferred task
//!
//! ## Lifecycle
//!
//! ```text
//!            add (0 -> 1)
//!   Idle ───────────────────► Active ──┐ tick: poll_once ─► defer(flush_all)
//!    ▲                          │  ◄────┘
//!    └──────────────────────────┘
//!            remove (1 -> 0)
//! ```

pub mod dispatcher;
pub mod metrics;

pub use contracts::{EntryList, Subscriber, SubscriberId};
pub use dispatcher::{DispatcherBuilder, PollReport, PollingDispatcher};
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
