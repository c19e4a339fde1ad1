//! # Timeline
//!
//! In-process performance timeline: the shared append-only entry buffer the
//! dispatch engine polls.
//!
//! Responsibilities:
//! - Record marks, measures, resource and navigation timings
//! - Cap user timing and resource buffers, overwriting the oldest entry
//! - Expose the full buffer through `contracts::EntrySource`
//! - Drive a synthetic workload for demos and tests
//!
//! ## Usage Example
//!
//! ```
//! use timeline::PerformanceTimeline;
//! use contracts::EntrySource;
//!
//! let timeline = PerformanceTimeline::default();
//! timeline.mark("app-start");
//! timeline.mark("app-ready");
//! timeline.measure("boot", Some("app-start"), Some("app-ready")).unwrap();
//! assert_eq!(timeline.entries().len(), 3);
//! ```

mod mock;
mod performance;

pub use mock::{MockWorkload, MockWorkloadConfig, WorkloadCounters};
pub use performance::{global_timeline, PerformanceTimeline};
