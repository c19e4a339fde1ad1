//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: the
//! performance entry value types, the entry collection handed to observer
//! callbacks, and the collaborator traits the dispatch engine is written
//! against (entry source, timer, deferred scheduler, subscriber, diagnostics).
//!
//! All business crates can only depend on this crate, reverse dependencies are
//! prohibited.
//!
//! ## Time Model
//! - Entry timestamps are milliseconds (f64) relative to the timeline origin
//! - Engine intervals are `std::time::Duration`

mod config;
mod diagnostics;
mod entry;
mod entry_list;
mod entry_type;
mod error;
mod scheduler;
mod source;
mod subscriber;

pub use config::*;
pub use diagnostics::*;
pub use entry::{EntryId, PerformanceEntry};
pub use entry_list::EntryList;
pub use entry_type::EntryType;
pub use error::*;
pub use scheduler::*;
pub use source::EntrySource;
pub use subscriber::{Subscriber, SubscriberId};
