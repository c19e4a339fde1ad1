//! # Observer
//!
//! `PerformanceObserver` façade over the polling dispatch engine.
//!
//! ## Usage Example
//!
//! ```ignore
//! use observer::{ObserveOptions, PerformanceObserver};
//!
//! let observer = PerformanceObserver::new(|entries, _observer| {
//!     for entry in entries {
//!         println!("{} {}", entry.entry_type(), entry.name());
//!     }
//! })?;
//! observer.observe(ObserveOptions::entry_types(["mark", "measure"]))?;
//! ```

mod global;
mod observer;
mod options;

pub use contracts::{EntryList, EntryType, ObserverError, PerformanceEntry};
pub use global::{default_dispatcher, install_default_dispatcher};
pub use observer::{ObserverCallback, PerformanceObserver};
pub use options::ObserveOptions;
