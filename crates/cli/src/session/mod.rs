//! Observation session module.

mod runner;
mod stats;

pub use runner::{Session, SessionConfig};
pub use stats::{ObserverReport, SessionStats};
