//! Side channels for non-fatal conditions
//!
//! Advisories (some or all requested entry types unrecognized) and callback
//! panics are not errors returned to any caller. They are reported here.

use std::any::Any;
use std::fmt;
use std::sync::Mutex;

use tracing::{error, warn};

use crate::SubscriberId;

/// Non-fatal warning raised by `observe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Some requested entry types were unrecognized and dropped
    InvalidEntryTypesDropped { invalid: Vec<String> },
    /// No valid entry types remained, registration skipped
    NothingToObserve { invalid: Vec<String> },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::InvalidEntryTypesDropped { invalid } => write!(
                f,
                "invalid entry types dropped from observe request: {:?}",
                invalid
            ),
            Advisory::NothingToObserve { invalid } => write!(
                f,
                "a performance observer must have at least one valid entry type, nothing to observe (ignored: {:?})",
                invalid
            ),
        }
    }
}

/// A subscriber callback that panicked during flush
#[derive(Debug, Clone)]
pub struct CallbackPanic {
    pub subscriber: SubscriberId,
    pub message: String,
}

impl CallbackPanic {
    /// Build from a `catch_unwind` payload
    pub fn from_payload(subscriber: SubscriberId, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self {
            subscriber,
            message,
        }
    }
}

impl fmt::Display for CallbackPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} callback panicked: {}", self.subscriber, self.message)
    }
}

/// Sink for advisories and unhandled callback failures
pub trait Diagnostics: Send + Sync {
    fn advisory(&self, advisory: &Advisory) {
        warn!(advisory = %advisory, "PerformanceObserver advisory");
    }

    fn unhandled(&self, panic: &CallbackPanic) {
        error!(
            observer = %panic.subscriber,
            message = %panic.message,
            "Observer callback panicked"
        );
    }
}

/// Default diagnostics: advisories at WARN, callback panics at ERROR
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {}

/// Diagnostics that keeps every report in memory (for tests and tooling)
///
/// Reports are also forwarded to tracing.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    advisories: Mutex<Vec<Advisory>>,
    panics: Mutex<Vec<CallbackPanic>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advisories(&self) -> Vec<Advisory> {
        self.advisories
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    pub fn panics(&self) -> Vec<CallbackPanic> {
        self.panics.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn advisory(&self, advisory: &Advisory) {
        TracingDiagnostics.advisory(advisory);
        if let Ok(mut advisories) = self.advisories.lock() {
            advisories.push(advisory.clone());
        }
    }

    fn unhandled(&self, panic: &CallbackPanic) {
        TracingDiagnostics.unhandled(panic);
        if let Ok(mut panics) = self.panics.lock() {
            panics.push(panic.clone());
        }
    }
}
