//! Process-wide default engine

use std::sync::{Arc, OnceLock};

use contracts::{EntrySource, ObserverError};
use dispatcher::PollingDispatcher;
use timeline::global_timeline;
use tracing::debug;

static DEFAULT_DISPATCHER: OnceLock<PollingDispatcher> = OnceLock::new();

/// The engine used by [`PerformanceObserver::new`](crate::PerformanceObserver::new)
///
/// Built on first use from the default engine config, the global timeline
/// and tokio collaborators of the current runtime.
///
/// # Errors
/// `NoRuntime` when first used outside a tokio runtime.
pub fn default_dispatcher() -> Result<PollingDispatcher, ObserverError> {
    if let Some(dispatcher) = DEFAULT_DISPATCHER.get() {
        return Ok(dispatcher.clone());
    }

    let source: Arc<dyn EntrySource> = global_timeline();
    let dispatcher = PollingDispatcher::builder(source).build()?;
    debug!("Default dispatcher initialized");
    Ok(DEFAULT_DISPATCHER.get_or_init(|| dispatcher).clone())
}

/// Install `dispatcher` as the default engine
///
/// # Errors
/// `DefaultAlreadyInitialized` if a default already exists (installed or
/// built on first use).
pub fn install_default_dispatcher(dispatcher: PollingDispatcher) -> Result<(), ObserverError> {
    DEFAULT_DISPATCHER
        .set(dispatcher)
        .map_err(|_| ObserverError::DefaultAlreadyInitialized)
}
