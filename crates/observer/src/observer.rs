//! PerformanceObserver - registration handle and subscriber state

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use contracts::{
    Advisory, EntryList, EntryType, ObserverError, PerformanceEntry, Subscriber, SubscriberId,
};
use dispatcher::PollingDispatcher;
use tracing::{debug, instrument};

use crate::global::default_dispatcher;
use crate::ObserveOptions;

/// Delivery callback
///
/// Receives one batch per flush together with the observer it belongs to.
pub type ObserverCallback = Arc<dyn Fn(&EntryList, &PerformanceObserver) + Send + Sync>;

#[derive(Default)]
struct ObserverState {
    categories: Vec<EntryType>,
    inbox: Vec<Arc<PerformanceEntry>>,
}

struct ObserverInner {
    id: SubscriberId,
    callback: ObserverCallback,
    dispatcher: PollingDispatcher,
    state: Mutex<ObserverState>,
    // Rebuilds a handle for the callback
    this: Weak<ObserverInner>,
}

impl ObserverInner {
    fn lock_state(&self) -> MutexGuard<'_, ObserverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Subscriber for ObserverInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn is_interested(&self, entry_type: &str) -> bool {
        EntryType::parse(entry_type)
            .is_some_and(|category| self.lock_state().categories.contains(&category))
    }

    fn enqueue(&self, entry: Arc<PerformanceEntry>) {
        self.lock_state().inbox.push(entry);
    }

    fn take_inbox(&self) -> Vec<Arc<PerformanceEntry>> {
        std::mem::take(&mut self.lock_state().inbox)
    }

    fn deliver(&self, entries: EntryList) {
        let Some(inner) = self.this.upgrade() else {
            return;
        };
        let observer = PerformanceObserver { inner };
        (self.callback)(&entries, &observer);
    }
}

/// Handle to one registration with a dispatch engine
///
/// Clones refer to the same observer.
#[derive(Clone)]
pub struct PerformanceObserver {
    inner: Arc<ObserverInner>,
}

impl PerformanceObserver {
    /// Create an observer bound to the process-wide default engine
    ///
    /// # Errors
    /// `NoRuntime` if the default engine has to be built outside a tokio
    /// runtime.
    pub fn new<F>(callback: F) -> Result<Self, ObserverError>
    where
        F: Fn(&EntryList, &PerformanceObserver) + Send + Sync + 'static,
    {
        Ok(Self::with_dispatcher(callback, default_dispatcher()?))
    }

    /// Create an observer bound to an explicit engine
    pub fn with_dispatcher<F>(callback: F, dispatcher: PollingDispatcher) -> Self
    where
        F: Fn(&EntryList, &PerformanceObserver) + Send + Sync + 'static,
    {
        Self::from_callback(Arc::new(callback), dispatcher)
    }

    pub fn from_callback(callback: ObserverCallback, dispatcher: PollingDispatcher) -> Self {
        let inner = Arc::new_cyclic(|this| ObserverInner {
            id: SubscriberId::next(),
            callback,
            dispatcher,
            state: Mutex::new(ObserverState::default()),
            this: this.clone(),
        });
        Self { inner }
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Entry types that can be observed
    pub fn supported_entry_types() -> &'static [EntryType] {
        &EntryType::ALL
    }

    /// Start (or re-scope) observation
    ///
    /// Unrecognized names are dropped with an advisory. If none remain, a
    /// "nothing to observe" advisory is raised and the call returns `Ok(())`
    /// without registering. Otherwise the deduplicated categories replace
    /// the previous set and the observer is registered.
    ///
    /// # Errors
    /// `MissingCategorySpec` when neither form is given,
    /// `ConflictingCategorySpec` when both are.
    #[instrument(name = "observer_observe", skip(self, options), fields(observer = %self.inner.id))]
    pub fn observe(&self, options: ObserveOptions) -> Result<(), ObserverError> {
        let requested = options.requested()?;

        let mut categories: Vec<EntryType> = Vec::with_capacity(requested.len());
        let mut invalid = Vec::new();
        for name in requested {
            match EntryType::parse(&name) {
                Some(category) if !categories.contains(&category) => categories.push(category),
                Some(_) => {}
                None => invalid.push(name),
            }
        }

        if categories.is_empty() {
            self.advise(Advisory::NothingToObserve { invalid });
            return Ok(());
        }
        if !invalid.is_empty() {
            self.advise(Advisory::InvalidEntryTypesDropped { invalid });
        }

        debug!(categories = ?categories, "Observing");
        self.inner.lock_state().categories = categories;
        self.inner.dispatcher.add(self.inner.clone());
        Ok(())
    }

    /// Stop observation; idempotent
    ///
    /// Undelivered entries are discarded.
    pub fn disconnect(&self) {
        self.inner.dispatcher.remove(self.inner.id);
    }

    /// Copy of the entries routed but not yet delivered
    ///
    /// Does not clear the inbox.
    pub fn take_records(&self) -> EntryList {
        EntryList::new(self.inner.lock_state().inbox.clone())
    }

    /// Current category set (empty before the first successful `observe`)
    pub fn entry_types(&self) -> Vec<EntryType> {
        self.inner.lock_state().categories.clone()
    }

    pub fn is_observing(&self) -> bool {
        self.inner.dispatcher.is_registered(self.inner.id)
    }

    pub fn dispatcher(&self) -> &PollingDispatcher {
        &self.inner.dispatcher
    }

    fn advise(&self, advisory: Advisory) {
        observability::record_advisory(&advisory);
        self.inner.dispatcher.diagnostics().advisory(&advisory);
    }
}

impl fmt::Debug for PerformanceObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformanceObserver")
            .field("id", &self.inner.id)
            .field("entry_types", &self.entry_types())
            .finish()
    }
}
