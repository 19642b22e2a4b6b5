//! Coordinated-view session
//!
//! A [`Session`] is built once and handed to every view constructor. It owns
//! the event bus, the reactive store, the selection store and the sync
//! registry; views reach shared state only through it.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::events::{Event, EventBus, FilterChanged, FilterReset, Hover};
use crate::filter::FilterState;
use crate::ids::SourceId;
use crate::selection::{ClearScope, SelectionStore};
use crate::store::ReactiveStore;
use crate::subscription::Subscription;
use crate::sync::SyncManager;

struct SessionInner {
    config: SessionConfig,
    bus: EventBus,
    store: ReactiveStore,
    selection: SelectionStore,
    sync: Arc<SyncManager>,
    sync_subscription: Subscription,
}

/// Shared state for one set of coordinated views. Cloning is cheap.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session; debounced delivery uses the current tokio runtime, if any
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, EventBus::new()))
    }

    /// Create a session whose debounce timers run on `runtime`
    pub fn with_runtime(config: SessionConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, EventBus::with_runtime(runtime)))
    }

    fn assemble(config: SessionConfig, bus: EventBus) -> Self {
        let store = ReactiveStore::new();
        let selection = SelectionStore::new(bus.clone());
        let sync = Arc::new(SyncManager::new(config.default_sync));
        let sync_subscription = sync.attach(&bus);

        info!(
            preview_window_ms = config.brush_preview_window_ms,
            filter_key = %config.filter_key,
            "session started"
        );

        Self {
            inner: Arc::new(SessionInner {
                config,
                bus,
                store,
                selection,
                sync,
                sync_subscription,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn store(&self) -> &ReactiveStore {
        &self.inner.store
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.inner.selection
    }

    /// Shared handle so view callbacks can consult settings without holding the session
    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.inner.sync
    }

    /// Active filters; empty if none were ever set
    pub fn filters(&self) -> Result<FilterState> {
        Ok(self
            .inner
            .store
            .get_as(&self.inner.config.filter_key)?
            .unwrap_or_default())
    }

    /// Replace the whole filter record, then announce it.
    /// Rejected without any change if a range is reversed or non-finite.
    pub fn set_filters(&self, filters: FilterState, source: impl Into<SourceId>) -> Result<()> {
        filters.validate()?;
        let source = source.into();
        self.inner
            .store
            .set_as(&self.inner.config.filter_key, &filters)?;
        self.inner
            .bus
            .emit(Event::FilterChanged(FilterChanged { filters, source }));
        Ok(())
    }

    /// Drop every filter, then announce the reset
    pub fn reset_filters(&self, source: impl Into<SourceId>) -> Result<()> {
        let source = source.into();
        self.inner
            .store
            .set_as(&self.inner.config.filter_key, &FilterState::default())?;
        self.inner
            .bus
            .emit(Event::FilterReset(FilterReset { source }));
        Ok(())
    }

    /// Mirror the hovered element (or none) into the reactive store
    pub fn set_hovered(&self, hover: Option<&Hover>) -> Result<()> {
        self.inner.store.set_as(&self.inner.config.hover_key, &hover)?;
        Ok(())
    }

    /// Clear the hover mirror if `source` wrote it. Another view's later
    /// hover is left alone. True if the mirror was cleared.
    pub fn release_hover(&self, source: &SourceId) -> Result<bool> {
        match self.hovered()? {
            Some(hover) if &hover.source == source => {
                self.set_hovered(None)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn hovered(&self) -> Result<Option<Hover>> {
        Ok(self
            .inner
            .store
            .get_as::<Option<Hover>>(&self.inner.config.hover_key)?
            .flatten())
    }

    /// Clear every selection, then every filter.
    ///
    /// Each step is announced as soon as its state has changed, so filter
    /// watchers run after `selection-cleared` and before `filter-reset`.
    pub fn reset(&self, source: impl Into<SourceId>) -> Result<()> {
        let source = source.into();
        self.inner.selection.clear(ClearScope::All, source.clone());
        self.reset_filters(source)
    }

    /// Deliver pending debounced events and detach session-level subscribers.
    /// Returns how many debounced events were flushed.
    pub fn shutdown(&self) -> usize {
        let flushed = self.inner.bus.flush_debounced();
        self.inner.sync_subscription.unsubscribe();
        info!(flushed, "session shut down");
        flushed
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("selection", &self.inner.selection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Topic;
    use crate::filter::NumericRange;
    use crate::selection::SelectOptions;
    use parking_lot::Mutex;

    fn session() -> Session {
        Session::new(SessionConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SessionConfig {
            brush_preview_window_ms: 0,
            ..SessionConfig::default()
        };
        assert!(Session::new(config).is_err());
    }

    #[test]
    fn test_filters_flow_through_store_and_bus() {
        let session = session();
        let watched = Arc::new(Mutex::new(0));
        let w = watched.clone();
        let _watch = session.store().watch("filters", move |_| *w.lock() += 1);
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        let _sub = session
            .bus()
            .on(Topic::FilterChanged, move |event| e.lock().push(event.clone()));

        let filters = FilterState::new().with_range("expr", NumericRange::new(0.0, 3.0));
        session.set_filters(filters.clone(), "panel").unwrap();

        assert_eq!(session.filters().unwrap(), filters);
        assert_eq!(*watched.lock(), 1);
        assert_eq!(
            events.lock()[0],
            Event::FilterChanged(FilterChanged {
                filters,
                source: "panel".into(),
            })
        );
    }

    #[test]
    fn test_filters_default_to_empty() {
        assert!(session().filters().unwrap().is_empty());
    }

    #[test]
    fn test_reset_clears_selection_and_filters() {
        let session = session();
        session
            .selection()
            .select("sample", ["s1"], SelectOptions::replace("plot"));
        session
            .set_filters(
                FilterState::new().with_range("expr", NumericRange::new(0.0, 1.0)),
                "panel",
            )
            .unwrap();

        let topics = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Vec::new();
        for topic in [Topic::SelectionCleared, Topic::FilterReset] {
            let t = topics.clone();
            subs.push(session.bus().on(topic, move |event| t.lock().push(event.topic())));
        }

        session.reset("toolbar").unwrap();

        assert!(session.selection().get_selected("sample").is_empty());
        assert!(session.filters().unwrap().is_empty());
        assert_eq!(*topics.lock(), vec![Topic::SelectionCleared, Topic::FilterReset]);
    }

    #[test]
    fn test_reset_announces_each_step_after_its_state_change() {
        let session = session();
        session
            .selection()
            .select("sample", ["s1"], SelectOptions::replace("plot"));
        session
            .set_filters(
                FilterState::new().with_range("expr", NumericRange::new(0.0, 1.0)),
                "panel",
            )
            .unwrap();

        let steps = Arc::new(Mutex::new(Vec::new()));
        let observer = session.clone();
        let s = steps.clone();
        let cleared = session.bus().on(Topic::SelectionCleared, move |_| {
            let filtered = !observer.filters().unwrap().is_empty();
            s.lock().push(("cleared", filtered));
        });
        let observer = session.clone();
        let s = steps.clone();
        let watch = session.store().watch("filters", move |_| {
            let selected = observer.selection().get_count("sample") > 0;
            s.lock().push(("watch", selected));
        });
        let observer = session.clone();
        let s = steps.clone();
        let reset = session.bus().on(Topic::FilterReset, move |_| {
            let filtered = !observer.filters().unwrap().is_empty();
            s.lock().push(("reset", filtered));
        });

        session.reset("toolbar").unwrap();

        assert_eq!(
            *steps.lock(),
            vec![("cleared", true), ("watch", false), ("reset", false)]
        );
        cleared.unsubscribe();
        watch.unsubscribe();
        reset.unsubscribe();
    }

    #[test]
    fn test_hover_mirror_round_trip() {
        let session = session();
        let hover = Hover {
            id: "g3".into(),
            selection_type: "gene".into(),
            source: "matrix".into(),
            position: None,
        };
        session.set_hovered(Some(&hover)).unwrap();
        assert_eq!(session.hovered().unwrap(), Some(hover));

        session.set_hovered(None).unwrap();
        assert_eq!(session.hovered().unwrap(), None);
    }

    #[test]
    fn test_release_hover_only_clears_own_entry() {
        let session = session();
        let hover = Hover {
            id: "s2".into(),
            selection_type: "sample".into(),
            source: "table".into(),
            position: None,
        };
        session.set_hovered(Some(&hover)).unwrap();

        assert!(!session.release_hover(&"plot".into()).unwrap());
        assert_eq!(session.hovered().unwrap(), Some(hover));
        assert!(session.release_hover(&"table".into()).unwrap());
        assert_eq!(session.hovered().unwrap(), None);
    }

    #[test]
    fn test_shutdown_detaches_sync_registry() {
        let session = session();
        assert_eq!(session.bus().subscriber_count(Topic::ViewDestroyed), 1);
        session.shutdown();
        assert_eq!(session.bus().subscriber_count(Topic::ViewDestroyed), 0);
    }
}
