//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use horizon_collections::{CollectionChange, Item, ListenerGuard, ObservableList};
use parking_lot::Mutex;

/// Route `tracing` output to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A consumer-side copy of a decorated view, kept in sync from events only.
pub struct Mirror<T: Item> {
    items: Arc<Mutex<Vec<T>>>,
    events: Arc<Mutex<Vec<CollectionChange<T>>>>,
    _guard: ListenerGuard<T>,
}

impl<T: Item + std::fmt::Debug> Mirror<T> {
    pub fn attach(list: &ObservableList<T>) -> Self {
        let items = Arc::new(Mutex::new(Vec::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let (sink_items, sink_events) = (items.clone(), events.clone());
        let (snapshot, guard) = list
            .subscribe_decorated(move |change: &CollectionChange<T>| {
                change
                    .apply_to(&mut sink_items.lock())
                    .expect("decorated event must fit the mirrored view");
                sink_events.lock().push(change.clone());
            })
            .expect("list is idle");
        *items.lock() = snapshot;
        Self {
            items,
            events,
            _guard: guard,
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    pub fn events(&self) -> Vec<CollectionChange<T>> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(CollectionChange::kind).collect()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Assert the mirror matches the list's decorated view.
    pub fn assert_synced(&self, list: &ObservableList<T>) {
        assert_eq!(self.items(), list.decorated_items(), "mirror diverged from decorated view");
    }
}
