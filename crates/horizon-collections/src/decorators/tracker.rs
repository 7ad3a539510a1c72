//! Fold-based aggregation over the items passing through a stage.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use horizon_collections_core::Property;

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, Item, DEFAULT_PRIORITY};

use super::KeyFn;

/// Shared handle to the state a tracker folds into.
pub type TrackerState<S> = Arc<Property<S>>;

/// Type alias for an add or remove fold step: `(state, item, occurrences)`.
pub type TrackFn<T, S> = Arc<dyn Fn(&mut S, &T, usize) + Send + Sync>;

/// Type alias for an item-changed fold step: `(state, item, occurrences, args)`.
pub type ChangeTrackFn<T, S> = Arc<dyn Fn(&mut S, &T, usize, Option<&str>) + Send + Sync>;

/// Type alias for a reset fold: `(state, [(first item of key, occurrences)])`.
pub type ResetFn<T, S> = Arc<dyn Fn(&mut S, &[(T, usize)]) + Send + Sync>;

/// Folds upstream changes into external state without altering the view.
///
/// Items are counted per key. `on_added` sees the key's count after the
/// item joined, `on_removed` the count left after it went away, so `1` and
/// `0` mark the first and last occurrence. A replace is a removal followed
/// by an addition. An item-changed event whose key moved is treated the
/// same way; otherwise it goes to `on_changed`, if set.
///
/// On reset the state is rebuilt either through `on_reset`, or by restoring
/// the initial state and folding every item through `on_added`. Each rebuild
/// notifies [`Property::changed`] once.
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::TrackerDecorator;
///
/// let tracker = TrackerDecorator::new(
///     |word: &&str| word.len(),
///     0usize,
///     |lengths, _, count| if count == 1 { *lengths += 1 },
///     |lengths, _, count| if count == 0 { *lengths -= 1 },
/// );
/// let distinct_lengths = tracker.state();
///
/// let list = ObservableList::from_vec(vec!["a", "bb", "cc"]);
/// list.add_decorator(tracker).unwrap();
/// assert_eq!(distinct_lengths.get(), 2);
///
/// list.push("ddd").unwrap();
/// assert_eq!(distinct_lengths.get(), 3);
/// ```
pub struct TrackerDecorator<T, K, S: 'static> {
    key: KeyFn<T, K>,
    keys: Vec<K>,
    counts: HashMap<K, usize>,
    state: TrackerState<S>,
    initial: S,
    on_added: TrackFn<T, S>,
    on_removed: TrackFn<T, S>,
    on_changed: Option<ChangeTrackFn<T, S>>,
    on_reset: Option<ResetFn<T, S>>,
    priority: i32,
}

impl<T, K, S> TrackerDecorator<T, K, S>
where
    T: Item,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    pub fn new<F, A, R>(key: F, initial: S, on_added: A, on_removed: R) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        A: Fn(&mut S, &T, usize) + Send + Sync + 'static,
        R: Fn(&mut S, &T, usize) + Send + Sync + 'static,
    {
        Self {
            key: Arc::new(key),
            keys: Vec::new(),
            counts: HashMap::new(),
            state: Arc::new(Property::new(initial.clone())),
            initial,
            on_added: Arc::new(on_added),
            on_removed: Arc::new(on_removed),
            on_changed: None,
            on_reset: None,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_on_changed<F>(mut self, on_changed: F) -> Self
    where
        F: Fn(&mut S, &T, usize, Option<&str>) + Send + Sync + 'static,
    {
        self.on_changed = Some(Arc::new(on_changed));
        self
    }

    pub fn with_on_reset<F>(mut self, on_reset: F) -> Self
    where
        F: Fn(&mut S, &[(T, usize)]) + Send + Sync + 'static,
    {
        self.on_reset = Some(Arc::new(on_reset));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Handle to the folded state.
    pub fn state(&self) -> TrackerState<S> {
        Arc::clone(&self.state)
    }

    /// Number of upstream items with `key`.
    pub fn occurrences(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    fn added(&mut self, item: &T, key: K) {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        let count = *count;
        let on_added = &self.on_added;
        self.state.update(|state| on_added(state, item, count));
    }

    fn removed(&mut self, item: &T, key: &K) {
        let count = match self.counts.get_mut(key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if count == 0 {
            self.counts.remove(key);
        }
        let on_removed = &self.on_removed;
        self.state.update(|state| on_removed(state, item, count));
    }
}

impl<T, K, S> CollectionDecorator<T> for TrackerDecorator<T, K, S>
where
    T: Item,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "tracker"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.counts.clear();
        self.keys = upstream.iter().map(|item| (self.key)(item)).collect();

        match &self.on_reset {
            Some(on_reset) => {
                let mut entries: Vec<(T, usize)> = Vec::new();
                let mut slots: HashMap<K, usize> = HashMap::new();
                for (item, key) in upstream.iter().zip(&self.keys) {
                    *self.counts.entry(key.clone()).or_insert(0) += 1;
                    let slot = *slots.entry(key.clone()).or_insert_with(|| {
                        entries.push((item.clone(), 0));
                        entries.len() - 1
                    });
                    entries[slot].1 += 1;
                }
                self.state.update(|state| on_reset(state, &entries));
            }
            None => {
                let on_added = &self.on_added;
                let counts = &mut self.counts;
                let keys = &self.keys;
                let initial = &self.initial;
                self.state.update(|state| {
                    *state = initial.clone();
                    for (item, key) in upstream.iter().zip(keys) {
                        let count = counts.entry(key.clone()).or_insert(0);
                        *count += 1;
                        on_added(state, item, *count);
                    }
                });
            }
        }

        upstream.to_vec()
    }

    fn on_changed(
        &mut self,
        _upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::Add { index, item } => {
                let key = (self.key)(item);
                self.keys.insert(*index, key.clone());
                self.added(item, key);
            }
            CollectionChange::Remove { index, item } => {
                let key = self.keys.remove(*index);
                self.removed(item, &key);
            }
            CollectionChange::Replace {
                index,
                old_item,
                new_item,
            } => {
                let old_key = self.keys[*index].clone();
                self.removed(old_item, &old_key);
                let key = (self.key)(new_item);
                self.keys[*index] = key.clone();
                self.added(new_item, key);
            }
            CollectionChange::Move {
                old_index,
                new_index,
                ..
            } => {
                let key = self.keys.remove(*old_index);
                self.keys.insert(*new_index, key);
            }
            CollectionChange::ItemChanged { index, item, args } => {
                let key = (self.key)(item);
                if key != self.keys[*index] {
                    let old_key = std::mem::replace(&mut self.keys[*index], key.clone());
                    self.removed(item, &old_key);
                    self.added(item, key);
                } else if let Some(on_changed) = &self.on_changed {
                    let count = self.occurrences(&key);
                    self.state.update(|state| on_changed(state, item, count, args.as_deref()));
                }
            }
            CollectionChange::Reset { .. } => {}
        }
        sink.push(change.clone());
    }
}
