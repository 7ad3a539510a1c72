//! Single-slot aggregation: the first or last matching item.

use std::sync::Arc;

use horizon_collections_core::Property;

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, Item, DEFAULT_PRIORITY};

use super::order::moved_index;
use super::ItemFilter;

/// Which end of the collection is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackPosition {
    #[default]
    First,
    Last,
}

/// Type alias for the tracked-item callback.
pub type TrackedFn<T> = Arc<dyn Fn(Option<&T>) + Send + Sync>;

/// Tracks the first or last upstream item matching a filter.
///
/// The tracked slot is updated by comparing each change against it. The
/// collection is only rescanned when the tracked item itself is removed,
/// moved, or stops matching. The view passes through unchanged.
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::{FirstLastTrackerDecorator, TrackPosition};
///
/// let tracker =
///     FirstLastTrackerDecorator::new(TrackPosition::Last).with_condition(|n: &i32| n % 2 == 0);
/// let last_even = tracker.tracked();
///
/// let list = ObservableList::from_vec(vec![2, 3, 4, 5]);
/// list.add_decorator(tracker).unwrap();
/// assert_eq!(last_even.get(), Some(4));
///
/// list.remove(&4).unwrap();
/// assert_eq!(last_even.get(), Some(2));
/// ```
pub struct FirstLastTrackerDecorator<T: 'static> {
    position: TrackPosition,
    condition: ItemFilter<T>,
    index: Option<usize>,
    tracked: Arc<Property<Option<T>>>,
    callback: Option<TrackedFn<T>>,
    priority: i32,
}

impl<T: Item> FirstLastTrackerDecorator<T> {
    pub fn new(position: TrackPosition) -> Self {
        Self {
            position,
            condition: ItemFilter::All,
            index: None,
            tracked: Arc::new(Property::new(None)),
            callback: None,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.condition = ItemFilter::new(condition);
        self
    }

    /// Called with the new tracked item whenever it changes.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&T>) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn position(&self) -> TrackPosition {
        self.position
    }

    /// Handle to the tracked item.
    pub fn tracked(&self) -> Arc<Property<Option<T>>> {
        Arc::clone(&self.tracked)
    }

    /// Upstream index of the tracked item.
    pub fn tracked_index(&self) -> Option<usize> {
        self.index
    }

    fn scan(&mut self, upstream: &[T]) {
        let matches = |item: &T| self.condition.matches(item);
        self.index = match self.position {
            TrackPosition::First => upstream.iter().position(matches),
            TrackPosition::Last => upstream.iter().rposition(matches),
        };
    }

    /// Returns `true` if a matching item at `index` beats the tracked one.
    fn outranks(&self, index: usize) -> bool {
        match (self.position, self.index) {
            (_, None) => true,
            (TrackPosition::First, Some(current)) => index < current,
            (TrackPosition::Last, Some(current)) => index > current,
        }
    }

    fn consider(&mut self, index: usize, item: &T) {
        if self.condition.matches(item) && self.outranks(index) {
            self.index = Some(index);
        }
    }

    fn publish(&self, upstream: &[T]) {
        let value = self.index.and_then(|index| upstream.get(index).cloned());
        if self.tracked.replace(value.clone()).is_some() {
            if let Some(callback) = &self.callback {
                callback(value.as_ref());
            }
        }
    }
}

impl<T: Item> CollectionDecorator<T> for FirstLastTrackerDecorator<T> {
    fn name(&self) -> &'static str {
        "first_last_tracker"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.scan(upstream);
        self.publish(upstream);
        upstream.to_vec()
    }

    fn on_changed(
        &mut self,
        upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::Add { index, item } => {
                if let Some(current) = self.index.as_mut() {
                    if *index <= *current {
                        *current += 1;
                    }
                }
                self.consider(*index, item);
            }
            CollectionChange::Remove { index, .. } => match self.index {
                Some(current) if current == *index => self.scan(upstream),
                Some(current) if current > *index => self.index = Some(current - 1),
                _ => {}
            },
            CollectionChange::Replace { index, new_item: item, .. }
            | CollectionChange::ItemChanged { index, item, .. } => {
                if self.index == Some(*index) {
                    if !self.condition.matches(item) {
                        self.scan(upstream);
                    }
                } else {
                    self.consider(*index, item);
                }
            }
            CollectionChange::Move {
                old_index,
                new_index,
                item,
            } => {
                if self.index == Some(*old_index) {
                    self.scan(upstream);
                } else {
                    self.index =
                        self.index.map(|current| moved_index(current, *old_index, *new_index));
                    self.consider(*new_index, item);
                }
            }
            CollectionChange::Reset { .. } => {}
        }
        self.publish(upstream);
        sink.push(change.clone());
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::list::ObservableList;

    fn attach(
        position: TrackPosition,
        items: Vec<i32>,
    ) -> (ObservableList<i32>, Arc<Property<Option<i32>>>) {
        let tracker = FirstLastTrackerDecorator::new(position).with_condition(|n: &i32| *n > 10);
        let tracked = tracker.tracked();
        let list = ObservableList::from_vec(items);
        list.add_decorator(tracker).unwrap();
        (list, tracked)
    }

    #[test]
    fn test_first_updates_incrementally() {
        let (list, first) = attach(TrackPosition::First, vec![1, 20, 30]);
        assert_eq!(first.get(), Some(20));

        list.insert(0, 15).unwrap();
        assert_eq!(first.get(), Some(15));
        list.insert(0, 5).unwrap();
        assert_eq!(first.get(), Some(15));

        list.remove(&15).unwrap();
        assert_eq!(first.get(), Some(20));
        list.replace(1, 3).unwrap();
        assert_eq!(first.get(), Some(30));
    }

    #[test]
    fn test_last_follows_moves() {
        let (list, last) = attach(TrackPosition::Last, vec![11, 12, 1]);
        assert_eq!(last.get(), Some(12));

        list.move_item(0, 2).unwrap();
        assert_eq!(list.items(), vec![12, 1, 11]);
        assert_eq!(last.get(), Some(11));

        list.move_item(2, 0).unwrap();
        assert_eq!(last.get(), Some(12));
    }

    #[test]
    fn test_no_match_tracks_none() {
        let (list, first) = attach(TrackPosition::First, vec![1, 2]);
        assert_eq!(first.get(), None);
        list.push(50).unwrap();
        assert_eq!(first.get(), Some(50));
        list.clear().unwrap();
        assert_eq!(first.get(), None);
    }

    #[test]
    fn test_callback_fires_on_change_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let tracker = FirstLastTrackerDecorator::new(TrackPosition::First)
            .with_callback(move |item: Option<&i32>| recorder.lock().push(item.copied()));
        let list = ObservableList::from_vec(vec![7]);
        list.add_decorator(tracker).unwrap();

        list.push(8).unwrap();
        list.insert(0, 6).unwrap();
        list.update_item(0, None, |n| *n = 4).unwrap();

        assert_eq!(*seen.lock(), vec![Some(7), Some(6), Some(4)]);
    }
}
