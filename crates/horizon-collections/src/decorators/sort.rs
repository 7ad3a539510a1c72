//! Sorting decorators.
//!
//! Both decorators order their output by a [`Comparer`] and break ties by
//! upstream position. They differ in how they react when an item's content
//! changes:
//!
//! - [`SortDecorator`] always re-places just that item by binary search.
//! - [`SortingDecorator`] first checks the item against its neighbours; when
//!   the rest of the sequence is no longer sorted either (the comparer's
//!   inputs changed behind its back) it falls back to a full stable reorder.
//!   A full reorder can also be requested explicitly with [`Reorder`].

use std::any::Any;

use horizon_collections_core::logging::targets;

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, DecoratorId, Item, DEFAULT_PRIORITY};
use crate::error::Result;
use crate::list::ObservableList;

use super::order::SortedIndex;
use super::Comparer;

/// Payload that asks a [`SortingDecorator`] for a full stable reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reorder;

/// Shared incremental behaviour of both sorting strategies.
struct SortCore<T> {
    comparer: Comparer<T>,
    order: SortedIndex,
    priority: i32,
}

impl<T: Item> SortCore<T> {
    fn new(comparer: Comparer<T>) -> Self {
        Self {
            comparer,
            order: SortedIndex::default(),
            priority: DEFAULT_PRIORITY,
        }
    }

    fn output(&self, upstream: &[T]) -> Vec<T> {
        self.order.as_slice().iter().map(|&o| upstream[o].clone()).collect()
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.order.rebuild(upstream, &self.comparer, 0..upstream.len());
        self.output(upstream)
    }

    /// Take the member out and put it back at its sorted position.
    fn reposition(&mut self, upstream: &[T], index: usize) -> Option<(usize, usize)> {
        let from = self.order.remove(index)?;
        let to = self.order.insert(upstream, &self.comparer, index);
        Some((from, to))
    }

    /// Handles every change except item-changed, which the strategies differ on.
    fn on_structural(
        &mut self,
        upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::Add { index, item } => {
                self.order.shift_inserted(*index);
                let pos = self.order.insert(upstream, &self.comparer, *index);
                sink.add(pos, item.clone());
            }
            CollectionChange::Remove { index, item } => {
                if let Some(pos) = self.order.remove(*index) {
                    self.order.shift_removed(*index);
                    sink.remove(pos, item.clone());
                }
            }
            CollectionChange::Replace {
                index,
                old_item,
                new_item,
            } => {
                if let Some((from, to)) = self.reposition(upstream, *index) {
                    sink.replace(from, old_item.clone(), new_item.clone());
                    sink.move_item(from, to, new_item.clone());
                }
            }
            CollectionChange::Move {
                old_index,
                new_index,
                item,
            } => {
                let Some(from) = self.order.position_of(*old_index) else {
                    return;
                };
                self.order.shift_moved(*old_index, *new_index);
                if let Some((_, to)) = self.reposition(upstream, *new_index) {
                    sink.move_item(from, to, item.clone());
                }
            }
            CollectionChange::ItemChanged { .. } | CollectionChange::Reset { .. } => {}
        }
    }
}

/// Keeps the output sorted, repositioning only the affected item.
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::{Comparer, SortDecorator};
///
/// let list = ObservableList::from_vec(vec![3, 1, 2]);
/// list.add_decorator(SortDecorator::new(Comparer::natural())).unwrap();
/// assert_eq!(list.decorated_items(), vec![1, 2, 3]);
///
/// list.push(0).unwrap();
/// assert_eq!(list.decorated_items(), vec![0, 1, 2, 3]);
/// ```
pub struct SortDecorator<T> {
    core: SortCore<T>,
}

impl<T: Item> SortDecorator<T> {
    pub fn new(comparer: Comparer<T>) -> Self {
        Self {
            core: SortCore::new(comparer),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.core.priority = priority;
        self
    }

    pub fn comparer(&self) -> &Comparer<T> {
        &self.core.comparer
    }

    /// Replace the comparer; takes effect through `update_decorator`.
    pub fn set_comparer(&mut self, comparer: Comparer<T>) {
        self.core.comparer = comparer;
    }
}

impl<T: Item> CollectionDecorator<T> for SortDecorator<T> {
    fn name(&self) -> &'static str {
        "sort"
    }

    fn priority(&self) -> i32 {
        self.core.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.core.decorate(upstream)
    }

    fn on_changed(
        &mut self,
        upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::ItemChanged { index, item, args } => {
                if let Some((from, to)) = self.core.reposition(upstream, *index) {
                    sink.move_item(from, to, item.clone());
                    sink.item_changed(to, item.clone(), args.clone());
                }
            }
            _ => self.core.on_structural(upstream, change, sink),
        }
    }
}

/// Keeps the output sorted with a stable full-reorder fallback.
///
/// New items are inserted after every item that compares equal and comes
/// earlier upstream. When an item changes, it keeps its place if it still
/// fits between its neighbours, moves if only it is out of place, and
/// otherwise the whole output is stably re-sorted and reported as a reset.
///
/// Send [`Reorder`] (see [`SortingDecorator::reorder`]) after the comparer's
/// inputs changed without item notifications.
pub struct SortingDecorator<T> {
    core: SortCore<T>,
}

impl<T: Item> SortingDecorator<T> {
    pub fn new(comparer: Comparer<T>) -> Self {
        Self {
            core: SortCore::new(comparer),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.core.priority = priority;
        self
    }

    pub fn comparer(&self) -> &Comparer<T> {
        &self.core.comparer
    }

    /// Replace the comparer; takes effect through `update_decorator`.
    pub fn set_comparer(&mut self, comparer: Comparer<T>) {
        self.core.comparer = comparer;
    }

    /// Ask the sorting decorator `id` on `list` for a full stable reorder.
    ///
    /// Emits a reset only if the order actually changed.
    pub fn reorder(list: &ObservableList<T>, id: DecoratorId) -> Result<()> {
        list.notify_decorator(id, Reorder)
    }

    /// Stable re-sort; emits a reset when the order changed.
    fn full_reorder(&mut self, upstream: &[T], sink: &mut ChangeSink<T>) {
        let sorted = self.core.order.sorted(upstream, &self.core.comparer);
        if sorted.as_slice() != self.core.order.as_slice() {
            tracing::trace!(target: targets::DECORATOR, len = sorted.len(), "full stable reorder");
            self.core.order.set_order(sorted);
            sink.reset(self.core.output(upstream));
        }
    }
}

impl<T: Item> CollectionDecorator<T> for SortingDecorator<T> {
    fn name(&self) -> &'static str {
        "sorting"
    }

    fn priority(&self) -> i32 {
        self.core.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.core.decorate(upstream)
    }

    fn on_changed(
        &mut self,
        upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        let CollectionChange::ItemChanged { index, item, args } = change else {
            self.core.on_structural(upstream, change, sink);
            return;
        };
        let Some(pos) = self.core.order.position_of(*index) else {
            return;
        };

        if self.core.order.fits_at(upstream, &self.core.comparer, pos) {
            sink.item_changed(pos, item.clone(), args.clone());
        } else if self.core.order.is_sorted_except(upstream, &self.core.comparer, pos) {
            if let Some((from, to)) = self.core.reposition(upstream, *index) {
                sink.move_item(from, to, item.clone());
                sink.item_changed(to, item.clone(), args.clone());
            }
        } else {
            self.full_reorder(upstream, sink);
        }
    }

    fn on_notification(
        &mut self,
        upstream: &[T],
        payload: &(dyn Any + Send),
        sink: &mut ChangeSink<T>,
    ) {
        if payload.is::<Reorder>() {
            self.full_reorder(upstream, sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn replay(output: &mut Vec<i32>, sink: ChangeSink<i32>) {
        for event in sink.into_events() {
            event.apply_to(output).unwrap();
        }
    }

    fn step<D: CollectionDecorator<i32>>(
        decorator: &mut D,
        output: &mut Vec<i32>,
        upstream: &[i32],
        change: CollectionChange<i32>,
    ) -> usize {
        let mut sink = ChangeSink::new();
        decorator.on_changed(upstream, &change, &mut sink);
        let count = sink.len();
        replay(output, sink);
        count
    }

    #[test]
    fn test_sort_add_remove() {
        let mut sort = SortDecorator::new(Comparer::natural());
        let mut upstream = vec![5, 1, 3];
        let mut output = sort.decorate(&upstream);
        assert_eq!(output, vec![1, 3, 5]);

        upstream.insert(1, 4);
        step(&mut sort, &mut output, &upstream, CollectionChange::Add { index: 1, item: 4 });
        assert_eq!(output, vec![1, 3, 4, 5]);

        upstream.remove(0);
        step(&mut sort, &mut output, &upstream, CollectionChange::Remove { index: 0, item: 5 });
        assert_eq!(output, vec![1, 3, 4]);
    }

    #[test]
    fn test_sort_replace_emits_replace_then_move() {
        let mut sort = SortDecorator::new(Comparer::natural());
        let mut upstream = vec![1, 2, 3];
        let mut output = sort.decorate(&upstream);

        upstream[0] = 9;
        let mut sink = ChangeSink::new();
        sort.on_changed(
            &upstream,
            &CollectionChange::Replace { index: 0, old_item: 1, new_item: 9 },
            &mut sink,
        );
        assert_eq!(
            sink.events(),
            &[
                CollectionChange::Replace { index: 0, old_item: 1, new_item: 9 },
                CollectionChange::Move { old_index: 0, new_index: 2, item: 9 },
            ]
        );
        replay(&mut output, sink);
        assert_eq!(output, vec![2, 3, 9]);
    }

    #[test]
    fn test_sort_upstream_move_keeps_ties_stable() {
        let mut sort = SortDecorator::new(Comparer::<i32>::Identity);
        let mut upstream = vec![1, 2, 3];
        let mut output = sort.decorate(&upstream);

        let item = upstream.remove(0);
        upstream.insert(2, item);
        let change = CollectionChange::Move { old_index: 0, new_index: 2, item: 1 };
        step(&mut sort, &mut output, &upstream, change);
        assert_eq!(output, upstream);
    }

    #[test]
    fn test_sort_item_changed_moves_item() {
        let mut sort = SortDecorator::new(Comparer::natural());
        let mut upstream = vec![1, 2, 3];
        let mut output = sort.decorate(&upstream);

        upstream[2] = 0;
        let emitted = step(
            &mut sort,
            &mut output,
            &upstream,
            CollectionChange::ItemChanged { index: 2, item: 0, args: None },
        );
        assert_eq!(emitted, 2);
        assert_eq!(output, vec![0, 1, 2]);
    }

    #[test]
    fn test_sorting_item_changed_in_place() {
        let mut sorting = SortingDecorator::new(Comparer::natural());
        let mut upstream = vec![10, 20, 30];
        let mut output = sorting.decorate(&upstream);

        upstream[1] = 25;
        let mut sink = ChangeSink::new();
        sorting.on_changed(
            &upstream,
            &CollectionChange::ItemChanged { index: 1, item: 25, args: None },
            &mut sink,
        );
        assert_eq!(
            sink.events(),
            &[CollectionChange::ItemChanged { index: 1, item: 25, args: None }]
        );
        replay(&mut output, sink);
        assert_eq!(output, vec![10, 25, 30]);
    }

    #[test]
    fn test_sorting_falls_back_to_reset() {
        let descending = Arc::new(AtomicBool::new(false));
        let flag = descending.clone();
        let mut sorting = SortingDecorator::new(Comparer::new(move |a: &i32, b: &i32| {
            if flag.load(Ordering::SeqCst) { b.cmp(a) } else { a.cmp(b) }
        }));
        let upstream = vec![1, 2, 3, 4];
        let mut output = sorting.decorate(&upstream);

        descending.store(true, Ordering::SeqCst);
        let mut sink = ChangeSink::new();
        sorting.on_changed(
            &upstream,
            &CollectionChange::ItemChanged { index: 0, item: 1, args: None },
            &mut sink,
        );
        assert!(sink.events()[0].is_reset());
        replay(&mut output, sink);
        assert_eq!(output, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_sorting_reorder_notification() {
        let descending = Arc::new(AtomicBool::new(false));
        let flag = descending.clone();
        let mut sorting = SortingDecorator::new(Comparer::new(move |a: &i32, b: &i32| {
            if flag.load(Ordering::SeqCst) { b.cmp(a) } else { a.cmp(b) }
        }));
        let upstream = vec![2, 1];
        sorting.decorate(&upstream);

        let mut sink = ChangeSink::new();
        sorting.on_notification(&upstream, &Reorder, &mut sink);
        assert!(sink.is_empty());

        descending.store(true, Ordering::SeqCst);
        sorting.on_notification(&upstream, &Reorder, &mut sink);
        assert_eq!(sink.events(), &[CollectionChange::Reset { items: vec![2, 1] }]);
    }
}
