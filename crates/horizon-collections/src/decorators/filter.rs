//! Predicate filtering.

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, IndexQuery, Item, DEFAULT_PRIORITY};

use super::mask::rank;
use super::ItemFilter;

/// Hides items for which the filter returns `false`.
///
/// A pass mask parallel to the upstream caches every item's last result, so
/// an item-changed event can tell whether the item entered or left the view.
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::FilterDecorator;
///
/// let list = ObservableList::from_vec(vec![1, 2, 3, 4]);
/// let id = list.add_decorator(FilterDecorator::new(|n: &i32| n % 2 == 0)).unwrap();
/// assert_eq!(list.decorated_items(), vec![2, 4]);
///
/// list.update_decorator(id, |filter: &mut FilterDecorator<i32>| {
///     filter.set_filter(|n: &i32| *n > 2)
/// })
/// .unwrap();
/// assert_eq!(list.decorated_items(), vec![3, 4]);
/// ```
pub struct FilterDecorator<T> {
    filter: ItemFilter<T>,
    mask: Vec<bool>,
    priority: i32,
}

impl<T: Item> FilterDecorator<T> {
    /// Create a filter from a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::with_filter(ItemFilter::new(predicate))
    }

    /// Create a filter from an [`ItemFilter`].
    pub fn with_filter(filter: ItemFilter<T>) -> Self {
        Self {
            filter,
            mask: Vec::new(),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn filter(&self) -> &ItemFilter<T> {
        &self.filter
    }

    /// Replace the predicate. The view is re-evaluated when this is called
    /// through [`ObservableList::update_decorator`](crate::ObservableList::update_decorator).
    pub fn set_filter<F>(&mut self, predicate: F)
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = ItemFilter::new(predicate);
    }

    pub fn set_item_filter(&mut self, filter: ItemFilter<T>) {
        self.filter = filter;
    }
}

impl<T: Item> CollectionDecorator<T> for FilterDecorator<T> {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.mask = upstream.iter().map(|item| self.filter.matches(item)).collect();
        upstream
            .iter()
            .zip(&self.mask)
            .filter(|(_, pass)| **pass)
            .map(|(item, _)| item.clone())
            .collect()
    }

    fn on_changed(
        &mut self,
        _upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::Add { index, item } => {
                let pass = self.filter.matches(item);
                self.mask.insert(*index, pass);
                if pass {
                    sink.add(rank(&self.mask, *index), item.clone());
                }
            }
            CollectionChange::Remove { index, item } => {
                if self.mask.remove(*index) {
                    sink.remove(rank(&self.mask, *index), item.clone());
                }
            }
            CollectionChange::Replace {
                index,
                old_item,
                new_item,
            } => {
                let was = self.mask[*index];
                let now = self.filter.matches(new_item);
                self.mask[*index] = now;
                let r = rank(&self.mask, *index);
                match (was, now) {
                    (true, true) => sink.replace(r, old_item.clone(), new_item.clone()),
                    (true, false) => sink.remove(r, old_item.clone()),
                    (false, true) => sink.add(r, new_item.clone()),
                    (false, false) => {}
                }
            }
            CollectionChange::Move {
                old_index,
                new_index,
                item,
            } => {
                let old_rank = rank(&self.mask, *old_index);
                let pass = self.mask.remove(*old_index);
                self.mask.insert(*new_index, pass);
                if pass {
                    sink.move_item(old_rank, rank(&self.mask, *new_index), item.clone());
                }
            }
            CollectionChange::ItemChanged { index, item, args } => {
                let was = self.mask[*index];
                let now = self.filter.matches(item);
                self.mask[*index] = now;
                let r = rank(&self.mask, *index);
                match (was, now) {
                    (true, true) => sink.item_changed(r, item.clone(), args.clone()),
                    (true, false) => sink.remove(r, item.clone()),
                    (false, true) => sink.add(r, item.clone()),
                    (false, false) => {}
                }
            }
            CollectionChange::Reset { .. } => {}
        }
    }

    fn try_get_indexes(&self, query: &IndexQuery<'_, T>, indexes: &mut Vec<usize>) {
        for upstream_index in query.upstream_indexes() {
            if self.mask.get(upstream_index).copied().unwrap_or(false) {
                indexes.push(rank(&self.mask, upstream_index));
                if query.ignore_duplicates() {
                    return;
                }
            }
        }
    }
}
