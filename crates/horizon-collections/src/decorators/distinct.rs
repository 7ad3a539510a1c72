//! Key-based de-duplication.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, Item, DEFAULT_PRIORITY};

use super::mask::rank;
use super::KeyFn;

/// Shows only the first upstream occurrence of each key.
///
/// Later occurrences stay hidden until the visible one goes away, at which
/// point the next occurrence is promoted in its place (a replace, followed by
/// a move when the promoted item sorts elsewhere).
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::DistinctDecorator;
///
/// let list = ObservableList::from_vec(vec![1, 2, 3, 4, 5, 6]);
/// list.add_decorator(DistinctDecorator::new(|n: &i32| n % 3)).unwrap();
/// assert_eq!(list.decorated_items(), vec![1, 2, 3]);
///
/// list.remove_at(0).unwrap();
/// assert_eq!(list.decorated_items(), vec![2, 3, 4]);
/// ```
pub struct DistinctDecorator<T, K> {
    key: KeyFn<T, K>,
    keys: Vec<K>,
    visible: Vec<bool>,
    counts: HashMap<K, usize>,
    priority: i32,
}

impl<T, K> DistinctDecorator<T, K>
where
    T: Item,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new<F>(key: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            key: Arc::new(key),
            keys: Vec::new(),
            visible: Vec::new(),
            counts: HashMap::new(),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Number of upstream occurrences of `key`.
    pub fn occurrences(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.counts.len()
    }

    fn visible_occurrence(&self, key: &K, except: usize) -> Option<usize> {
        (0..self.keys.len()).find(|&j| j != except && self.visible[j] && self.keys[j] == *key)
    }

    fn next_occurrence(&self, key: &K, from: usize, except: usize) -> Option<usize> {
        (from..self.keys.len()).find(|&j| j != except && self.keys[j] == *key)
    }

    fn decrement(&mut self, key: &K) -> usize {
        match self.counts.get_mut(key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            }
            _ => {
                self.counts.remove(key);
                0
            }
        }
    }

    /// Make upstream slot `j` visible in place of the item that was shown at
    /// output position `pos`.
    fn promote(
        &mut self,
        upstream: &[T],
        j: usize,
        pos: usize,
        shown: T,
        sink: &mut ChangeSink<T>,
    ) {
        self.visible[j] = true;
        let promoted = upstream[j].clone();
        sink.replace(pos, shown, promoted.clone());
        sink.move_item(pos, rank(&self.visible, j), promoted);
    }

    /// Withdraw the occurrence at `index` (still present upstream) from its key.
    fn release(&mut self, upstream: &[T], index: usize, shown: T, sink: &mut ChangeSink<T>) {
        let key = self.keys[index].clone();
        let was_visible = self.visible[index];
        self.visible[index] = false;
        let remaining = self.decrement(&key);
        if !was_visible {
            return;
        }
        let pos = rank(&self.visible, index);
        match self.next_occurrence(&key, index + 1, index) {
            Some(j) if remaining > 0 => self.promote(upstream, j, pos, shown, sink),
            _ => sink.remove(pos, shown),
        }
    }

    /// Register the occurrence at `index` (whose key is already stored).
    fn acquire(&mut self, upstream: &[T], index: usize, sink: &mut ChangeSink<T>) {
        let key = self.keys[index].clone();
        let count = self.counts.entry(key.clone()).or_insert(0);
        *count += 1;

        if *count == 1 {
            self.visible[index] = true;
            sink.add(rank(&self.visible, index), upstream[index].clone());
            return;
        }

        match self.visible_occurrence(&key, index) {
            Some(current) if index < current => {
                let pos = rank(&self.visible, current);
                self.visible[current] = false;
                self.promote(upstream, index, pos, upstream[current].clone(), sink);
            }
            Some(_) => {}
            None => {
                // Counts and visibility disagree; show this occurrence.
                self.visible[index] = true;
                sink.add(rank(&self.visible, index), upstream[index].clone());
            }
        }
    }
}

impl<T, K> CollectionDecorator<T> for DistinctDecorator<T, K>
where
    T: Item,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "distinct"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.keys = upstream.iter().map(|item| (self.key)(item)).collect();
        self.counts.clear();
        self.visible = Vec::with_capacity(upstream.len());
        let mut output = Vec::new();
        for (item, key) in upstream.iter().zip(&self.keys) {
            let count = self.counts.entry(key.clone()).or_insert(0);
            *count += 1;
            let first = *count == 1;
            self.visible.push(first);
            if first {
                output.push(item.clone());
            }
        }
        output
    }

    fn on_changed(
        &mut self,
        upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::Add { index, item } => {
                self.keys.insert(*index, (self.key)(item));
                self.visible.insert(*index, false);
                self.acquire(upstream, *index, sink);
            }
            CollectionChange::Remove { index, item } => {
                let key = self.keys.remove(*index);
                let was_visible = self.visible.remove(*index);
                let remaining = self.decrement(&key);
                if !was_visible {
                    return;
                }
                let pos = rank(&self.visible, *index);
                match self.next_occurrence(&key, *index, usize::MAX) {
                    Some(j) if remaining > 0 => self.promote(upstream, j, pos, item.clone(), sink),
                    _ => sink.remove(pos, item.clone()),
                }
            }
            CollectionChange::Replace {
                index,
                old_item,
                new_item,
            } => {
                let key = (self.key)(new_item);
                if key == self.keys[*index] {
                    if self.visible[*index] {
                        let r = rank(&self.visible, *index);
                        sink.replace(r, old_item.clone(), new_item.clone());
                    }
                    return;
                }
                self.release(upstream, *index, old_item.clone(), sink);
                self.keys[*index] = key;
                self.acquire(upstream, *index, sink);
            }
            CollectionChange::Move {
                old_index,
                new_index,
                item,
            } => {
                let was_visible = self.visible[*old_index];
                let old_pos = rank(&self.visible, *old_index);
                let key = self.keys.remove(*old_index);
                self.visible.remove(*old_index);
                self.keys.insert(*new_index, key.clone());
                self.visible.insert(*new_index, was_visible);

                let first = self.next_occurrence(&key, 0, usize::MAX);
                let current = self.visible_occurrence(&key, usize::MAX);
                match (first, current) {
                    (Some(f), Some(c)) if f == c => {
                        if was_visible {
                            sink.move_item(old_pos, rank(&self.visible, *new_index), item.clone());
                        }
                    }
                    (Some(f), Some(c)) if was_visible => {
                        // The moved item fell behind another occurrence.
                        self.visible[c] = false;
                        self.promote(upstream, f, old_pos, item.clone(), sink);
                    }
                    (Some(f), Some(c)) => {
                        // The hidden moved item is now the first occurrence.
                        let pos = rank(&self.visible, c);
                        self.visible[c] = false;
                        self.promote(upstream, f, pos, upstream[c].clone(), sink);
                    }
                    _ => {}
                }
            }
            CollectionChange::ItemChanged { index, item, args } => {
                let key = (self.key)(item);
                if key == self.keys[*index] {
                    if self.visible[*index] {
                        sink.item_changed(rank(&self.visible, *index), item.clone(), args.clone());
                    }
                    return;
                }
                self.release(upstream, *index, item.clone(), sink);
                self.keys[*index] = key;
                self.acquire(upstream, *index, sink);
            }
            CollectionChange::Reset { .. } => {}
        }
    }
}
