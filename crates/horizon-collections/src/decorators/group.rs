//! Grouping with synthetic header items.
//!
//! The decorated view of both group decorators is every group header, in
//! order of first appearance among the upstream items, followed by the
//! upstream items themselves. A header exists exactly while its group has at
//! least one item. Item events are translated first, then the headers whose
//! first item moved are added, removed or moved.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, Item, DEFAULT_PRIORITY};

use super::KeyFn;

/// Type alias for a header factory.
pub type HeaderFn<T, K> = Arc<dyn Fn(&K) -> T + Send + Sync>;

/// Type alias for a group change callback.
pub type GroupChangeFn<T, K> = Arc<dyn Fn(&GroupChange<T, K>) + Send + Sync>;

/// A change to the membership of one group.
///
/// `index` is the position inside the group, counted in upstream order.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupChange<T, K> {
    ItemAdded { key: K, index: usize, item: T },
    ItemRemoved { key: K, index: usize, item: T },
    ItemChanged { key: K, index: usize, item: T },
    /// Every group was rebuilt from scratch.
    Reset,
    /// The last item of the group left.
    GroupRemoved { key: K },
}

/// Key per upstream slot plus the header section derived from it.
///
/// `firsts[h]` is the upstream index of the first item of group `headers[h]`,
/// so `firsts` is strictly increasing and the header of a group can be placed
/// by binary search. Every key operation adjusts only the groups whose first
/// item it touches.
struct GroupLayout<T, K> {
    key: KeyFn<T, Option<K>>,
    header: HeaderFn<T, K>,
    keys: Vec<Option<K>>,
    counts: HashMap<K, usize>,
    headers: Vec<K>,
    firsts: Vec<usize>,
    header_items: Vec<T>,
}

impl<T, K> GroupLayout<T, K>
where
    T: Item,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn new(key: KeyFn<T, Option<K>>, header: HeaderFn<T, K>) -> Self {
        Self {
            key,
            header,
            keys: Vec::new(),
            counts: HashMap::new(),
            headers: Vec::new(),
            firsts: Vec::new(),
            header_items: Vec::new(),
        }
    }

    fn key_of(&self, item: &T) -> Option<K> {
        (self.key)(item)
    }

    /// Output offset of upstream slot 0.
    fn offset(&self) -> usize {
        self.headers.len()
    }

    fn header_index(&self, key: &K) -> Option<usize> {
        self.headers.iter().position(|k| k == key)
    }

    /// Position of upstream slot `index` inside the group `key`.
    fn group_position(&self, index: usize, key: &K) -> usize {
        self.keys[..index]
            .iter()
            .filter(|k| k.as_ref() == Some(key))
            .count()
    }

    fn rebuild(&mut self, upstream: &[T]) -> Vec<T> {
        self.keys = upstream.iter().map(|item| (self.key)(item)).collect();
        let mut previous: HashMap<K, T> =
            self.headers.drain(..).zip(self.header_items.drain(..)).collect();
        self.counts.clear();
        self.firsts.clear();
        for (index, key) in self.keys.iter().enumerate() {
            let Some(key) = key else {
                continue;
            };
            let count = self.counts.entry(key.clone()).or_default();
            if *count == 0 {
                self.headers.push(key.clone());
                self.firsts.push(index);
            }
            *count += 1;
        }
        self.header_items = self
            .headers
            .iter()
            .map(|key| previous.remove(key).unwrap_or_else(|| (self.header)(key)))
            .collect();

        let mut output = Vec::with_capacity(self.headers.len() + upstream.len());
        output.extend(self.header_items.iter().cloned());
        output.extend(upstream.iter().cloned());
        output
    }

    /// Give header `h` a new first index and move it into order.
    fn relocate(&mut self, h: usize, first: usize, sink: &mut ChangeSink<T>) {
        let key = self.headers.remove(h);
        let item = self.header_items.remove(h);
        self.firsts.remove(h);

        let to = self.firsts.partition_point(|&f| f < first);
        self.headers.insert(to, key);
        self.header_items.insert(to, item.clone());
        self.firsts.insert(to, first);
        if to != h {
            sink.move_item(h, to, item);
        }
    }

    /// Insert a slot with `key` at upstream `index`.
    fn insert_key(&mut self, index: usize, key: Option<K>, sink: &mut ChangeSink<T>) {
        for first in &mut self.firsts {
            if *first >= index {
                *first += 1;
            }
        }
        self.keys.insert(index, key.clone());
        let Some(key) = key else {
            return;
        };

        let count = self.counts.entry(key.clone()).or_default();
        *count += 1;
        if *count == 1 {
            let h = self.firsts.partition_point(|&f| f < index);
            let item = (self.header)(&key);
            self.headers.insert(h, key);
            self.header_items.insert(h, item.clone());
            self.firsts.insert(h, index);
            sink.add(h, item);
        } else if let Some(h) = self.header_index(&key) {
            if self.firsts[h] > index {
                self.relocate(h, index, sink);
            }
        }
    }

    /// Remove the slot at upstream `index`, returning its key.
    fn remove_key(&mut self, index: usize, sink: &mut ChangeSink<T>) -> Option<K> {
        let key = self.keys.remove(index);
        for first in &mut self.firsts {
            if *first > index {
                *first -= 1;
            }
        }
        let Some(k) = &key else {
            return key;
        };
        let Some(h) = self.header_index(k) else {
            return key;
        };

        let remaining = match self.counts.get_mut(k) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.counts.remove(k);
            self.headers.remove(h);
            self.firsts.remove(h);
            let item = self.header_items.remove(h);
            sink.remove(h, item);
        } else if self.firsts[h] == index {
            let next = self.keys[index..].iter().position(|other| other.as_ref() == Some(k));
            if let Some(offset) = next {
                self.relocate(h, index + offset, sink);
            }
        }
        key
    }

    /// Change the key of the slot at upstream `index`.
    fn set_key(&mut self, index: usize, key: Option<K>, sink: &mut ChangeSink<T>) {
        if self.keys[index] != key {
            self.remove_key(index, sink);
            self.insert_key(index, key, sink);
        }
    }

    /// Move the key of a slot along with an upstream move.
    fn move_key(&mut self, old_index: usize, new_index: usize, sink: &mut ChangeSink<T>) {
        let key = self.keys.remove(old_index);
        self.keys.insert(new_index, key.clone());
        let moved = key.as_ref().and_then(|k| self.header_index(k));

        for (h, first) in self.firsts.iter_mut().enumerate() {
            if Some(h) == moved {
                continue;
            }
            if old_index < new_index && old_index < *first && *first <= new_index {
                *first -= 1;
            } else if new_index < old_index && new_index <= *first && *first < old_index {
                *first += 1;
            }
        }

        let (Some(k), Some(h)) = (key, moved) else {
            return;
        };
        let first = self.firsts[h];
        let next = if first == old_index {
            if new_index < old_index {
                new_index
            } else {
                let offset = self.keys[old_index..]
                    .iter()
                    .position(|other| other.as_ref() == Some(&k));
                old_index + offset.unwrap_or(new_index - old_index)
            }
        } else if new_index <= first {
            new_index
        } else {
            first
        };
        if next != first {
            self.relocate(h, next, sink);
        }
    }
}

/// Groups items by key, with membership callbacks and per-group item lists.
///
/// Items without a key are not part of any group but stay in the view.
/// Keys are re-evaluated on item-changed events unless
/// [`with_stable_keys`](Self::with_stable_keys) is set, so an item can move
/// between groups; the old header disappears when its group empties and a
/// header is created when a group gains its first item.
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::GroupDecorator;
///
/// let list = ObservableList::from_vec(vec![3, 14, 5]);
/// list.add_decorator(GroupDecorator::new(|n: &i32| Some(n / 10), |key: &i32| -(key + 1)))
///     .unwrap();
/// assert_eq!(list.decorated_items(), vec![-1, -2, 3, 14, 5]);
/// ```
pub struct GroupDecorator<T, K> {
    layout: GroupLayout<T, K>,
    groups: HashMap<K, Vec<T>>,
    callback: Option<GroupChangeFn<T, K>>,
    stable_keys: bool,
    priority: i32,
}

impl<T, K> GroupDecorator<T, K>
where
    T: Item,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// `key` assigns a group (or none); `header` creates the header item of a
    /// newly populated group.
    pub fn new<F, H>(key: F, header: H) -> Self
    where
        F: Fn(&T) -> Option<K> + Send + Sync + 'static,
        H: Fn(&K) -> T + Send + Sync + 'static,
    {
        Self {
            layout: GroupLayout::new(Arc::new(key), Arc::new(header)),
            groups: HashMap::new(),
            callback: None,
            stable_keys: false,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Call `callback` for every change to a group.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&GroupChange<T, K>) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Keep the key computed at insertion when an item changes.
    pub fn with_stable_keys(mut self, stable: bool) -> Self {
        self.stable_keys = stable;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Items of a group in upstream order.
    pub fn group_items(&self, key: &K) -> Option<&[T]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Group keys in header order.
    pub fn group_keys(&self) -> &[K] {
        &self.layout.headers
    }

    pub fn group_count(&self) -> usize {
        self.layout.headers.len()
    }

    fn notify(&self, change: GroupChange<T, K>) {
        if let Some(callback) = &self.callback {
            callback(&change);
        }
    }

    /// Add the item at `index` (whose key is already stored) to its group.
    fn admit(&mut self, index: usize, item: &T) {
        let Some(key) = self.layout.keys[index].clone() else {
            return;
        };
        let position = self.layout.group_position(index, &key);
        self.groups
            .entry(key.clone())
            .or_default()
            .insert(position, item.clone());
        self.notify(GroupChange::ItemAdded {
            key,
            index: position,
            item: item.clone(),
        });
    }

    /// Take the item that occupied `index` out of `key`'s group.
    fn withdraw(&mut self, index: usize, key: Option<K>, item: &T) {
        let Some(key) = key else {
            return;
        };
        let position = self.layout.group_position(index, &key);
        let emptied = match self.groups.get_mut(&key) {
            Some(members) => {
                if position < members.len() {
                    members.remove(position);
                }
                members.is_empty()
            }
            None => false,
        };
        self.notify(GroupChange::ItemRemoved {
            key: key.clone(),
            index: position,
            item: item.clone(),
        });
        if emptied {
            self.groups.remove(&key);
            self.notify(GroupChange::GroupRemoved { key });
        }
    }

    /// Update the group member at `index` in place.
    fn refresh(&mut self, index: usize, key: Option<K>, item: &T) {
        let Some(key) = key else {
            return;
        };
        let position = self.layout.group_position(index, &key);
        let member = self.groups.get_mut(&key).and_then(|members| members.get_mut(position));
        if let Some(slot) = member {
            *slot = item.clone();
        }
        self.notify(GroupChange::ItemChanged {
            key,
            index: position,
            item: item.clone(),
        });
    }

    fn rekey(
        &mut self,
        index: usize,
        old_item: &T,
        new_item: &T,
        key: Option<K>,
        sink: &mut ChangeSink<T>,
    ) {
        let current = self.layout.keys[index].clone();
        if current == key {
            self.refresh(index, key, new_item);
        } else {
            self.withdraw(index, current, old_item);
            self.layout.set_key(index, key, sink);
            self.admit(index, new_item);
        }
    }
}

impl<T, K> CollectionDecorator<T> for GroupDecorator<T, K>
where
    T: Item,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "group"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        let output = self.layout.rebuild(upstream);
        self.groups.clear();
        for (item, key) in upstream.iter().zip(&self.layout.keys) {
            if let Some(key) = key {
                self.groups.entry(key.clone()).or_default().push(item.clone());
            }
        }
        self.notify(GroupChange::Reset);
        output
    }

    fn on_changed(
        &mut self,
        _upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        let offset = self.layout.offset();
        match change {
            CollectionChange::Add { index, item } => {
                let key = self.layout.key_of(item);
                sink.add(offset + index, item.clone());
                self.layout.insert_key(*index, key, sink);
                self.admit(*index, item);
            }
            CollectionChange::Remove { index, item } => {
                sink.remove(offset + index, item.clone());
                let key = self.layout.remove_key(*index, sink);
                self.withdraw(*index, key, item);
            }
            CollectionChange::Replace {
                index,
                old_item,
                new_item,
            } => {
                let key = self.layout.key_of(new_item);
                sink.replace(offset + index, old_item.clone(), new_item.clone());
                self.rekey(*index, old_item, new_item, key, sink);
            }
            CollectionChange::Move {
                old_index,
                new_index,
                item,
            } => {
                let key = self.layout.keys[*old_index].clone();
                let old_position = key.as_ref().map(|k| self.layout.group_position(*old_index, k));
                sink.move_item(offset + old_index, offset + new_index, item.clone());
                self.layout.move_key(*old_index, *new_index, sink);

                if let (Some(key), Some(old_position)) = (key, old_position) {
                    let new_position = self.layout.group_position(*new_index, &key);
                    if new_position != old_position {
                        if let Some(members) = self.groups.get_mut(&key) {
                            let member = members.remove(old_position);
                            members.insert(new_position, member);
                        }
                        self.notify(GroupChange::ItemRemoved {
                            key: key.clone(),
                            index: old_position,
                            item: item.clone(),
                        });
                        self.notify(GroupChange::ItemAdded {
                            key,
                            index: new_position,
                            item: item.clone(),
                        });
                    }
                }
            }
            CollectionChange::ItemChanged { index, item, args } => {
                let key = if self.stable_keys {
                    self.layout.keys[*index].clone()
                } else {
                    self.layout.key_of(item)
                };
                sink.item_changed(offset + index, item.clone(), args.clone());
                self.rekey(*index, item, item, key, sink);
            }
            CollectionChange::Reset { .. } => {}
        }
    }
}

impl<T, K> fmt::Debug for GroupDecorator<T, K>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupDecorator")
            .field("groups", &self.layout.headers)
            .field("stable_keys", &self.stable_keys)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Groups items under headers computed from each item by a pure key function.
///
/// Unlike [`GroupDecorator`] there is no callback and no per-group item
/// list. The key is derived from the item whenever it arrives or changes, so
/// the headers always match the current items. The layout is recomputed
/// wholesale on reset.
pub struct GroupHeaderDecorator<T, K> {
    layout: GroupLayout<T, K>,
    priority: i32,
}

impl<T, K> GroupHeaderDecorator<T, K>
where
    T: Item,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new<F, H>(key: F, header: H) -> Self
    where
        F: Fn(&T) -> Option<K> + Send + Sync + 'static,
        H: Fn(&K) -> T + Send + Sync + 'static,
    {
        Self {
            layout: GroupLayout::new(Arc::new(key), Arc::new(header)),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Group keys in header order.
    pub fn group_keys(&self) -> &[K] {
        &self.layout.headers
    }
}

impl<T, K> CollectionDecorator<T> for GroupHeaderDecorator<T, K>
where
    T: Item,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "group_header"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.layout.rebuild(upstream)
    }

    fn on_changed(
        &mut self,
        _upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        let offset = self.layout.offset();
        match change {
            CollectionChange::Add { index, item } => {
                let key = self.layout.key_of(item);
                sink.add(offset + index, item.clone());
                self.layout.insert_key(*index, key, sink);
            }
            CollectionChange::Remove { index, item } => {
                sink.remove(offset + index, item.clone());
                self.layout.remove_key(*index, sink);
            }
            CollectionChange::Replace {
                index,
                old_item,
                new_item,
            } => {
                let key = self.layout.key_of(new_item);
                sink.replace(offset + index, old_item.clone(), new_item.clone());
                self.layout.set_key(*index, key, sink);
            }
            CollectionChange::Move {
                old_index,
                new_index,
                item,
            } => {
                sink.move_item(offset + old_index, offset + new_index, item.clone());
                self.layout.move_key(*old_index, *new_index, sink);
            }
            CollectionChange::ItemChanged { index, item, args } => {
                let key = self.layout.key_of(item);
                sink.item_changed(offset + index, item.clone(), args.clone());
                self.layout.set_key(*index, key, sink);
            }
            CollectionChange::Reset { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    fn tens() -> GroupDecorator<i32, i32> {
        GroupDecorator::new(|n: &i32| (*n >= 0).then_some(n / 10), |key: &i32| -(key + 1) * 100)
    }

    fn replay(
        group: &mut GroupDecorator<i32, i32>,
        output: &mut Vec<i32>,
        upstream: &[i32],
        change: CollectionChange<i32>,
    ) {
        let mut sink = ChangeSink::new();
        group.on_changed(upstream, &change, &mut sink);
        for event in sink.into_events() {
            event.apply_to(output).unwrap();
        }
        assert_eq!(*output, tens().decorate(upstream), "after {change:?}");
    }

    #[test]
    fn test_headers_by_first_appearance() {
        let mut group = tens();
        assert_eq!(group.decorate(&[12, 3, 15, -1]), vec![-200, -100, 12, 3, 15, -1]);
        assert_eq!(group.group_keys(), &[1, 0]);
        assert_eq!(group.group_items(&1), Some(&[12, 15][..]));
        assert_eq!(group.group_items(&7), None);
    }

    #[test]
    fn test_last_item_removes_header() {
        let mut group = tens();
        let mut upstream = vec![1, 12, 3];
        let mut output = group.decorate(&upstream);

        upstream.remove(1);
        let mut sink = ChangeSink::new();
        group.on_changed(&upstream, &CollectionChange::Remove { index: 1, item: 12 }, &mut sink);
        assert_eq!(
            sink.events(),
            &[
                CollectionChange::Remove { index: 3, item: 12 },
                CollectionChange::Remove { index: 1, item: -200 },
            ]
        );
        for event in sink.into_events() {
            event.apply_to(&mut output).unwrap();
        }
        assert_eq!(output, vec![-100, 1, 3]);
        assert_eq!(group.group_count(), 1);
    }

    #[test]
    fn test_new_group_and_reorder() {
        let mut group = tens();
        let mut upstream = vec![1, 12];
        let mut output = group.decorate(&upstream);

        upstream.insert(0, 25);
        replay(&mut group, &mut output, &upstream, CollectionChange::Add { index: 0, item: 25 });
        assert_eq!(output, vec![-300, -100, -200, 25, 1, 12]);

        let item = upstream.remove(2);
        upstream.insert(0, item);
        replay(
            &mut group,
            &mut output,
            &upstream,
            CollectionChange::Move { old_index: 2, new_index: 0, item: 12 },
        );
        assert_eq!(group.group_keys(), &[1, 2, 0]);
    }

    #[test]
    fn test_moves_keep_first_appearance_order() {
        let mut group = tens();
        let mut upstream = vec![1, 12, 23, 5, 14];
        let mut output = group.decorate(&upstream);

        for (old_index, new_index) in [(0, 4), (3, 0), (1, 3), (4, 1)] {
            let item = upstream.remove(old_index);
            upstream.insert(new_index, item);
            replay(
                &mut group,
                &mut output,
                &upstream,
                CollectionChange::Move { old_index, new_index, item },
            );
        }
        assert_eq!(group.group_keys(), &[1, 0, 2]);
    }

    #[test]
    fn test_item_changed_moves_between_groups() {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&recorded);
        let mut group = tens().with_callback(move |change: &GroupChange<i32, i32>| {
            sink_log.lock().push(change.clone())
        });
        let mut upstream = vec![1, 12];
        let mut output = group.decorate(&upstream);
        recorded.lock().clear();

        upstream[0] = 31;
        replay(
            &mut group,
            &mut output,
            &upstream,
            CollectionChange::ItemChanged { index: 0, item: 31, args: None },
        );
        assert_eq!(output, vec![-400, -200, 31, 12]);
        assert_eq!(
            *recorded.lock(),
            vec![
                GroupChange::ItemRemoved { key: 0, index: 0, item: 31 },
                GroupChange::GroupRemoved { key: 0 },
                GroupChange::ItemAdded { key: 3, index: 0, item: 31 },
            ]
        );
    }

    #[test]
    fn test_stable_keys_ignore_changes() {
        let mut group = tens().with_stable_keys(true);
        let upstream = vec![1, 12];
        let mut output = group.decorate(&upstream);

        let mut sink = ChangeSink::new();
        group.on_changed(
            &[31, 12],
            &CollectionChange::ItemChanged { index: 0, item: 31, args: None },
            &mut sink,
        );
        for event in sink.into_events() {
            event.apply_to(&mut output).unwrap();
        }
        assert_eq!(output, vec![-100, -200, 31, 12]);
        assert_eq!(group.group_items(&0), Some(&[31][..]));
    }

    #[test]
    fn test_header_decorator_recomputes_on_reset() {
        let mut headers =
            GroupHeaderDecorator::new(|s: &String| s.chars().next(), |c: &char| format!("[{c}]"));
        let words: Vec<String> =
            ["apple", "bean", "avocado"].iter().map(|s| s.to_string()).collect();
        let output = headers.decorate(&words);
        assert_eq!(output[..2], ["[a]".to_string(), "[b]".to_string()]);

        let mut sink = ChangeSink::new();
        headers.on_changed(
            &words[1..],
            &CollectionChange::Remove { index: 0, item: "apple".to_string() },
            &mut sink,
        );
        // "avocado" keeps group a alive but it now follows b.
        assert_eq!(headers.group_keys(), &['b', 'a']);
    }

    #[test]
    fn test_header_decorator_follows_item_changes() {
        let key = |n: &i32| Some(n / 10);
        let header = |key: &i32| -(key + 1) * 100;
        let mut headers = GroupHeaderDecorator::new(key, header);
        let mut upstream = vec![1, 12, 3];
        let mut output = headers.decorate(&upstream);

        upstream[0] = 25;
        let mut sink = ChangeSink::new();
        headers.on_changed(
            &upstream,
            &CollectionChange::ItemChanged { index: 0, item: 25, args: None },
            &mut sink,
        );
        for event in sink.into_events() {
            event.apply_to(&mut output).unwrap();
        }
        assert_eq!(output, vec![-300, -200, -100, 25, 12, 3]);
        assert_eq!(output, GroupHeaderDecorator::new(key, header).decorate(&upstream));
    }
}
