//! Inlining of nested observable lists.

use std::any::Any;
use std::sync::Arc;

use horizon_collections_core::logging::targets;

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, DecoratorHost, Item, DEFAULT_PRIORITY};
use crate::list::{ListenerGuard, ObservableList};

/// Type alias for a nested list extractor.
pub type ExtractFn<T> = Arc<dyn Fn(&T) -> Option<ObservableList<T>> + Send + Sync>;

/// A change of an expanded nested list, forwarded to the flatten stage.
#[derive(Debug, Clone)]
pub struct NestedChanged<T> {
    token: u64,
    change: CollectionChange<T>,
}

impl<T> NestedChanged<T> {
    /// The subscription the change arrived through.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// The change in the nested list's decorated view.
    pub fn change(&self) -> &CollectionChange<T> {
        &self.change
    }
}

struct Nested<T: Item> {
    list: ObservableList<T>,
    token: u64,
    /// One slot per item of the nested decorated view.
    children: Vec<Slot<T>>,
    _listener: ListenerGuard<T>,
}

/// One item of a level and the output span it expands to.
struct Slot<T: Item> {
    item: T,
    nested: Option<Nested<T>>,
}

impl<T: Item> Slot<T> {
    fn scalar(item: &T) -> Self {
        Self {
            item: item.clone(),
            nested: None,
        }
    }

    fn len(&self) -> usize {
        match &self.nested {
            Some(nested) => nested.children.iter().map(Slot::len).sum(),
            None => 1,
        }
    }

    fn holds(&self, list: &ObservableList<T>) -> bool {
        self.nested.as_ref().is_some_and(|nested| nested.list == *list)
    }

    fn expanded(&self) -> usize {
        self.nested.as_ref().map_or(0, |nested| {
            1 + nested.children.iter().map(Slot::expanded).sum::<usize>()
        })
    }

    fn flatten_into(&self, out: &mut Vec<T>) {
        match &self.nested {
            Some(nested) => nested.children.iter().for_each(|child| child.flatten_into(out)),
            None => out.push(self.item.clone()),
        }
    }

    fn flattened(&self) -> Vec<T> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    /// Remove the span back to front.
    fn emit_removal(&self, start: usize, sink: &mut ChangeSink<T>) {
        for (k, item) in self.flattened().into_iter().enumerate().rev() {
            sink.remove(start + k, item);
        }
    }

    fn emit_addition(&self, start: usize, sink: &mut ChangeSink<T>) {
        for (k, item) in self.flattened().into_iter().enumerate() {
            sink.add(start + k, item);
        }
    }
}

/// Output offset of slot `index` relative to the start of its level.
fn span_start<T: Item>(slots: &[Slot<T>], index: usize) -> usize {
    slots[..index].iter().map(Slot::len).sum()
}

/// Record the slot indices leading to the subscription `token`.
fn path_to<T: Item>(slots: &[Slot<T>], token: u64, path: &mut Vec<usize>) -> bool {
    for (index, slot) in slots.iter().enumerate() {
        if let Some(nested) = &slot.nested {
            path.push(index);
            if nested.token == token || path_to(&nested.children, token, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}

/// Whether `change` addresses slots that exist in a level of `len` slots.
fn fits<T>(change: &CollectionChange<T>, len: usize) -> bool {
    match change {
        CollectionChange::Add { index, .. } => *index <= len,
        CollectionChange::Remove { index, .. }
        | CollectionChange::Replace { index, .. }
        | CollectionChange::ItemChanged { index, .. } => *index < len,
        CollectionChange::Move {
            old_index,
            new_index,
            ..
        } => *old_index < len && *new_index < len,
        CollectionChange::Reset { .. } => true,
    }
}

/// Builds slot trees and keeps their subscriptions.
struct Expander<T: Item> {
    extract: ExtractFn<T>,
    host: Option<DecoratorHost<T>>,
    next_token: u64,
}

impl<T: Item> Expander<T> {
    /// Expand `item`, recursing into every list it holds. `ancestors` are the
    /// nested lists enclosing the level `item` belongs to.
    fn slot(&mut self, item: &T, ancestors: &[ObservableList<T>]) -> Slot<T> {
        let Some(list) = (self.extract)(item) else {
            return Slot::scalar(item);
        };
        let Some(host) = &self.host else {
            tracing::warn!(
                target: targets::DECORATOR,
                "flatten is not attached; nested list kept as scalar"
            );
            return Slot::scalar(item);
        };
        if host.is_owner(&list) || ancestors.contains(&list) {
            tracing::warn!(
                target: targets::DECORATOR,
                id = %host.id(),
                "list nested in itself kept as scalar"
            );
            return Slot::scalar(item);
        }

        self.next_token += 1;
        let token = self.next_token;
        let forward = host.clone();
        let subscribed = list.subscribe_decorated(move |change| {
            forward.post(Box::new(NestedChanged {
                token,
                change: change.clone(),
            }));
        });
        match subscribed {
            Ok((items, listener)) => {
                let mut enclosing = ancestors.to_vec();
                enclosing.push(list.clone());
                let children = items.iter().map(|child| self.slot(child, &enclosing)).collect();
                Slot {
                    item: item.clone(),
                    nested: Some(Nested {
                        list,
                        token,
                        children,
                        _listener: listener,
                    }),
                }
            }
            Err(err) => {
                tracing::warn!(
                    target: targets::DECORATOR,
                    %err,
                    "nested list cannot be subscribed; kept as scalar"
                );
                Slot::scalar(item)
            }
        }
    }

    /// Translate a change of one level whose output starts at `base`.
    fn apply(
        &mut self,
        slots: &mut Vec<Slot<T>>,
        base: usize,
        ancestors: &[ObservableList<T>],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::Add { index, item } => {
                let start = base + span_start(slots, *index);
                let slot = self.slot(item, ancestors);
                slot.emit_addition(start, sink);
                slots.insert(*index, slot);
            }
            CollectionChange::Remove { index, .. } => {
                let start = base + span_start(slots, *index);
                let slot = slots.remove(*index);
                slot.emit_removal(start, sink);
            }
            CollectionChange::Replace {
                index, new_item, ..
            } => {
                let start = base + span_start(slots, *index);
                self.swap(&mut slots[*index], start, ancestors, new_item, sink, |old, new, sink| {
                    sink.replace(start, old, new)
                });
            }
            CollectionChange::Move {
                old_index,
                new_index,
                ..
            } => {
                let from = base + span_start(slots, *old_index);
                let slot = slots.remove(*old_index);
                slots.insert(*new_index, slot);
                let to = base + span_start(slots, *new_index);
                let items = slots[*new_index].flattened();
                let len = items.len();

                if to > from {
                    // The head of the span travels to the end, `len` times.
                    for item in items {
                        sink.move_item(from, to + len - 1, item);
                    }
                } else {
                    for (k, item) in items.into_iter().enumerate() {
                        sink.move_item(from + k, to + k, item);
                    }
                }
            }
            CollectionChange::ItemChanged { index, item, args } => {
                let start = base + span_start(slots, *index);
                self.swap(&mut slots[*index], start, ancestors, item, sink, |_, new, sink| {
                    sink.item_changed(start, new, args.clone())
                });
            }
            CollectionChange::Reset { items } => {
                let mut old = Vec::new();
                slots.iter().for_each(|slot| slot.flatten_into(&mut old));
                for (k, item) in old.into_iter().enumerate().rev() {
                    sink.remove(base + k, item);
                }
                slots.clear();
                let fresh: Vec<_> = items.iter().map(|item| self.slot(item, ancestors)).collect();
                let mut start = base;
                for slot in &fresh {
                    slot.emit_addition(start, sink);
                    start += slot.len();
                }
                *slots = fresh;
            }
        }
    }

    /// Swap `slot`, whose span begins at `start`, for the expansion of
    /// `item`. A slot that already shows the same nested list is kept; two
    /// scalars are reported through `in_place`.
    fn swap(
        &mut self,
        slot: &mut Slot<T>,
        start: usize,
        ancestors: &[ObservableList<T>],
        item: &T,
        sink: &mut ChangeSink<T>,
        in_place: impl FnOnce(T, T, &mut ChangeSink<T>),
    ) {
        if let Some(list) = (self.extract)(item) {
            if slot.holds(&list) {
                slot.item = item.clone();
                return;
            }
        }

        let old = std::mem::replace(slot, self.slot(item, ancestors));
        if old.nested.is_none() && slot.nested.is_none() {
            in_place(old.item.clone(), item.clone(), sink);
        } else {
            old.emit_removal(start, sink);
            slot.emit_addition(start, sink);
        }
    }
}

/// Replaces every upstream item that holds an [`ObservableList`] with the
/// items of that list's decorated view, recursively.
///
/// The extractor decides which items expand; anything it rejects stays a
/// single scalar item. Items of a nested view are run through the same
/// extractor, so lists of lists flatten all the way down. Every expanded list
/// keeps a snapshot of its view and a subscription to its changes, which are
/// re-indexed into this stage through the owning list's notification queue.
///
/// A nested list that is the owning list itself or one of the lists enclosing
/// it, or that cannot be subscribed to because it is in the middle of a
/// change on this thread, is treated as a scalar.
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::FlattenDecorator;
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum Node {
///     Leaf(i32),
///     Group(ObservableList<Node>),
/// }
///
/// let deep = ObservableList::from_vec(vec![Node::Leaf(2)]);
/// let inner = ObservableList::from_vec(vec![Node::Leaf(1), Node::Group(deep.clone())]);
/// let outer = ObservableList::from_vec(vec![Node::Leaf(0), Node::Group(inner.clone())]);
/// outer
///     .add_decorator(FlattenDecorator::new(|node: &Node| match node {
///         Node::Group(list) => Some(list.clone()),
///         Node::Leaf(_) => None,
///     }))
///     .unwrap();
///
/// deep.push(Node::Leaf(3)).unwrap();
/// assert_eq!(
///     outer.decorated_items(),
///     vec![Node::Leaf(0), Node::Leaf(1), Node::Leaf(2), Node::Leaf(3)]
/// );
/// ```
pub struct FlattenDecorator<T: Item> {
    expander: Expander<T>,
    slots: Vec<Slot<T>>,
    priority: i32,
}

impl<T: Item> FlattenDecorator<T> {
    pub fn new<F>(extract: F) -> Self
    where
        F: Fn(&T) -> Option<ObservableList<T>> + Send + Sync + 'static,
    {
        Self {
            expander: Expander {
                extract: Arc::new(extract),
                host: None,
                next_token: 0,
            },
            slots: Vec::new(),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Number of nested lists currently expanded, at any depth.
    pub fn expanded_count(&self) -> usize {
        self.slots.iter().map(Slot::expanded).sum()
    }

    fn apply_nested(&mut self, token: u64, change: &CollectionChange<T>, sink: &mut ChangeSink<T>) {
        let mut path = Vec::new();
        if !path_to(&self.slots, token, &mut path) {
            tracing::trace!(
                target: targets::DECORATOR,
                token,
                "change from a dropped subscription ignored"
            );
            return;
        }

        let mut base = 0;
        let mut ancestors = Vec::with_capacity(path.len());
        let mut level = &mut self.slots;
        for &index in &path {
            base += span_start(level, index);
            let Some(nested) = level[index].nested.as_mut() else {
                return;
            };
            ancestors.push(nested.list.clone());
            level = &mut nested.children;
        }

        if !fits(change, level.len()) {
            tracing::warn!(
                target: targets::DECORATOR,
                token,
                kind = change.kind(),
                "nested change does not fit the snapshot"
            );
            return;
        }
        self.expander.apply(level, base, &ancestors, change, sink);
    }
}

impl<T: Item> CollectionDecorator<T> for FlattenDecorator<T> {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn on_attached(&mut self, host: &DecoratorHost<T>) {
        self.expander.host = Some(host.clone());
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.slots.clear();
        self.slots = upstream.iter().map(|item| self.expander.slot(item, &[])).collect();
        let mut output = Vec::with_capacity(upstream.len());
        for slot in &self.slots {
            slot.flatten_into(&mut output);
        }
        output
    }

    fn on_changed(
        &mut self,
        _upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        self.expander.apply(&mut self.slots, 0, &[], change, sink);
    }

    fn on_notification(
        &mut self,
        _upstream: &[T],
        payload: &(dyn Any + Send),
        sink: &mut ChangeSink<T>,
    ) {
        if let Some(nested) = payload.downcast_ref::<NestedChanged<T>>() {
            self.apply_nested(nested.token, &nested.change, sink);
        }
    }

    fn on_detached(&mut self) {
        self.slots.clear();
        self.expander.host = None;
    }
}
