//! The decorator contract.
//!
//! A decorator is one stage of the pipeline between a raw collection and its
//! decorated view. Each stage receives the output of the stage before it (the
//! *upstream*), keeps whatever incremental state it needs, and describes how
//! its own output changes through a [`ChangeSink`].
//!
//! # Writing a decorator
//!
//! ```
//! use std::any::Any;
//! use horizon_collections::{ChangeSink, CollectionChange, CollectionDecorator, ObservableList};
//!
//! /// Doubles every number.
//! struct Doubler;
//!
//! impl CollectionDecorator<i32> for Doubler {
//!     fn name(&self) -> &'static str {
//!         "doubler"
//!     }
//!
//!     fn decorate(&mut self, upstream: &[i32]) -> Vec<i32> {
//!         upstream.iter().map(|n| n * 2).collect()
//!     }
//!
//!     fn on_changed(
//!         &mut self,
//!         _upstream: &[i32],
//!         change: &CollectionChange<i32>,
//!         sink: &mut ChangeSink<i32>,
//!     ) {
//!         match change {
//!             CollectionChange::Add { index, item } => sink.add(*index, item * 2),
//!             CollectionChange::Remove { index, item } => sink.remove(*index, item * 2),
//!             CollectionChange::Replace { index, old_item, new_item } => {
//!                 sink.replace(*index, old_item * 2, new_item * 2)
//!             }
//!             CollectionChange::Move { old_index, new_index, item } => {
//!                 sink.move_item(*old_index, *new_index, item * 2)
//!             }
//!             CollectionChange::ItemChanged { index, item, args } => {
//!                 sink.item_changed(*index, item * 2, args.clone())
//!             }
//!             CollectionChange::Reset { .. } => {}
//!         }
//!     }
//! }
//!
//! let list = ObservableList::from_vec(vec![1, 2]);
//! list.add_decorator(Doubler).unwrap();
//! list.push(3).unwrap();
//! assert_eq!(list.decorated_items(), vec![2, 4, 6]);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::change::CollectionChange;
use crate::list::{ListInner, ObservableList};
use crate::manager::Stage;

/// Element types that can flow through the pipeline.
///
/// Identity is `PartialEq`. Heterogeneous decorated content such as group
/// headers is expressed by the consumer as an enum.
pub trait Item: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> Item for T {}

/// Priority used by decorators unless configured otherwise.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Stable identity of an attached decorator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecoratorId(u64);

impl DecoratorId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DecoratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Collects the events a decorator emits for one upstream change.
///
/// Events are applied in order: the indices of each event refer to the
/// decorator's output after all previous events have been applied.
pub struct ChangeSink<T> {
    events: Vec<CollectionChange<T>>,
}

impl<T> Default for ChangeSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChangeSink<T> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an arbitrary change.
    pub fn push(&mut self, change: CollectionChange<T>) {
        self.events.push(change);
    }

    pub fn add(&mut self, index: usize, item: T) {
        self.push(CollectionChange::Add { index, item });
    }

    pub fn remove(&mut self, index: usize, item: T) {
        self.push(CollectionChange::Remove { index, item });
    }

    pub fn replace(&mut self, index: usize, old_item: T, new_item: T) {
        self.push(CollectionChange::Replace {
            index,
            old_item,
            new_item,
        });
    }

    /// Emit a move; a move to the same position is dropped.
    pub fn move_item(&mut self, old_index: usize, new_index: usize, item: T) {
        if old_index != new_index {
            self.push(CollectionChange::Move {
                old_index,
                new_index,
                item,
            });
        }
    }

    pub fn reset(&mut self, items: Vec<T>) {
        self.push(CollectionChange::Reset { items });
    }

    pub fn item_changed(&mut self, index: usize, item: T, args: Option<Arc<str>>) {
        self.push(CollectionChange::ItemChanged { index, item, args });
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// The collected events, in emission order.
    pub fn events(&self) -> &[CollectionChange<T>] {
        &self.events
    }

    pub fn into_events(self) -> Vec<CollectionChange<T>> {
        self.events
    }
}

/// A point lookup travelling backwards through the chain.
///
/// Handed to [`CollectionDecorator::try_get_indexes`]. A decorator may answer
/// from its own output ([`scan_output`](Self::scan_output), the default) or
/// translate the answer of the stages before it
/// ([`upstream_indexes`](Self::upstream_indexes)).
pub struct IndexQuery<'a, T: Item> {
    item: &'a T,
    ignore_duplicates: bool,
    raw: &'a [T],
    chain: &'a [Stage<T>],
}

impl<'a, T: Item> IndexQuery<'a, T> {
    pub(crate) fn new(
        item: &'a T,
        ignore_duplicates: bool,
        raw: &'a [T],
        chain: &'a [Stage<T>],
    ) -> Self {
        Self {
            item,
            ignore_duplicates,
            raw,
            chain,
        }
    }

    /// The item being looked up.
    pub fn item(&self) -> &T {
        self.item
    }

    /// When `true`, at most one index is wanted.
    pub fn ignore_duplicates(&self) -> bool {
        self.ignore_duplicates
    }

    /// The output of the stage being queried.
    pub fn output(&self) -> &[T] {
        self.chain.last().map_or(self.raw, |stage| stage.output.as_slice())
    }

    /// The input of the stage being queried.
    pub fn upstream(&self) -> &[T] {
        match self.chain.len() {
            0 | 1 => self.raw,
            n => &self.chain[n - 2].output,
        }
    }

    /// Every index of the item in the upstream view, answered by the previous
    /// stage (or by scanning the raw items at the head of the chain).
    pub fn upstream_indexes(&self) -> Vec<usize> {
        let mut indexes = Vec::new();
        match self.chain.split_last() {
            Some((_, rest)) if !rest.is_empty() => {
                let query = IndexQuery::new(self.item, false, self.raw, rest);
                if let Some(previous) = rest.last() {
                    previous.decorator.try_get_indexes(&query, &mut indexes);
                }
            }
            _ => scan(self.raw, self.item, false, &mut indexes),
        }
        indexes
    }

    /// Append every index of the item in [`output`](Self::output).
    pub fn scan_output(&self, indexes: &mut Vec<usize>) {
        scan(self.output(), self.item, self.ignore_duplicates, indexes);
    }
}

pub(crate) fn scan<T: PartialEq>(
    items: &[T],
    item: &T,
    first_only: bool,
    indexes: &mut Vec<usize>,
) {
    for (i, candidate) in items.iter().enumerate() {
        if candidate == item {
            indexes.push(i);
            if first_only {
                return;
            }
        }
    }
}

/// Handle through which an attached decorator reaches its collection.
///
/// The host never keeps the collection alive.
pub struct DecoratorHost<T: Item> {
    list: Weak<ListInner<T>>,
    id: DecoratorId,
}

impl<T: Item> Clone for DecoratorHost<T> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            id: self.id,
        }
    }
}

impl<T: Item> DecoratorHost<T> {
    pub(crate) fn new(list: Weak<ListInner<T>>, id: DecoratorId) -> Self {
        Self { list, id }
    }

    /// A host that is not connected to any collection.
    pub fn detached(id: DecoratorId) -> Self {
        Self {
            list: Weak::new(),
            id,
        }
    }

    /// The identity assigned to the decorator.
    pub fn id(&self) -> DecoratorId {
        self.id
    }

    /// Returns `true` if `list` is the collection this decorator is attached to.
    pub fn is_owner(&self, list: &ObservableList<T>) -> bool {
        list.ptr_eq_inner(&self.list)
    }

    /// Queue an out-of-band notification for this decorator.
    ///
    /// The payload is delivered to [`CollectionDecorator::on_notification`]
    /// by whichever thread next holds the collection lock, after any change
    /// currently being propagated. Returns `false` if the collection is gone.
    pub fn post(&self, payload: Box<dyn Any + Send>) -> bool {
        match self.list.upgrade() {
            Some(list) => {
                list.post_notification(self.id, payload);
                true
            }
            None => false,
        }
    }
}

impl<T: Item> fmt::Debug for DecoratorHost<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorHost")
            .field("id", &self.id)
            .field("attached", &(self.list.strong_count() > 0))
            .finish()
    }
}

/// One stage of a collection's decorator pipeline.
///
/// The manager keeps each stage's output materialized and applies the events
/// a stage emits to it, so implementations only track the state they need to
/// translate changes.
pub trait CollectionDecorator<T: Item>: Any + Send {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Lower values run earlier. Ties run in attach order.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Called once when the decorator joins a collection, before the first
    /// [`decorate`](Self::decorate).
    fn on_attached(&mut self, _host: &DecoratorHost<T>) {}

    /// Rebuild all state from `upstream` and return the full output.
    ///
    /// Used on attach, on upstream resets and after reconfiguration.
    fn decorate(&mut self, upstream: &[T]) -> Vec<T>;

    /// Translate one upstream change.
    ///
    /// `upstream` already reflects `change`. Never called with
    /// [`CollectionChange::Reset`]; resets go through `decorate`.
    fn on_changed(
        &mut self,
        upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    );

    /// Handle a payload posted through [`DecoratorHost::post`] or
    /// [`ObservableList::notify_decorator`].
    fn on_notification(
        &mut self,
        _upstream: &[T],
        _payload: &(dyn Any + Send),
        _sink: &mut ChangeSink<T>,
    ) {
    }

    /// Append the output indices of `query.item()`.
    fn try_get_indexes(&self, query: &IndexQuery<'_, T>, indexes: &mut Vec<usize>) {
        query.scan_output(indexes);
    }

    /// Called once when the decorator leaves the collection.
    fn on_detached(&mut self) {}
}

impl<T: Item> dyn CollectionDecorator<T> {
    /// Returns `true` if the decorator is of type `D`.
    pub fn is<D: CollectionDecorator<T>>(&self) -> bool {
        let any: &dyn Any = self;
        any.is::<D>()
    }

    /// Downcast to a concrete decorator type.
    pub fn downcast_ref<D: CollectionDecorator<T>>(&self) -> Option<&D> {
        let any: &dyn Any = self;
        any.downcast_ref::<D>()
    }

    /// Downcast to a concrete decorator type.
    pub fn downcast_mut<D: CollectionDecorator<T>>(&mut self) -> Option<&mut D> {
        let any: &mut dyn Any = self;
        any.downcast_mut::<D>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough;

    impl CollectionDecorator<u8> for Passthrough {
        fn name(&self) -> &'static str {
            "passthrough"
        }

        fn decorate(&mut self, upstream: &[u8]) -> Vec<u8> {
            upstream.to_vec()
        }

        fn on_changed(
            &mut self,
            _: &[u8],
            change: &CollectionChange<u8>,
            sink: &mut ChangeSink<u8>,
        ) {
            sink.push(change.clone());
        }
    }

    #[test]
    fn test_sink_drops_noop_moves() {
        let mut sink = ChangeSink::new();
        sink.move_item(2, 2, 'x');
        assert!(sink.is_empty());
        sink.move_item(1, 2, 'x');
        sink.add(0, 'y');
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events()[1], CollectionChange::Add { index: 0, item: 'y' });
    }

    #[test]
    fn test_downcast() {
        let mut boxed: Box<dyn CollectionDecorator<u8>> = Box::new(Passthrough);
        assert!(boxed.is::<Passthrough>());
        assert!(boxed.downcast_mut::<Passthrough>().is_some());
        assert_eq!(boxed.priority(), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_scan() {
        let mut indexes = Vec::new();
        scan(&[1, 2, 1, 1], &1, false, &mut indexes);
        assert_eq!(indexes, vec![0, 2, 3]);

        indexes.clear();
        scan(&[1, 2, 1, 1], &1, true, &mut indexes);
        assert_eq!(indexes, vec![0]);
    }

    #[test]
    fn test_detached_host_post_is_dropped() {
        let host = DecoratorHost::<u8>::detached(DecoratorId::new(4));
        assert_eq!(host.id().as_u64(), 4);
        assert!(!host.post(Box::new(())));
    }
}
