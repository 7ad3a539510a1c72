//! The observable raw collection.
//!
//! [`ObservableList`] owns the raw items and, while it has decorators or
//! decorated listeners, a [`DecoratorManager`]. Every mutation is one unit of
//! work under the list lock: the raw change is applied, routed through the
//! decorator chain, and delivered to source and decorated listeners before the
//! lock is released.
//!
//! # Re-entrancy
//!
//! Listeners run while the lock is held. They may read the list, which then
//! shows the fully propagated state, but mutating the same list from a
//! listener fails with [`CollectionError::ReentrantMutation`]. Decorator
//! notifications posted while the list is busy are queued and delivered by
//! whichever call releases the lock next, reads included.
//!
//! # Batches
//!
//! While a [`BatchUpdateType::Source`] or [`BatchUpdateType::Decorators`]
//! scope is open, decorators keep updating incrementally but listeners of that
//! kind are not notified. When the outermost scope closes, a single reset is
//! sent if anything changed. A `Source` scope also opens a `Decorators` scope.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use horizon_collections_core::logging::{span_names, targets, ChainDebug, ChainFormatOptions};
use horizon_collections_core::{
    BatchToken, BatchUpdateManager, BatchUpdateType, ConnectionGuard, Signal,
};
use parking_lot::{Mutex, ReentrantMutex};

use crate::change::CollectionChange;
use crate::decorator::{CollectionDecorator, DecoratorHost, DecoratorId, Item};
use crate::error::{CollectionError, Result};
use crate::manager::DecoratorManager;

/// Construction options for an [`ObservableList`].
#[derive(Debug, Clone, Default)]
pub struct ListConfig {
    /// Name attached to log records.
    pub name: Option<String>,
    /// Initial capacity of the raw item storage.
    pub capacity: usize,
}

impl ListConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

struct ListState<T: Item> {
    items: Vec<T>,
    manager: Option<DecoratorManager<T>>,
    source_dirty: bool,
    decorated_dirty: bool,
    next_id: u64,
}

impl<T: Item> ListState<T> {
    fn decorated(&self) -> &[T] {
        match &self.manager {
            Some(manager) => manager.decorated(&self.items),
            None => &self.items,
        }
    }

    fn gate_source(
        &mut self,
        batched: bool,
        change: CollectionChange<T>,
    ) -> Vec<CollectionChange<T>> {
        if batched {
            self.source_dirty = true;
            Vec::new()
        } else {
            vec![change]
        }
    }

    fn gate_decorated(
        &mut self,
        batched: bool,
        events: Vec<CollectionChange<T>>,
    ) -> Vec<CollectionChange<T>> {
        if batched {
            self.decorated_dirty |= !events.is_empty();
            Vec::new()
        } else {
            events
        }
    }

    /// The reset owed to listeners of `ty` when its outermost batch ends.
    fn take_dirty(&mut self, ty: BatchUpdateType) -> Option<CollectionChange<T>> {
        match ty {
            BatchUpdateType::Source if std::mem::take(&mut self.source_dirty) => {
                Some(CollectionChange::Reset {
                    items: self.items.clone(),
                })
            }
            BatchUpdateType::Decorators if std::mem::take(&mut self.decorated_dirty) => {
                Some(CollectionChange::Reset {
                    items: self.decorated().to_vec(),
                })
            }
            _ => None,
        }
    }
}

struct ListCell<T: Item> {
    state: RefCell<ListState<T>>,
    /// Set while a unit of work is propagating on the lock-holding thread.
    busy: Cell<bool>,
}

/// Marks the list busy and restores the previous flag when dropped.
struct BusyGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> BusyGuard<'a> {
    fn set(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

struct PendingNotification {
    id: DecoratorId,
    payload: Box<dyn Any + Send>,
}

pub(crate) struct ListInner<T: Item> {
    name: Option<String>,
    cell: ReentrantMutex<ListCell<T>>,
    pending: Mutex<VecDeque<PendingNotification>>,
    batches: Arc<BatchUpdateManager>,
    source_changed: Arc<Signal<CollectionChange<T>>>,
    decorated_changed: Arc<Signal<CollectionChange<T>>>,
}

impl<T: Item> ListInner<T> {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("list")
    }

    fn batching(&self, ty: BatchUpdateType) -> bool {
        self.batches.is_active(ty)
    }

    fn is_busy(&self) -> bool {
        self.cell.try_lock().is_some_and(|cell| cell.busy.get())
    }

    /// Run `f` under the list lock.
    ///
    /// Notifications another thread queued while it could not take the lock
    /// are delivered before `f` runs and again once the lock is released.
    fn locked<R>(&self, f: impl FnOnce(&ListCell<T>) -> R) -> R {
        self.drain_pending();
        let result = {
            let cell = self.cell.lock();
            f(&cell)
        };
        self.drain_pending();
        result
    }

    fn read<R>(&self, f: impl FnOnce(&ListState<T>) -> R) -> R {
        self.locked(|cell| f(&cell.state.borrow()))
    }

    /// Apply one raw mutation and propagate it.
    ///
    /// `op` returns the raw change it made, or `None` when nothing changed.
    fn mutate<R>(
        &self,
        kind: &'static str,
        op: impl FnOnce(&mut Vec<T>) -> Result<(R, Option<CollectionChange<T>>)>,
    ) -> Result<R> {
        let span = tracing::trace_span!(
            target: targets::LIST,
            span_names::MUTATION,
            list = self.label(),
            kind
        );
        let _entered = span.enter();

        let result = {
            let cell = self.cell.lock();
            if cell.busy.get() {
                tracing::warn!(
                    target: targets::LIST,
                    list = self.label(),
                    kind,
                    "mutation rejected during propagation"
                );
                return Err(CollectionError::ReentrantMutation);
            }
            let _busy = BusyGuard::set(&cell.busy);

            let (result, source, decorated) = {
                let mut state = cell
                    .state
                    .try_borrow_mut()
                    .map_err(|_| CollectionError::ReentrantMutation)?;
                let state = &mut *state;
                let (result, change) = op(&mut state.items)?;
                match change {
                    None => (result, Vec::new(), Vec::new()),
                    Some(change) => {
                        tracing::trace!(
                            target: targets::LIST,
                            kind = change.kind(),
                            len = state.items.len(),
                            "raw change"
                        );
                        let decorated = match state.manager.as_mut() {
                            Some(manager) => manager.on_changed(&state.items, change.clone())?,
                            None => vec![change.clone()],
                        };
                        let source =
                            state.gate_source(self.batching(BatchUpdateType::Source), change);
                        let decorated = state
                            .gate_decorated(self.batching(BatchUpdateType::Decorators), decorated);
                        (result, source, decorated)
                    }
                }
            };

            self.publish(&source, &decorated);
            result
        };

        self.drain_pending();
        Ok(result)
    }

    /// Change the decorator chain and propagate the resulting decorated events.
    fn reconfigure<R>(
        &self,
        kind: &'static str,
        op: impl FnOnce(&mut ListState<T>) -> Result<(R, Vec<CollectionChange<T>>)>,
    ) -> Result<R> {
        let result = {
            let cell = self.cell.lock();
            if cell.busy.get() {
                tracing::warn!(
                    target: targets::LIST,
                    list = self.label(),
                    kind,
                    "reconfiguration rejected during propagation"
                );
                return Err(CollectionError::ReentrantMutation);
            }
            let _busy = BusyGuard::set(&cell.busy);

            let (result, decorated) = {
                let mut state = cell
                    .state
                    .try_borrow_mut()
                    .map_err(|_| CollectionError::ReentrantMutation)?;
                let (result, events) = op(&mut state)?;
                let decorated =
                    state.gate_decorated(self.batching(BatchUpdateType::Decorators), events);
                (result, decorated)
            };

            self.publish(&[], &decorated);
            result
        };

        self.drain_pending();
        Ok(result)
    }

    fn publish(&self, source: &[CollectionChange<T>], decorated: &[CollectionChange<T>]) {
        for change in source {
            self.source_changed.emit(change);
        }
        for change in decorated {
            self.decorated_changed.emit(change);
        }
    }

    /// Queue a payload for a decorator and deliver it as soon as possible.
    pub(crate) fn post_notification(&self, id: DecoratorId, payload: Box<dyn Any + Send>) {
        self.pending.lock().push_back(PendingNotification { id, payload });
        self.drain_pending();
    }

    /// Deliver queued notifications unless another unit of work owns the list.
    fn drain_pending(&self) {
        loop {
            if self.pending.lock().is_empty() {
                return;
            }
            let Some(cell) = self.cell.try_lock() else {
                return;
            };
            if cell.busy.get() {
                return;
            }
            let _busy = BusyGuard::set(&cell.busy);

            let Some(work) = self.pending.lock().pop_front() else {
                continue;
            };
            let _span =
                tracing::trace_span!(target: targets::LIST, span_names::PENDING, id = %work.id)
                    .entered();

            let decorated = {
                let Ok(mut state) = cell.state.try_borrow_mut() else {
                    self.pending.lock().push_front(work);
                    return;
                };
                let state = &mut *state;
                let Some(manager) = state.manager.as_mut() else {
                    continue;
                };
                match manager.on_notification(&state.items, work.id, &*work.payload) {
                    Ok(events) => {
                        state.gate_decorated(self.batching(BatchUpdateType::Decorators), events)
                    }
                    Err(err) => {
                        tracing::error!(
                            target: targets::LIST,
                            list = self.label(),
                            id = %work.id,
                            %err,
                            "decorator notification failed"
                        );
                        continue;
                    }
                }
            };

            self.publish(&[], &decorated);
        }
    }

    fn end_batch(&self, ty: BatchUpdateType) {
        {
            let cell = self.cell.lock();
            if self.batches.depth(ty) == 1 {
                let reset = cell
                    .state
                    .try_borrow_mut()
                    .ok()
                    .and_then(|mut state| state.take_dirty(ty));
                if let Some(reset) = reset {
                    let _busy = BusyGuard::set(&cell.busy);
                    tracing::debug!(
                        target: targets::BATCH,
                        list = self.label(),
                        ?ty,
                        "flushing batched changes"
                    );
                    match ty {
                        BatchUpdateType::Source => self.source_changed.emit(&reset),
                        _ => self.decorated_changed.emit(&reset),
                    }
                }
            }
            if let Err(err) = self.batches.end(ty) {
                tracing::warn!(
                    target: targets::BATCH,
                    list = self.label(),
                    %err,
                    "unbalanced batch end"
                );
            }
        }
        self.drain_pending();
    }

    /// Drop the manager once nothing needs it.
    fn try_release_manager(&self) {
        if let Some(cell) = self.cell.try_lock() {
            self.release_unused_manager(&cell);
        }
        self.drain_pending();
    }

    fn release_unused_manager(&self, cell: &ListCell<T>) {
        if cell.busy.get() {
            return;
        }
        let Ok(mut state) = cell.state.try_borrow_mut() else {
            return;
        };
        let unused = state.manager.as_ref().is_some_and(DecoratorManager::is_empty);
        if unused && self.decorated_changed.connection_count() == 0 {
            state.manager = None;
            tracing::debug!(
                target: targets::LIST,
                list = self.label(),
                "decorator manager released"
            );
        }
    }

    fn ensure_manager(&self) {
        self.locked(|cell| {
            if let Ok(mut state) = cell.state.try_borrow_mut() {
                state.manager.get_or_insert_with(DecoratorManager::new);
            }
        });
    }
}

impl<T: Item> Drop for ListInner<T> {
    fn drop(&mut self) {
        let state = self.cell.get_mut().state.get_mut();
        if let Some(mut manager) = state.manager.take() {
            manager.detach_all();
            tracing::debug!(
                target: targets::LIST,
                list = self.label(),
                "decorators detached on drop"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKind {
    Source,
    Decorated,
}

/// Keeps a listener connected until dropped.
///
/// Dropping the last decorated listener of a list without decorators also
/// releases its decorator manager.
#[must_use = "dropping a listener guard disconnects the listener"]
pub struct ListenerGuard<T: Item> {
    connection: Option<ConnectionGuard<CollectionChange<T>>>,
    list: Weak<ListInner<T>>,
    kind: ListenerKind,
}

impl<T: Item> ListenerGuard<T> {
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(ConnectionGuard::is_connected)
    }

    /// Disconnect now.
    pub fn disconnect(self) {
        drop(self);
    }
}

impl<T: Item> Drop for ListenerGuard<T> {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect();
        }
        if self.kind == ListenerKind::Decorated {
            if let Some(list) = self.list.upgrade() {
                list.try_release_manager();
            }
        }
    }
}

impl<T: Item> fmt::Debug for ListenerGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("kind", &self.kind)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// A thread-safe observable list with a decorator pipeline.
///
/// Cloning is cheap and yields another handle to the same list.
///
/// Reads take the list lock and must not be called from inside this list's
/// own decorator callbacks; listener callbacks may read freely.
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::{FilterDecorator, SortingDecorator};
/// use horizon_collections::decorators::Comparer;
///
/// let list = ObservableList::new();
/// list.add_decorator(FilterDecorator::new(|n: &i32| n % 2 == 0)).unwrap();
/// list.add_decorator(SortingDecorator::new(Comparer::descending()).with_priority(10)).unwrap();
/// for n in 1..=5 {
///     list.push(n).unwrap();
/// }
/// assert_eq!(list.decorated_items(), vec![4, 2]);
/// ```
pub struct ObservableList<T: Item> {
    inner: Arc<ListInner<T>>,
}

impl<T: Item> ObservableList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::with_config(ListConfig::default(), Vec::new())
    }

    /// Create a list holding `items`.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self::with_config(ListConfig::default(), items)
    }

    pub fn with_config(config: ListConfig, items: impl IntoIterator<Item = T>) -> Self {
        let mut storage = Vec::with_capacity(config.capacity);
        storage.extend(items);
        Self {
            inner: Arc::new(ListInner {
                name: config.name,
                cell: ReentrantMutex::new(ListCell {
                    state: RefCell::new(ListState {
                        items: storage,
                        manager: None,
                        source_dirty: false,
                        decorated_dirty: false,
                        next_id: 0,
                    }),
                    busy: Cell::new(false),
                }),
                pending: Mutex::new(VecDeque::new()),
                batches: Arc::new(BatchUpdateManager::new()),
                source_changed: Arc::new(Signal::new()),
                decorated_changed: Arc::new(Signal::new()),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub(crate) fn ptr_eq_inner(&self, other: &Weak<ListInner<T>>) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.inner), other.as_ptr())
    }

    // -------------------------------------------------------------------------
    // Raw reads
    // -------------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.inner.read(|state| state.items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.read(|state| state.items.get(index).cloned())
    }

    /// A snapshot of the raw items.
    pub fn items(&self) -> Vec<T> {
        self.inner.read(|state| state.items.clone())
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.read(|state| state.items.iter().position(|candidate| candidate == item))
    }

    // -------------------------------------------------------------------------
    // Raw mutations
    // -------------------------------------------------------------------------

    pub fn push(&self, item: T) -> Result<()> {
        self.inner.mutate("add", |items| {
            items.push(item.clone());
            Ok((
                (),
                Some(CollectionChange::Add {
                    index: items.len() - 1,
                    item,
                }),
            ))
        })
    }

    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.inner.mutate("add", |items| {
            check_index(index, items.len() + 1, items.len())?;
            items.insert(index, item.clone());
            Ok(((), Some(CollectionChange::Add { index, item })))
        })
    }

    /// Remove and return the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.inner.mutate("remove", |items| {
            check_index(index, items.len(), items.len())?;
            let item = items.remove(index);
            Ok((item.clone(), Some(CollectionChange::Remove { index, item })))
        })
    }

    /// Remove the first item equal to `item`. Returns `false` if none was found.
    pub fn remove(&self, item: &T) -> Result<bool> {
        self.inner.mutate("remove", |items| {
            let Some(index) = items.iter().position(|candidate| candidate == item) else {
                return Ok((false, None));
            };
            let item = items.remove(index);
            Ok((true, Some(CollectionChange::Remove { index, item })))
        })
    }

    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        self.inner.mutate("move", |items| {
            check_index(old_index, items.len(), items.len())?;
            check_index(new_index, items.len(), items.len())?;
            if old_index == new_index {
                return Ok(((), None));
            }
            let item = items.remove(old_index);
            items.insert(new_index, item.clone());
            Ok((
                (),
                Some(CollectionChange::Move {
                    old_index,
                    new_index,
                    item,
                }),
            ))
        })
    }

    /// Replace the item at `index`, returning the previous one.
    pub fn replace(&self, index: usize, item: T) -> Result<T> {
        self.inner.mutate("replace", |items| {
            check_index(index, items.len(), items.len())?;
            let old_item = std::mem::replace(&mut items[index], item.clone());
            Ok((
                old_item.clone(),
                Some(CollectionChange::Replace {
                    index,
                    old_item,
                    new_item: item,
                }),
            ))
        })
    }

    /// Replace every item.
    pub fn reset(&self, items: Vec<T>) -> Result<()> {
        self.inner.mutate("reset", |current| {
            current.clone_from(&items);
            Ok(((), Some(CollectionChange::Reset { items })))
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.reset(Vec::new())
    }

    /// Announce that the item at `index` changed in place.
    pub fn raise_item_changed(&self, index: usize, args: Option<&str>) -> Result<()> {
        self.inner.mutate("item_changed", |items| {
            check_index(index, items.len(), items.len())?;
            Ok((
                (),
                Some(CollectionChange::ItemChanged {
                    index,
                    item: items[index].clone(),
                    args: args.map(Arc::from),
                }),
            ))
        })
    }

    /// Announce a change of the first item equal to `item`. Returns `false`
    /// if it is not in the list.
    pub fn raise_item_changed_for(&self, item: &T, args: Option<&str>) -> Result<bool> {
        self.inner.mutate("item_changed", |items| {
            let Some(index) = items.iter().position(|candidate| candidate == item) else {
                return Ok((false, None));
            };
            Ok((
                true,
                Some(CollectionChange::ItemChanged {
                    index,
                    item: items[index].clone(),
                    args: args.map(Arc::from),
                }),
            ))
        })
    }

    /// Modify the item at `index` in place and announce the change.
    pub fn update_item<R>(
        &self,
        index: usize,
        args: Option<&str>,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R> {
        self.inner.mutate("item_changed", |items| {
            check_index(index, items.len(), items.len())?;
            let result = f(&mut items[index]);
            Ok((
                result,
                Some(CollectionChange::ItemChanged {
                    index,
                    item: items[index].clone(),
                    args: args.map(Arc::from),
                }),
            ))
        })
    }

    // -------------------------------------------------------------------------
    // Decorators
    // -------------------------------------------------------------------------

    /// Attach a decorator. Decorated listeners receive a reset.
    pub fn add_decorator<D: CollectionDecorator<T>>(&self, decorator: D) -> Result<DecoratorId> {
        let list = Arc::downgrade(&self.inner);
        self.inner.reconfigure("add_decorator", |state| {
            state.next_id += 1;
            let id = DecoratorId::new(state.next_id);
            let host = DecoratorHost::new(list, id);
            let manager = state.manager.get_or_insert_with(DecoratorManager::new);
            let events = manager.attach(id, Box::new(decorator), &host, &state.items);
            Ok((id, events))
        })
    }

    /// Detach a decorator. Decorated listeners receive a reset.
    pub fn remove_decorator(&self, id: DecoratorId) -> Result<()> {
        self.inner.reconfigure("remove_decorator", |state| {
            let manager = state.manager.as_mut().ok_or(CollectionError::UnknownDecorator(id))?;
            let (_decorator, events) = manager.detach(id, &state.items)?;
            Ok(((), events))
        })?;
        self.inner.try_release_manager();
        Ok(())
    }

    /// Reconfigure a decorator of type `D`, then rebuild the view from it on.
    pub fn update_decorator<D, R>(&self, id: DecoratorId, f: impl FnOnce(&mut D) -> R) -> Result<R>
    where
        D: CollectionDecorator<T>,
    {
        self.inner.reconfigure("update_decorator", |state| {
            let manager = state.manager.as_mut().ok_or(CollectionError::UnknownDecorator(id))?;
            manager.update(id, &state.items, f)
        })
    }

    /// Inspect a decorator of type `D`.
    pub fn with_decorator<D, R>(&self, id: DecoratorId, f: impl FnOnce(&D) -> R) -> Result<R>
    where
        D: CollectionDecorator<T>,
    {
        self.inner.read(|state| {
            state
                .manager
                .as_ref()
                .ok_or(CollectionError::UnknownDecorator(id))?
                .with(id, f)
        })
    }

    /// IDs of the attached decorators, in chain order.
    pub fn decorator_ids(&self) -> Vec<DecoratorId> {
        self.inner
            .read(|state| state.manager.as_ref().map(DecoratorManager::ids).unwrap_or_default())
    }

    /// Deliver `payload` to a decorator's
    /// [`on_notification`](CollectionDecorator::on_notification).
    ///
    /// Called from a listener of this list, the payload is queued and
    /// delivered after the current propagation.
    pub fn notify_decorator<P: Any + Send>(&self, id: DecoratorId, payload: P) -> Result<()> {
        if self.inner.is_busy() {
            self.inner.post_notification(id, Box::new(payload));
            return Ok(());
        }
        self.inner.reconfigure("notify_decorator", |state| {
            let manager = state
                .manager
                .as_mut()
                .filter(|manager| manager.ids().contains(&id))
                .ok_or(CollectionError::UnknownDecorator(id))?;
            let events = manager.on_notification(&state.items, id, &payload)?;
            Ok(((), events))
        })
    }

    pub fn has_decorator_manager(&self) -> bool {
        self.inner.read(|state| state.manager.is_some())
    }

    // -------------------------------------------------------------------------
    // Decorated view
    // -------------------------------------------------------------------------

    /// A snapshot of the decorated view.
    pub fn decorated_items(&self) -> Vec<T> {
        self.inner.read(|state| state.decorated().to_vec())
    }

    pub fn decorated_len(&self) -> usize {
        self.inner.read(|state| state.decorated().len())
    }

    /// Decorated indices at which `item` appears. With `ignore_duplicates`
    /// at most the first one is returned.
    pub fn try_get_indexes(&self, item: &T, ignore_duplicates: bool) -> Vec<usize> {
        self.inner.read(|state| match &state.manager {
            Some(manager) => manager.try_get_indexes(&state.items, item, ignore_duplicates),
            None => {
                let mut indexes = Vec::new();
                crate::decorator::scan(&state.items, item, ignore_duplicates, &mut indexes);
                indexes
            }
        })
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    /// Listen to raw changes.
    pub fn add_source_listener<F>(&self, listener: F) -> ListenerGuard<T>
    where
        F: Fn(&CollectionChange<T>) + Send + Sync + 'static,
    {
        ListenerGuard {
            connection: Some(self.inner.source_changed.connect_scoped(listener)),
            list: Arc::downgrade(&self.inner),
            kind: ListenerKind::Source,
        }
    }

    /// Listen to changes of the decorated view.
    pub fn add_decorated_listener<F>(&self, listener: F) -> ListenerGuard<T>
    where
        F: Fn(&CollectionChange<T>) + Send + Sync + 'static,
    {
        self.inner.ensure_manager();
        ListenerGuard {
            connection: Some(self.inner.decorated_changed.connect_scoped(listener)),
            list: Arc::downgrade(&self.inner),
            kind: ListenerKind::Decorated,
        }
    }

    /// Snapshot the decorated view and listen to its changes, atomically.
    ///
    /// Fails with [`CollectionError::Busy`] when called on this thread while
    /// the list is applying a change.
    pub fn subscribe_decorated<F>(&self, listener: F) -> Result<(Vec<T>, ListenerGuard<T>)>
    where
        F: Fn(&CollectionChange<T>) + Send + Sync + 'static,
    {
        self.inner.locked(|cell| -> Result<(Vec<T>, ListenerGuard<T>)> {
            let mut state = cell.state.try_borrow_mut().map_err(|_| CollectionError::Busy)?;
            let state = &mut *state;
            let snapshot = state
                .manager
                .get_or_insert_with(DecoratorManager::new)
                .decorated(&state.items)
                .to_vec();
            let guard = ListenerGuard {
                connection: Some(self.inner.decorated_changed.connect_scoped(listener)),
                list: Arc::downgrade(&self.inner),
                kind: ListenerKind::Decorated,
            };
            Ok((snapshot, guard))
        })
    }

    // -------------------------------------------------------------------------
    // Batches
    // -------------------------------------------------------------------------

    /// Open a batch scope that ends when the token is dropped.
    pub fn begin_batch(&self, ty: BatchUpdateType) -> BatchToken {
        self.inner.batches.begin(ty);
        if ty == BatchUpdateType::Source {
            self.inner.batches.begin(BatchUpdateType::Decorators);
        }
        tracing::debug!(target: targets::BATCH, list = self.inner.label(), ?ty, "batch begun");

        let list = Arc::downgrade(&self.inner);
        BatchToken::new(move || {
            let Some(list) = list.upgrade() else {
                return;
            };
            if ty == BatchUpdateType::Source {
                list.end_batch(BatchUpdateType::Decorators);
            }
            list.end_batch(ty);
        })
    }

    pub fn is_batch_active(&self, ty: BatchUpdateType) -> bool {
        self.inner.batches.is_active(ty)
    }

    /// Batch depths and the begin/end signals.
    pub fn batches(&self) -> &Arc<BatchUpdateManager> {
        &self.inner.batches
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    pub fn describe_chain(&self) -> ChainDebug {
        self.inner.read(|state| {
            let stages = state.manager.as_ref().map(DecoratorManager::describe).unwrap_or_default();
            ChainDebug::new(state.items.len(), stages)
        })
    }

    pub fn format_chain(&self, options: ChainFormatOptions) -> String {
        self.describe_chain().with_options(options).to_string()
    }
}

fn check_index(index: usize, bound: usize, len: usize) -> Result<()> {
    if index < bound {
        Ok(())
    } else {
        Err(CollectionError::IndexOutOfRange { index, len })
    }
}

impl<T: Item> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Item> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Item> PartialEq for ObservableList<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Item> FromIterator<T> for ObservableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::with_config(ListConfig::default(), iter)
    }
}

impl<T: Item> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ObservableList");
        s.field("name", &self.inner.name);
        // Avoid blocking on another thread's propagation.
        match self.inner.cell.try_lock() {
            Some(cell) => match cell.state.try_borrow() {
                Ok(state) => s.field("len", &state.items.len()).field("decorators", &state.manager),
                Err(_) => s.field("state", &"<busy>"),
            },
            None => s.field("state", &"<locked>"),
        };
        s.finish()
    }
}

static_assertions::assert_impl_all!(ObservableList<i32>: Send, Sync, Clone);
static_assertions::assert_impl_all!(ListenerGuard<i32>: Send, Sync);
