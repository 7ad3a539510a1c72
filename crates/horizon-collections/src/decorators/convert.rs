//! Item projection with value reuse and cleanup.

use std::sync::Arc;

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, Item, DEFAULT_PRIORITY};
use crate::error::{CollectionError, Result};

/// Priority [`ConvertImmutableDecorator`] uses unless told otherwise. It sorts
/// ahead of every decorator left at the default priority.
pub const CONVERT_IMMUTABLE_PRIORITY: i32 = -1000;

/// Type alias for a converter that may reuse the previous value.
pub type ConvertFn<T> = Arc<dyn Fn(&T, Option<&T>) -> T + Send + Sync>;

/// Type alias for a value cleanup callback.
pub type CleanupFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Upstream items and the values produced for them, slot for slot.
struct Converted<T> {
    sources: Vec<T>,
    values: Vec<T>,
    cleanup: Option<CleanupFn<T>>,
}

impl<T: Item> Converted<T> {
    fn new(cleanup: Option<CleanupFn<T>>) -> Self {
        Self {
            sources: Vec::new(),
            values: Vec::new(),
            cleanup,
        }
    }

    fn release(&self, value: &T) {
        if let Some(cleanup) = &self.cleanup {
            cleanup(value);
        }
    }

    /// Release `previous` unless the converter handed it back.
    fn release_replaced(&self, previous: &T, current: &T) {
        if previous != current {
            self.release(previous);
        }
    }

    /// Convert a whole snapshot, keeping the value of every item that is
    /// still present.
    fn rebuild(&mut self, upstream: &[T], mut convert: impl FnMut(&T) -> T) -> Vec<T> {
        let mut old: Vec<Option<(T, T)>> = self
            .sources
            .drain(..)
            .zip(self.values.drain(..))
            .map(Some)
            .collect();

        let values: Vec<T> = upstream
            .iter()
            .map(|item| {
                let reused = old
                    .iter_mut()
                    .find(|slot| matches!(slot, Some((source, _)) if source == item))
                    .and_then(Option::take);
                match reused {
                    Some((_, value)) => value,
                    None => convert(item),
                }
            })
            .collect();

        for (_, value) in old.into_iter().flatten() {
            self.release(&value);
        }
        self.sources = upstream.to_vec();
        self.values = values.clone();
        values
    }

    fn insert(&mut self, index: usize, source: T, value: T) {
        self.sources.insert(index, source);
        self.values.insert(index, value);
    }

    fn remove(&mut self, index: usize) -> T {
        self.sources.remove(index);
        let value = self.values.remove(index);
        self.release(&value);
        value
    }

    fn move_slot(&mut self, old_index: usize, new_index: usize) -> T {
        let source = self.sources.remove(old_index);
        self.sources.insert(new_index, source);
        let value = self.values.remove(old_index);
        self.values.insert(new_index, value.clone());
        value
    }

    fn release_all(&mut self) {
        self.sources.clear();
        for value in std::mem::take(&mut self.values) {
            self.release(&value);
        }
    }
}

/// Projects every upstream item through a converter.
///
/// The converter gets the value it produced last time for the same slot, so
/// it can return that value unchanged instead of building a new one. The
/// cleanup callback runs exactly once for each value that leaves: on remove,
/// when a replace or change produces a different value, when a rebuild drops
/// it, and for every live value on detach.
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::ConvertDecorator;
///
/// let list = ObservableList::from_vec(vec![1, 2]);
/// let convert = ConvertDecorator::builder()
///     .converter(|n: &i32, _previous: Option<&i32>| n * 10)
///     .build()
///     .unwrap();
/// list.add_decorator(convert).unwrap();
/// assert_eq!(list.decorated_items(), vec![10, 20]);
/// ```
pub struct ConvertDecorator<T> {
    converter: ConvertFn<T>,
    slots: Converted<T>,
    priority: i32,
}

impl<T: Item> ConvertDecorator<T> {
    pub fn new<F>(converter: F) -> Self
    where
        F: Fn(&T, Option<&T>) -> T + Send + Sync + 'static,
    {
        Self {
            converter: Arc::new(converter),
            slots: Converted::new(None),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn builder() -> ConvertDecoratorBuilder<T> {
        ConvertDecoratorBuilder::default()
    }

    /// Current converted values in upstream order.
    pub fn values(&self) -> &[T] {
        &self.slots.values
    }

    fn reconvert(&self, index: usize, item: &T) -> (T, T) {
        let previous = self.slots.values[index].clone();
        let value = (self.converter)(item, Some(&previous));
        self.slots.release_replaced(&previous, &value);
        (previous, value)
    }
}

impl<T: Item> CollectionDecorator<T> for ConvertDecorator<T> {
    fn name(&self) -> &'static str {
        "convert"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        let converter = Arc::clone(&self.converter);
        self.slots.rebuild(upstream, |item| converter(item, None))
    }

    fn on_changed(
        &mut self,
        _upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::Add { index, item } => {
                let value = (self.converter)(item, None);
                self.slots.insert(*index, item.clone(), value.clone());
                sink.add(*index, value);
            }
            CollectionChange::Remove { index, .. } => {
                let value = self.slots.remove(*index);
                sink.remove(*index, value);
            }
            CollectionChange::Replace { index, new_item, .. } => {
                let (previous, value) = self.reconvert(*index, new_item);
                self.slots.sources[*index] = new_item.clone();
                self.slots.values[*index] = value.clone();
                sink.replace(*index, previous, value);
            }
            CollectionChange::Move {
                old_index,
                new_index,
                ..
            } => {
                let value = self.slots.move_slot(*old_index, *new_index);
                sink.move_item(*old_index, *new_index, value);
            }
            CollectionChange::ItemChanged { index, item, args } => {
                let (_, value) = self.reconvert(*index, item);
                self.slots.sources[*index] = item.clone();
                self.slots.values[*index] = value.clone();
                sink.item_changed(*index, value, args.clone());
            }
            CollectionChange::Reset { .. } => {}
        }
    }

    fn on_detached(&mut self) {
        self.slots.release_all();
    }
}

/// Builder for [`ConvertDecorator`].
pub struct ConvertDecoratorBuilder<T> {
    converter: Option<ConvertFn<T>>,
    cleanup: Option<CleanupFn<T>>,
    priority: i32,
}

impl<T> Default for ConvertDecoratorBuilder<T> {
    fn default() -> Self {
        Self {
            converter: None,
            cleanup: None,
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl<T: Item> ConvertDecoratorBuilder<T> {
    pub fn converter<F>(mut self, converter: F) -> Self
    where
        F: Fn(&T, Option<&T>) -> T + Send + Sync + 'static,
    {
        self.converter = Some(Arc::new(converter));
        self
    }

    pub fn cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(cleanup));
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Fails with [`CollectionError::MissingCallback`] when no converter was
    /// given.
    pub fn build(self) -> Result<ConvertDecorator<T>> {
        let converter = self.converter.ok_or(CollectionError::MissingCallback("converter"))?;
        Ok(ConvertDecorator {
            converter,
            slots: Converted::new(self.cleanup),
            priority: self.priority,
        })
    }
}

/// Projects every upstream item once.
///
/// Item-changed events keep the existing value and are passed on with it;
/// only a replace converts again. Runs at [`CONVERT_IMMUTABLE_PRIORITY`] by
/// default.
pub struct ConvertImmutableDecorator<T> {
    converter: Arc<dyn Fn(&T) -> T + Send + Sync>,
    slots: Converted<T>,
    priority: i32,
}

impl<T: Item> ConvertImmutableDecorator<T> {
    pub fn new<F>(converter: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        Self {
            converter: Arc::new(converter),
            slots: Converted::new(None),
            priority: CONVERT_IMMUTABLE_PRIORITY,
        }
    }

    pub fn with_cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.slots.cleanup = Some(Arc::new(cleanup));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<T: Item> CollectionDecorator<T> for ConvertImmutableDecorator<T> {
    fn name(&self) -> &'static str {
        "convert_immutable"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        let converter = Arc::clone(&self.converter);
        self.slots.rebuild(upstream, |item| converter(item))
    }

    fn on_changed(
        &mut self,
        _upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::Add { index, item } => {
                let value = (self.converter)(item);
                self.slots.insert(*index, item.clone(), value.clone());
                sink.add(*index, value);
            }
            CollectionChange::Remove { index, .. } => {
                let value = self.slots.remove(*index);
                sink.remove(*index, value);
            }
            CollectionChange::Replace { index, new_item, .. } => {
                let value = (self.converter)(new_item);
                let previous = std::mem::replace(&mut self.slots.values[*index], value.clone());
                self.slots.sources[*index] = new_item.clone();
                self.slots.release_replaced(&previous, &value);
                sink.replace(*index, previous, value);
            }
            CollectionChange::Move {
                old_index,
                new_index,
                ..
            } => {
                let value = self.slots.move_slot(*old_index, *new_index);
                sink.move_item(*old_index, *new_index, value);
            }
            CollectionChange::ItemChanged { index, item, args } => {
                self.slots.sources[*index] = item.clone();
                sink.item_changed(*index, self.slots.values[*index].clone(), args.clone());
            }
            CollectionChange::Reset { .. } => {}
        }
    }

    fn on_detached(&mut self) {
        self.slots.release_all();
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<i32>>>, impl Fn(&i32) + Send + Sync + 'static) {
        let cleaned = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&cleaned);
        (cleaned, move |value: &i32| log.lock().push(*value))
    }

    #[test]
    fn test_builder_requires_converter() {
        let result = ConvertDecorator::<i32>::builder().priority(3).build();
        assert!(matches!(result, Err(CollectionError::MissingCallback("converter"))));
    }

    #[test]
    fn test_cleanup_once_per_leaving_value() {
        let (cleaned, cleanup) = recorder();
        let mut convert = ConvertDecorator::builder()
            .converter(|n: &i32, _: Option<&i32>| n * 10)
            .cleanup(cleanup)
            .build()
            .unwrap();
        assert_eq!(convert.decorate(&[1, 2, 3]), vec![10, 20, 30]);

        let mut sink = ChangeSink::new();
        convert.on_changed(&[1, 3], &CollectionChange::Remove { index: 1, item: 2 }, &mut sink);
        convert.on_changed(
            &[4, 3],
            &CollectionChange::Replace { index: 0, old_item: 1, new_item: 4 },
            &mut sink,
        );
        assert_eq!(
            sink.events(),
            &[
                CollectionChange::Remove { index: 1, item: 20 },
                CollectionChange::Replace { index: 0, old_item: 10, new_item: 40 },
            ]
        );
        assert_eq!(*cleaned.lock(), vec![20, 10]);

        convert.on_detached();
        assert_eq!(*cleaned.lock(), vec![20, 10, 40, 30]);
    }

    #[test]
    fn test_reused_value_is_not_cleaned() {
        let (cleaned, cleanup) = recorder();
        let mut convert = ConvertDecorator::builder()
            .converter(|n: &i32, previous: Option<&i32>| previous.copied().unwrap_or(n * 10))
            .cleanup(cleanup)
            .build()
            .unwrap();
        convert.decorate(&[1]);

        let mut sink = ChangeSink::new();
        let change = CollectionChange::ItemChanged { index: 0, item: 1, args: None };
        convert.on_changed(&[1], &change, &mut sink);
        assert!(cleaned.lock().is_empty());
        assert_eq!(convert.values(), &[10]);
    }

    #[test]
    fn test_rebuild_reuses_equal_items() {
        let (cleaned, cleanup) = recorder();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut convert = ConvertDecorator::builder()
            .converter(move |n: &i32, _: Option<&i32>| {
                *counter.lock() += 1;
                n * 10
            })
            .cleanup(cleanup)
            .build()
            .unwrap();

        convert.decorate(&[1, 2]);
        assert_eq!(convert.decorate(&[2, 5]), vec![20, 50]);
        assert_eq!(*calls.lock(), 3);
        assert_eq!(*cleaned.lock(), vec![10]);
    }

    #[test]
    fn test_immutable_keeps_value_on_change() {
        let mut convert = ConvertImmutableDecorator::new(|n: &i32| n + 100);
        assert_eq!(convert.priority(), CONVERT_IMMUTABLE_PRIORITY);
        convert.decorate(&[1]);

        let mut sink = ChangeSink::new();
        let change = CollectionChange::ItemChanged { index: 0, item: 2, args: None };
        convert.on_changed(&[2], &change, &mut sink);
        assert_eq!(
            sink.events(),
            &[CollectionChange::ItemChanged { index: 0, item: 101, args: None }]
        );

        let mut sink = ChangeSink::new();
        convert.on_changed(
            &[3],
            &CollectionChange::Replace { index: 0, old_item: 2, new_item: 3 },
            &mut sink,
        );
        assert_eq!(
            sink.events(),
            &[CollectionChange::Replace { index: 0, old_item: 101, new_item: 103 }]
        );
    }
}
