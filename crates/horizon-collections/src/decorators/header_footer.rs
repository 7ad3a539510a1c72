//! Items pinned to the start and end of the view.

use std::sync::Arc;

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, Item, DEFAULT_PRIORITY};

use super::order::SortedIndex;
use super::Comparer;

/// Wraps the upstream view in fixed header and footer items.
///
/// # Example
///
/// ```
/// use horizon_collections::ObservableList;
/// use horizon_collections::decorators::HeaderFooterDecorator;
///
/// let list = ObservableList::from_vec(vec![1, 2]);
/// list.add_decorator(HeaderFooterDecorator::new(vec![0], vec![9])).unwrap();
/// assert_eq!(list.decorated_items(), vec![0, 1, 2, 9]);
/// ```
#[derive(Debug, Clone)]
pub struct HeaderFooterDecorator<T> {
    headers: Vec<T>,
    footers: Vec<T>,
    priority: i32,
}

impl<T: Item> HeaderFooterDecorator<T> {
    pub fn new(headers: Vec<T>, footers: Vec<T>) -> Self {
        Self {
            headers,
            footers,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn headers(&self) -> &[T] {
        &self.headers
    }

    pub fn footers(&self) -> &[T] {
        &self.footers
    }

    pub fn set_headers(&mut self, headers: Vec<T>) {
        self.headers = headers;
    }

    pub fn set_footers(&mut self, footers: Vec<T>) {
        self.footers = footers;
    }
}

impl<T: Item> CollectionDecorator<T> for HeaderFooterDecorator<T> {
    fn name(&self) -> &'static str {
        "header_footer"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        let mut output =
            Vec::with_capacity(self.headers.len() + upstream.len() + self.footers.len());
        output.extend(self.headers.iter().cloned());
        output.extend(upstream.iter().cloned());
        output.extend(self.footers.iter().cloned());
        output
    }

    fn on_changed(
        &mut self,
        _upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        let offset = self.headers.len();
        match change {
            CollectionChange::Add { index, item } => sink.add(offset + index, item.clone()),
            CollectionChange::Remove { index, item } => sink.remove(offset + index, item.clone()),
            CollectionChange::Replace {
                index,
                old_item,
                new_item,
            } => sink.replace(offset + index, old_item.clone(), new_item.clone()),
            CollectionChange::Move {
                old_index,
                new_index,
                item,
            } => sink.move_item(offset + old_index, offset + new_index, item.clone()),
            CollectionChange::ItemChanged { index, item, args } => {
                sink.item_changed(offset + index, item.clone(), args.clone())
            }
            CollectionChange::Reset { .. } => {}
        }
    }
}

/// Section an upstream item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemPlacement {
    Header,
    #[default]
    Body,
    Footer,
}

/// Type alias for a placement classifier.
pub type PlacementFn<T> = Arc<dyn Fn(&T) -> ItemPlacement + Send + Sync>;

/// Pins classified upstream items to the start or end of the view.
///
/// Header items come first, ordered by the header comparer, then body items
/// in upstream order, then footer items ordered by the footer comparer. Ties
/// keep upstream order. The classifier runs again on item-changed events and
/// an item that changes section is removed and added again.
pub struct ItemHeaderFooterDecorator<T> {
    classify: PlacementFn<T>,
    header_order: Comparer<T>,
    footer_order: Comparer<T>,
    placements: Vec<ItemPlacement>,
    headers: SortedIndex,
    footers: SortedIndex,
    priority: i32,
}

impl<T: Item> ItemHeaderFooterDecorator<T> {
    pub fn new<F>(classify: F) -> Self
    where
        F: Fn(&T) -> ItemPlacement + Send + Sync + 'static,
    {
        Self {
            classify: Arc::new(classify),
            header_order: Comparer::Identity,
            footer_order: Comparer::Identity,
            placements: Vec::new(),
            headers: SortedIndex::default(),
            footers: SortedIndex::default(),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_header_comparer(mut self, comparer: Comparer<T>) -> Self {
        self.header_order = comparer;
        self
    }

    pub fn with_footer_comparer(mut self, comparer: Comparer<T>) -> Self {
        self.footer_order = comparer;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn set_header_comparer(&mut self, comparer: Comparer<T>) {
        self.header_order = comparer;
    }

    pub fn set_footer_comparer(&mut self, comparer: Comparer<T>) {
        self.footer_order = comparer;
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    pub fn footer_count(&self) -> usize {
        self.footers.len()
    }

    fn body_count(&self) -> usize {
        self.body_rank(self.placements.len())
    }

    fn body_rank(&self, index: usize) -> usize {
        self.placements[..index]
            .iter()
            .filter(|p| **p == ItemPlacement::Body)
            .count()
    }

    /// Take slot `index` out of its section and return its output position.
    /// The placement entry itself is left alone.
    fn detach_slot(&mut self, index: usize) -> usize {
        let (headers, body) = (self.headers.len(), self.body_count());
        match self.placements[index] {
            ItemPlacement::Header => self.headers.remove(index).unwrap_or(0),
            ItemPlacement::Body => headers + self.body_rank(index),
            ItemPlacement::Footer => headers + body + self.footers.remove(index).unwrap_or(0),
        }
    }

    /// Put slot `index` into the section its placement names and return its
    /// output position.
    fn attach_slot(&mut self, upstream: &[T], index: usize) -> usize {
        match self.placements[index] {
            ItemPlacement::Header => self.headers.insert(upstream, &self.header_order, index),
            ItemPlacement::Body => self.headers.len() + self.body_rank(index),
            ItemPlacement::Footer => {
                let base = self.headers.len() + self.body_count();
                base + self.footers.insert(upstream, &self.footer_order, index)
            }
        }
    }

    fn shift_moved(&mut self, old_index: usize, new_index: usize) {
        let placement = self.placements.remove(old_index);
        self.placements.insert(new_index, placement);
        self.headers.shift_moved(old_index, new_index);
        self.footers.shift_moved(old_index, new_index);
    }

    /// Re-place slot `index` after its item changed. `on_kept` receives the
    /// output position when the slot stays in its section.
    fn reevaluate(
        &mut self,
        upstream: &[T],
        index: usize,
        old_item: &T,
        sink: &mut ChangeSink<T>,
        on_kept: impl FnOnce(usize, usize, &mut ChangeSink<T>),
    ) {
        let placement = (self.classify)(&upstream[index]);
        let old_pos = self.detach_slot(index);
        if placement == self.placements[index] {
            let new_pos = self.attach_slot(upstream, index);
            on_kept(old_pos, new_pos, sink);
        } else {
            sink.remove(old_pos, old_item.clone());
            self.placements[index] = placement;
            let new_pos = self.attach_slot(upstream, index);
            sink.add(new_pos, upstream[index].clone());
        }
    }
}

impl<T: Item> CollectionDecorator<T> for ItemHeaderFooterDecorator<T> {
    fn name(&self) -> &'static str {
        "item_header_footer"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.placements = upstream.iter().map(|item| (self.classify)(item)).collect();
        let members = |wanted: ItemPlacement| {
            self.placements
                .iter()
                .enumerate()
                .filter(move |(_, p)| **p == wanted)
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        };
        let header_members = members(ItemPlacement::Header);
        let footer_members = members(ItemPlacement::Footer);
        self.headers.rebuild(upstream, &self.header_order, header_members);
        self.footers.rebuild(upstream, &self.footer_order, footer_members);

        let mut output = Vec::with_capacity(upstream.len());
        output.extend(self.headers.as_slice().iter().map(|&i| upstream[i].clone()));
        output.extend(
            upstream
                .iter()
                .zip(&self.placements)
                .filter(|(_, p)| **p == ItemPlacement::Body)
                .map(|(item, _)| item.clone()),
        );
        output.extend(self.footers.as_slice().iter().map(|&i| upstream[i].clone()));
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
                self.placements.insert(*index, (self.classify)(item));
                self.headers.shift_inserted(*index);
                self.footers.shift_inserted(*index);
                let pos = self.attach_slot(upstream, *index);
                sink.add(pos, item.clone());
            }
            CollectionChange::Remove { index, item } => {
                let pos = self.detach_slot(*index);
                self.placements.remove(*index);
                self.headers.shift_removed(*index);
                self.footers.shift_removed(*index);
                sink.remove(pos, item.clone());
            }
            CollectionChange::Replace {
                index,
                old_item,
                new_item,
            } => {
                self.reevaluate(upstream, *index, old_item, sink, |old_pos, new_pos, sink| {
                    sink.replace(old_pos, old_item.clone(), new_item.clone());
                    sink.move_item(old_pos, new_pos, new_item.clone());
                });
            }
            CollectionChange::Move {
                old_index,
                new_index,
                item,
            } => {
                let old_pos = self.detach_slot(*old_index);
                self.shift_moved(*old_index, *new_index);
                let new_pos = self.attach_slot(upstream, *new_index);
                sink.move_item(old_pos, new_pos, item.clone());
            }
            CollectionChange::ItemChanged { index, item, args } => {
                self.reevaluate(upstream, *index, item, sink, |old_pos, new_pos, sink| {
                    sink.move_item(old_pos, new_pos, item.clone());
                    sink.item_changed(new_pos, item.clone(), args.clone());
                });
            }
            CollectionChange::Reset { .. } => {}
        }
    }
}
