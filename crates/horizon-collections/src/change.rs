//! Change events describing one mutation of an ordered sequence.
//!
//! The same vocabulary is used on both sides of the decorator pipeline: raw
//! collections report their mutations with it, and every decorator translates
//! the events it receives into events against its own output.
//!
//! # Index conventions
//!
//! - `Add.index` is the position of the new item *after* the insertion.
//! - `Remove.index` is the position of the item *before* the removal.
//! - `Move` is remove-then-insert: the item is taken out at `old_index`, then
//!   inserted so that it ends up at `new_index`.

use std::sync::Arc;

use crate::error::{CollectionError, Result};

/// A single change to an ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange<T> {
    /// An item was inserted.
    Add {
        /// Position of the item after insertion.
        index: usize,
        /// The inserted item.
        item: T,
    },
    /// An item was removed.
    Remove {
        /// Position of the item before removal.
        index: usize,
        /// The removed item.
        item: T,
    },
    /// An item was replaced in place.
    Replace {
        /// Position of the replaced item.
        index: usize,
        /// The previous item.
        old_item: T,
        /// The new item.
        new_item: T,
    },
    /// An item was moved.
    Move {
        /// Position before the move.
        old_index: usize,
        /// Position after the move.
        new_index: usize,
        /// The moved item.
        item: T,
    },
    /// The whole sequence was replaced.
    Reset {
        /// The new contents.
        items: Vec<T>,
    },
    /// An item's content changed without a structural change.
    ItemChanged {
        /// Position of the changed occurrence.
        index: usize,
        /// The item, as it is now.
        item: T,
        /// Name of the changed property, when known.
        args: Option<Arc<str>>,
    },
}

impl<T> CollectionChange<T> {
    /// Returns `true` for [`CollectionChange::Reset`].
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset { .. })
    }

    /// A short name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
            Self::Reset { .. } => "reset",
            Self::ItemChanged { .. } => "item_changed",
        }
    }
}

impl<T: Clone> CollectionChange<T> {
    /// Apply this change to a materialized sequence.
    ///
    /// Fails without modifying `items` when an index is impossible for the
    /// current length.
    pub fn apply_to(&self, items: &mut Vec<T>) -> Result<()> {
        let len = items.len();
        let check = |index: usize, bound: usize| {
            if index < bound {
                Ok(())
            } else {
                Err(CollectionError::IndexOutOfRange { index, len })
            }
        };

        match self {
            Self::Add { index, item } => {
                check(*index, len + 1)?;
                items.insert(*index, item.clone());
            }
            Self::Remove { index, .. } => {
                check(*index, len)?;
                items.remove(*index);
            }
            Self::Replace {
                index, new_item, ..
            } => {
                check(*index, len)?;
                items[*index] = new_item.clone();
            }
            Self::Move {
                old_index,
                new_index,
                ..
            } => {
                check(*old_index, len)?;
                check(*new_index, len)?;
                let moved = items.remove(*old_index);
                items.insert(*new_index, moved);
            }
            Self::Reset { items: new_items } => {
                items.clone_from(new_items);
            }
            Self::ItemChanged { index, item, .. } => {
                check(*index, len)?;
                items[*index] = item.clone();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_add_remove() {
        let mut items = vec![1, 2, 3];
        CollectionChange::Add { index: 3, item: 4 }
            .apply_to(&mut items)
            .unwrap();
        CollectionChange::Remove { index: 0, item: 1 }
            .apply_to(&mut items)
            .unwrap();
        assert_eq!(items, vec![2, 3, 4]);
    }

    #[test]
    fn test_apply_move_is_remove_then_insert() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        CollectionChange::Move {
            old_index: 0,
            new_index: 3,
            item: 'a',
        }
        .apply_to(&mut items)
        .unwrap();
        assert_eq!(items, vec!['b', 'c', 'd', 'a']);

        CollectionChange::Move {
            old_index: 3,
            new_index: 1,
            item: 'a',
        }
        .apply_to(&mut items)
        .unwrap();
        assert_eq!(items, vec!['b', 'a', 'c', 'd']);
    }

    #[test]
    fn test_apply_replace_reset_item_changed() {
        let mut items = vec![1, 2];
        CollectionChange::Replace {
            index: 1,
            old_item: 2,
            new_item: 20,
        }
        .apply_to(&mut items)
        .unwrap();
        CollectionChange::ItemChanged {
            index: 0,
            item: 10,
            args: Some(Arc::from("value")),
        }
        .apply_to(&mut items)
        .unwrap();
        assert_eq!(items, vec![10, 20]);

        CollectionChange::Reset { items: vec![7] }
            .apply_to(&mut items)
            .unwrap();
        assert_eq!(items, vec![7]);
    }

    #[test]
    fn test_apply_rejects_bad_index() {
        let mut items = vec![1];
        let err = CollectionChange::Add { index: 3, item: 9 }
            .apply_to(&mut items)
            .unwrap_err();
        assert_eq!(err, CollectionError::IndexOutOfRange { index: 3, len: 1 });

        let err = CollectionChange::Move {
            old_index: 0,
            new_index: 1,
            item: 1,
        }
        .apply_to(&mut items)
        .unwrap_err();
        assert_eq!(err, CollectionError::IndexOutOfRange { index: 1, len: 1 });
        assert_eq!(items, vec![1]);
    }

    #[test]
    fn test_kind_names() {
        let change: CollectionChange<i32> = CollectionChange::Reset { items: vec![] };
        assert!(change.is_reset());
        assert_eq!(change.kind(), "reset");
    }
}
