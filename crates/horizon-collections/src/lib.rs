//! Horizon Collections - observable lists with a composable decorator pipeline.
//!
//! An [`ObservableList`] owns a raw sequence of items. Attaching decorators
//! builds a *decorated view*: the raw items fed through every decorator in
//! priority order. Every raw mutation is translated stage by stage into the
//! minimal changes of the decorated view, so listeners can keep a mirror in
//! sync without rescanning.
//!
//! # Example
//!
//! ```
//! use horizon_collections::prelude::*;
//! use horizon_collections::decorators::{Comparer, FilterDecorator, SortingDecorator};
//!
//! let list = ObservableList::from_vec(vec![1, 2, 3, 4]);
//! list.add_decorator(FilterDecorator::new(|n: &i32| n % 2 == 0)).unwrap();
//! list.add_decorator(SortingDecorator::new(Comparer::<i32>::descending())).unwrap();
//! assert_eq!(list.decorated_items(), vec![4, 2]);
//!
//! let _guard = list.add_decorated_listener(|change| println!("{}", change.kind()));
//! list.remove(&2).unwrap();
//! list.push(6).unwrap();
//! assert_eq!(list.decorated_items(), vec![6, 4]);
//! ```
//!
//! # Batches
//!
//! ```
//! use horizon_collections::{BatchUpdateType, ObservableList};
//!
//! let list = ObservableList::from_vec(vec![1]);
//! {
//!     let _batch = list.begin_batch(BatchUpdateType::Source);
//!     list.push(2).unwrap();
//!     list.push(3).unwrap();
//! }
//! assert!(!list.is_batch_active(BatchUpdateType::Source));
//! ```

mod change;
mod decorator;
pub mod decorators;
mod error;
mod list;
mod manager;
pub mod prelude;

pub use change::CollectionChange;
pub use decorator::{
    ChangeSink, CollectionDecorator, DecoratorHost, DecoratorId, IndexQuery, Item, DEFAULT_PRIORITY,
};
pub use error::{CollectionError, Result};
pub use list::{ListConfig, ListenerGuard, ObservableList};
pub use manager::DecoratorManager;

pub use horizon_collections_core::{BatchToken, BatchUpdateType, Property};
