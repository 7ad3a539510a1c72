//! Concrete decorators.
//!
//! | Decorator | Effect on the decorated view |
//! |-----------|------------------------------|
//! | [`FilterDecorator`] | Hides items failing a predicate |
//! | [`SortDecorator`] | Orders items, repositioning only the affected item |
//! | [`SortingDecorator`] | Orders items, with an explicit full stable reorder |
//! | [`DistinctDecorator`] | Keeps the first item of each key |
//! | [`LimitDecorator`] | Caps how many matching items are visible |
//! | [`GroupDecorator`] | Adds one header per group, with group callbacks |
//! | [`GroupHeaderDecorator`] | Adds one header per group, keys fixed at insertion |
//! | [`FlattenDecorator`] | Inlines nested observable lists |
//! | [`ConvertDecorator`] | Projects items, reusing and cleaning up values |
//! | [`ConvertImmutableDecorator`] | Projects items once, ahead of other stages |
//! | [`HeaderFooterDecorator`] | Pins fixed items around the view |
//! | [`ItemHeaderFooterDecorator`] | Pins classified items to the start or end |
//! | [`TrackerDecorator`] | Folds changes into external state |
//! | [`FirstLastTrackerDecorator`] | Tracks the first or last matching item |
//!
//! Predicates and comparers have explicit identity variants
//! ([`ItemFilter::All`], [`Comparer::Identity`]) instead of optional callbacks.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

mod convert;
mod distinct;
mod filter;
mod first_last;
mod flatten;
mod group;
mod header_footer;
mod limit;
pub(crate) mod mask;
pub(crate) mod order;
mod sort;
mod tracker;

pub use convert::{
    ConvertDecorator, ConvertDecoratorBuilder, ConvertImmutableDecorator,
    CONVERT_IMMUTABLE_PRIORITY,
};
pub use distinct::DistinctDecorator;
pub use filter::FilterDecorator;
pub use first_last::{FirstLastTrackerDecorator, TrackPosition};
pub use flatten::{FlattenDecorator, NestedChanged};
pub use group::{GroupChange, GroupDecorator, GroupHeaderDecorator};
pub use header_footer::{HeaderFooterDecorator, ItemHeaderFooterDecorator, ItemPlacement};
pub use limit::LimitDecorator;
pub use sort::{Reorder, SortDecorator, SortingDecorator};
pub use tracker::{TrackerDecorator, TrackerState};

/// Type alias for a predicate function.
pub type PredicateFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Type alias for a key extractor.
pub type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Type alias for a compare function.
pub type CompareFn<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// An item predicate with an explicit pass-everything variant.
pub enum ItemFilter<T> {
    /// Every item matches.
    All,
    /// Items for which the predicate returns `true` match.
    Where(PredicateFn<T>),
}

impl<T> ItemFilter<T> {
    /// Wrap a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::Where(Arc::new(predicate))
    }

    pub fn matches(&self, item: &T) -> bool {
        match self {
            Self::All => true,
            Self::Where(predicate) => predicate(item),
        }
    }

    /// Returns `true` for [`ItemFilter::All`].
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl<T> Clone for ItemFilter<T> {
    fn clone(&self) -> Self {
        match self {
            Self::All => Self::All,
            Self::Where(predicate) => Self::Where(Arc::clone(predicate)),
        }
    }
}

impl<T> Default for ItemFilter<T> {
    fn default() -> Self {
        Self::All
    }
}

impl<T> fmt::Debug for ItemFilter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("ItemFilter::All"),
            Self::Where(_) => f.write_str("ItemFilter::Where(..)"),
        }
    }
}

/// An item ordering with an explicit keep-upstream-order variant.
///
/// Decorators break ties by upstream position, so [`Comparer::Identity`]
/// (everything compares equal) preserves the upstream order.
pub enum Comparer<T> {
    /// All items compare equal.
    Identity,
    /// Items are ordered by the function.
    By(CompareFn<T>),
}

impl<T: 'static> Comparer<T> {
    /// Wrap a compare function.
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self::By(Arc::new(compare))
    }

    /// Order by a key extracted from each item.
    pub fn by_key<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::new(move |a, b| key(a).cmp(&key(b)))
    }

    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        match self {
            Self::Identity => Ordering::Equal,
            Self::By(compare) => compare(a, b),
        }
    }

    /// The same ordering, reversed. Identity stays identity.
    pub fn reversed(self) -> Self {
        match self {
            Self::Identity => Self::Identity,
            Self::By(compare) => Self::By(Arc::new(move |a, b| compare(b, a))),
        }
    }

    /// Returns `true` for [`Comparer::Identity`].
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }
}

impl<T: Ord + 'static> Comparer<T> {
    /// The natural order of `T`.
    pub fn natural() -> Self {
        Self::new(|a: &T, b: &T| a.cmp(b))
    }

    /// The reverse of the natural order of `T`.
    pub fn descending() -> Self {
        Self::natural().reversed()
    }
}

impl<T> Clone for Comparer<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Identity => Self::Identity,
            Self::By(compare) => Self::By(Arc::clone(compare)),
        }
    }
}

impl<T> Default for Comparer<T> {
    fn default() -> Self {
        Self::Identity
    }
}

impl<T> fmt::Debug for Comparer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("Comparer::Identity"),
            Self::By(_) => f.write_str("Comparer::By(..)"),
        }
    }
}
