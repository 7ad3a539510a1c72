//! Observable values for Horizon Collections.
//!
//! A [`Property<T>`] is a lock-protected value paired with a change signal.
//! Aggregating decorators publish their running results through properties so
//! that consumers can either poll the current value or connect to
//! [`Property::changed`].
//!
//! # Example
//!
//! ```
//! use horizon_collections_core::Property;
//!
//! let total = Property::new(0i64);
//! let _id = total.changed().connect(|value| println!("total is now {value}"));
//!
//! total.update(|sum| *sum += 5);
//! assert_eq!(total.get(), 5);
//!
//! // Setting the same value does not notify.
//! assert!(!total.set(5));
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::signal::Signal;

/// A reactive value that tracks changes.
///
/// `set()` compares the new value with the current one and only notifies when
/// it differs. `update()` always notifies, since the closure may have mutated
/// the value in place.
///
/// # Thread Safety
///
/// `Property<T>` uses interior mutability with `RwLock` and is `Send + Sync`
/// whenever `T` is. The lock is released before the change signal fires.
pub struct Property<T: 'static> {
    value: RwLock<T>,
    changed: Arc<Signal<T>>,
}

impl<T: Clone + 'static> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
            changed: Arc::new(Signal::new()),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Mutate the value in place and notify listeners with the result.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let (result, snapshot) = {
            let mut value = self.value.write();
            let result = f(&mut value);
            (result, value.clone())
        };
        self.changed.emit(&snapshot);
        result
    }

    /// The signal emitted with the new value after every notifying change.
    pub fn changed(&self) -> &Arc<Signal<T>> {
        &self.changed
    }
}

impl<T: Clone + PartialEq + 'static> Property<T> {
    /// Set the value, returning `true` if the value changed.
    ///
    /// Listeners are notified only when the value actually changed.
    pub fn set(&self, value: T) -> bool {
        self.replace(value).is_some()
    }

    /// Set the value, returning the old value if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let old = {
            let mut current = self.value.write();
            if *current == value {
                return None;
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.changed.emit(&value);
        Some(old)
    }
}

impl<T: Clone + Default + 'static> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .field("listeners", &self.changed.connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_property_basic() {
        let prop = Property::new(42);
        assert_eq!(prop.get(), 42);
    }

    #[test]
    fn test_property_set_detects_change() {
        let prop = Property::new(10);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        prop.changed().connect(move |&v| seen_clone.lock().push(v));

        assert!(!prop.set(10));
        assert!(prop.set(20));
        assert_eq!(prop.get(), 20);
        assert_eq!(*seen.lock(), vec![20]);
    }



    #[test]
    fn test_property_replace() {
        let prop = Property::new("hello".to_string());

        assert!(prop.replace("hello".to_string()).is_none());
        assert_eq!(prop.replace("world".to_string()), Some("hello".to_string()));
        assert_eq!(prop.get(), "world");
    }

    #[test]
    fn test_property_update_notifies() {
        let prop = Property::new(vec![1, 2]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        prop.changed().connect(move |v: &Vec<i32>| seen_clone.lock().push(v.len()));

        let len = prop.update(|v| {
            v.push(3);
            v.len()
        });
        assert_eq!(len, 3);
        assert_eq!(prop.get(), vec![1, 2, 3]);
        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn test_listener_can_read_property() {
        let prop = Arc::new(Property::new(1));
        let observed = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&prop);
        let observed_clone = observed.clone();
        prop.changed().connect(move |_| {
            if let Some(prop) = weak.upgrade() {
                *observed_clone.lock() = Some(prop.get());
            }
        });

        prop.set(7);
        assert_eq!(*observed.lock(), Some(7));
    }

    #[test]
    fn test_property_default() {
        let prop: Property<i32> = Property::default();
        assert_eq!(prop.get(), 0);
    }
}
