//! Signal/slot fan-out for Horizon Collections.
//!
//! Collections and batch managers announce changes through [`Signal`]s. Each
//! connected slot is a closure that is invoked synchronously, on the emitting
//! thread, every time the signal is emitted.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII handle that disconnects when dropped
//!
//! # Re-entrancy
//!
//! The connection table is snapshotted before slots run, so a slot may connect
//! or disconnect (including itself) while the signal is being emitted. Slots
//! connected during an emission are first invoked by the next emission.
//!
//! # Example
//!
//! ```
//! use horizon_collections_core::Signal;
//!
//! let count_changed = Signal::<usize>::new();
//!
//! let conn_id = count_changed.connect(|count| {
//!     println!("Count changed to: {}", count);
//! });
//!
//! count_changed.emit(&3);
//! count_changed.disconnect(conn_id);
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    ///
    /// # Related
    ///
    /// - [`Signal::connect`] - Returns a `ConnectionId`
    /// - [`Signal::disconnect`] - Removes a connection by ID
    /// - [`ConnectionGuard`] - RAII alternative that auto-disconnects
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// When a signal is emitted, all connected slots are invoked in connection
/// order with a reference to the emitted arguments.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple for multiple arguments.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync`. Slots run on whichever thread calls
/// [`emit`](Self::emit); marshalling to another thread is the caller's concern.
pub struct Signal<Args> {
    /// All active connections.
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    ///
    /// # Example
    ///
    /// ```
    /// use horizon_collections_core::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let id = signal.connect(|s| println!("Got: {}", s));
    /// signal.emit(&"Hello".to_string());
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }



    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Emit the signal, invoking all connected slots.
    ///
    /// The connection lock is not held while slots run.
    #[tracing::instrument(skip_all, target = "horizon_collections_core::signal", level = "trace")]
    pub fn emit(&self, args: &Args) {
        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(args);
        }
    }
}

/// A connection guard that automatically disconnects when dropped.
///
/// The guard holds a weak reference to its signal, so it never keeps the
/// signal alive and dropping it after the signal is gone is a no-op. Created
/// via [`Signal::connect_scoped`].
///
/// # Example
///
/// ```
/// use horizon_collections_core::Signal;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let signal = Arc::new(Signal::<i32>::new());
/// let counter = Arc::new(AtomicI32::new(0));
/// {
///     let counter_clone = counter.clone();
///     let _guard = signal.connect_scoped(move |&n| {
///         counter_clone.fetch_add(n, Ordering::SeqCst);
///     });
///     signal.emit(&42);  // counter = 42
/// }
/// signal.emit(&43);  // Nothing happens - connection was dropped
/// assert_eq!(counter.load(Ordering::SeqCst), 42);
/// ```
pub struct ConnectionGuard<Args: 'static> {
    signal: Weak<Signal<Args>>,
    id: Option<ConnectionId>,
}

impl<Args: 'static> Signal<Args> {
    /// Connect a slot with automatic disconnection when the guard is dropped.
    pub fn connect_scoped<F>(self: &Arc<Self>, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            signal: Arc::downgrade(self),
            id: Some(id),
        }
    }
}

impl<Args: 'static> ConnectionGuard<Args> {


    /// Returns `true` while the signal exists and the connection is still owned.
    pub fn is_connected(&self) -> bool {
        self.id.is_some() && self.signal.strong_count() > 0
    }

    /// Disconnect now instead of waiting for the guard to drop.
    ///
    /// Returns `true` if a live connection was removed.
    pub fn disconnect(&mut self) -> bool {
        match (self.id.take(), self.signal.upgrade()) {
            (Some(id), Some(signal)) => signal.disconnect(id),
            _ => false,
        }
    }
}

impl<Args: 'static> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

static_assertions::assert_impl_all!(Signal<u32>: Send, Sync);
static_assertions::assert_impl_all!(ConnectionGuard<u32>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_signal_connect_emit() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(&42);
        signal.emit(&100);

        let values = received.lock();
        assert_eq!(*values, vec![42, 100]);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        let conn_id = signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(&1);
        assert!(signal.disconnect(conn_id));
        assert!(!signal.disconnect(conn_id));
        signal.emit(&2);

        assert_eq!(*received.lock(), vec![1]);
    }



    #[test]
    fn test_slots_run_in_connection_order() {
        let signal = Signal::<()>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            signal.connect(move |_| order.lock().push(n));
        }

        assert_eq!(signal.connection_count(), 3);
        signal.emit(&());
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }



    #[test]
    fn test_connection_guard() {
        let signal = Arc::new(Signal::<i32>::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        {
            let received_clone = received.clone();
            let guard = signal.connect_scoped(move |&value| {
                received_clone.lock().push(value);
            });
            assert!(guard.is_connected());
            signal.emit(&1);
        }

        signal.emit(&2);

        assert_eq!(*received.lock(), vec![1]);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_guard_outlives_signal() {
        let signal = Arc::new(Signal::<i32>::new());
        let mut guard = signal.connect_scoped(|_| {});
        drop(signal);

        assert!(!guard.is_connected());
        assert!(!guard.disconnect());
    }



    #[test]
    fn test_slot_can_disconnect_itself() {
        let signal = Arc::new(Signal::<i32>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let signal_clone = Arc::downgrade(&signal);
        let hits_clone = hits.clone();
        let own_id_clone = own_id.clone();
        let id = signal.connect(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            if let (Some(signal), Some(id)) = (signal_clone.upgrade(), *own_id_clone.lock()) {
                signal.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        signal.emit(&1);
        signal.emit(&2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_from_multiple_threads() {
        let signal = Arc::new(Signal::<usize>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = counter.clone();
        signal.connect(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut handles = vec![];
        for _ in 0..8 {
            let signal_clone = signal.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    signal_clone.emit(&i);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 400);
    }
}
