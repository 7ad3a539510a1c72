//! Core systems for Horizon Collections.
//!
//! This crate provides the building blocks the collection pipeline is made of:
//!
//! - **Signal/Slot System**: Type-safe change fan-out with RAII connection guards
//! - **Property System**: Observable values with change notification
//! - **Batch Scopes**: Reference-counted begin/end pairs per batch type
//! - **Logging**: Tracing targets and a decorator chain formatter
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_collections_core::Signal;
//!
//! // Create a signal that notifies when a value changes
//! let value_changed = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(&42);
//! value_changed.disconnect(conn_id);
//! ```
//!
//! # Batch Example
//!
//! ```
//! use horizon_collections_core::{BatchUpdateManager, BatchUpdateType};
//!
//! let batches = BatchUpdateManager::new();
//! assert!(batches.begin(BatchUpdateType::Source));
//! assert!(!batches.begin(BatchUpdateType::Source));
//! assert_eq!(batches.end(BatchUpdateType::Source), Ok(false));
//! assert_eq!(batches.end(BatchUpdateType::Source), Ok(true));
//! ```

pub mod batch;
mod error;
pub mod logging;
pub mod property;
pub mod signal;

pub use batch::{BatchToken, BatchUpdateManager, BatchUpdateType};
pub use error::{BatchError, Result};
pub use logging::{ChainDebug, ChainFormatOptions, ChainStyle, StageInfo};
pub use property::Property;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
