//! Prelude module for Horizon Collections.
//!
//! ```
//! use horizon_collections::prelude::*;
//! ```

// ============================================================================
// Lists
// ============================================================================

pub use crate::list::{ListConfig, ListenerGuard, ObservableList};
pub use crate::change::CollectionChange;
pub use crate::error::{CollectionError, Result};

// ============================================================================
// Decorator Contract
// ============================================================================

pub use crate::decorator::{ChangeSink, CollectionDecorator, DecoratorHost, DecoratorId, Item};

// ============================================================================
// Core Re-exports
// ============================================================================

pub use horizon_collections_core::{BatchToken, BatchUpdateType, Property};
