//! Reference-counted batch update scopes.
//!
//! A batch scope suppresses incremental notifications while a burst of
//! changes is applied. Scopes nest: the [`BatchUpdateManager`] keeps one depth
//! counter per [`BatchUpdateType`] and only announces the outermost transitions,
//! `0 → 1` through [`BatchUpdateManager::batch_began`] and `1 → 0` through
//! [`BatchUpdateManager::batch_ended`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_collections_core::{BatchUpdateManager, BatchUpdateType};
//!
//! let batches = Arc::new(BatchUpdateManager::new());
//! batches.batch_ended().connect(|ty| println!("{ty:?} batch finished"));
//!
//! let outer = batches.scope(BatchUpdateType::Source);
//! let inner = batches.scope(BatchUpdateType::Source);
//! drop(inner); // still active
//! assert!(batches.is_active(BatchUpdateType::Source));
//! drop(outer); // prints once
//! assert!(!batches.is_active(BatchUpdateType::Source));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BatchError, Result};
use crate::logging::targets;
use crate::signal::Signal;

/// Identifies an independent batch counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchUpdateType {
    /// Raw (source) collection notifications.
    Source,
    /// Decorated-view notifications.
    Decorators,
    /// Application-defined batch kinds.
    Custom(u32),
}

/// Tracks nested begin/end pairs per batch type.
pub struct BatchUpdateManager {
    depths: Mutex<HashMap<BatchUpdateType, usize>>,
    began: Arc<Signal<BatchUpdateType>>,
    ended: Arc<Signal<BatchUpdateType>>,
}

impl Default for BatchUpdateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchUpdateManager {
    /// Create a manager with no open scopes.
    pub fn new() -> Self {
        Self {
            depths: Mutex::new(HashMap::new()),
            began: Arc::new(Signal::new()),
            ended: Arc::new(Signal::new()),
        }
    }

    /// Open a scope of the given type.
    ///
    /// Returns `true` when this was the outermost scope, in which case
    /// `batch_began` has been emitted.
    pub fn begin(&self, ty: BatchUpdateType) -> bool {
        let first = {
            let mut depths = self.depths.lock();
            let depth = depths.entry(ty).or_insert(0);
            *depth += 1;
            *depth == 1
        };
        if first {
            tracing::debug!(target: targets::BATCH, ?ty, "batch began");
            self.began.emit(&ty);
        }
        first
    }

    /// Close a scope of the given type.
    ///
    /// Returns `Ok(true)` when the outermost scope closed, in which case
    /// `batch_ended` has been emitted. Closing a type with no open scope is an
    /// error and leaves the counters untouched.
    pub fn end(&self, ty: BatchUpdateType) -> Result<bool> {
        let last = {
            let mut depths = self.depths.lock();
            match depths.get_mut(&ty) {
                Some(depth) if *depth > 0 => {
                    *depth -= 1;
                    if *depth == 0 {
                        depths.remove(&ty);
                        true
                    } else {
                        false
                    }
                }
                _ => return Err(BatchError::Unbalanced(ty)),
            }
        };
        if last {
            tracing::debug!(target: targets::BATCH, ?ty, "batch ended");
            self.ended.emit(&ty);
        }
        Ok(last)
    }

    /// Current nesting depth for a batch type.
    pub fn depth(&self, ty: BatchUpdateType) -> usize {
        self.depths.lock().get(&ty).copied().unwrap_or(0)
    }

    /// Returns `true` while at least one scope of this type is open.
    pub fn is_active(&self, ty: BatchUpdateType) -> bool {
        self.depth(ty) > 0
    }

    /// Emitted on every `0 → 1` depth transition.
    pub fn batch_began(&self) -> &Arc<Signal<BatchUpdateType>> {
        &self.began
    }

    /// Emitted on every `1 → 0` depth transition.
    pub fn batch_ended(&self) -> &Arc<Signal<BatchUpdateType>> {
        &self.ended
    }

    /// Open a scope that closes itself when the returned token is dropped.
    pub fn scope(self: &Arc<Self>, ty: BatchUpdateType) -> BatchToken {
        self.begin(ty);
        let manager = Arc::clone(self);
        BatchToken::new(move || {
            if let Err(err) = manager.end(ty) {
                tracing::warn!(target: targets::BATCH, %err, "batch token released twice");
            }
        })
    }
}

impl fmt::Debug for BatchUpdateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchUpdateManager")
            .field("depths", &*self.depths.lock())
            .finish()
    }
}

/// Identifies one outstanding begin/end pair.
///
/// Dropping (or [`dispose`](Self::dispose)-ing) the token ends the scope
/// exactly once.
#[must_use = "dropping a batch token ends the batch immediately"]
pub struct BatchToken {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl BatchToken {
    /// Create a token that runs `release` when it is disposed.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A token that does nothing when disposed.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// End the scope now.
    pub fn dispose(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for BatchToken {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for BatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchToken")
            .field("pending", &self.release.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(BatchUpdateManager: Send, Sync);
static_assertions::assert_impl_all!(BatchToken: Send);
