//! Error types for Horizon Collections core.

use crate::batch::BatchUpdateType;

/// Batch-scope errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// `end` was called for a batch type with no open scope.
    #[error("No open batch scope for {0:?}")]
    Unbalanced(BatchUpdateType),
}

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, BatchError>;
