//! Error types for observable collections.

use crate::decorator::DecoratorId;

/// Errors raised by [`ObservableList`](crate::ObservableList) operations and
/// the decorator pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// An index was outside the valid range.
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Length of the sequence at the time of the call.
        len: usize,
    },

    /// A listener tried to mutate the collection that is notifying it.
    #[error("Collection mutated from inside its own change notification")]
    ReentrantMutation,

    /// No decorator with this ID is attached.
    #[error("No decorator attached with id {0}")]
    UnknownDecorator(DecoratorId),

    /// The decorator exists but is not of the requested type.
    #[error("Decorator {id} is not a {expected}")]
    DecoratorTypeMismatch {
        /// The decorator that was looked up.
        id: DecoratorId,
        /// Type name that was requested.
        expected: &'static str,
    },

    /// A decorator emitted a change that cannot be applied to its output.
    #[error("Decorator '{decorator}' emitted an invalid change: {source}")]
    InvalidDecoratorChange {
        /// Name of the misbehaving decorator.
        decorator: &'static str,
        /// The application failure.
        source: Box<CollectionError>,
    },

    /// A builder was finished without a required callback.
    #[error("Missing required callback: {0}")]
    MissingCallback(&'static str),

    /// The collection is in the middle of propagating a change and cannot be
    /// observed consistently.
    #[error("Collection is busy propagating a change")]
    Busy,
}

/// A specialized Result type for collection operations.
pub type Result<T> = std::result::Result<T, CollectionError>;
