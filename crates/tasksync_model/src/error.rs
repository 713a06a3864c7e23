//! Error types for the snapshot model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while encoding, decoding or validating snapshots.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The payload is not a snapshot-shaped JSON object.
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    /// Encoding a snapshot failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Two entities of the same kind share an id.
    #[error("duplicate {kind} id: {id}")]
    DuplicateId {
        /// Entity kind (task, category, ...).
        kind: &'static str,
        /// The duplicated id.
        id: String,
    },

    /// A task's `completedAt` does not agree with its `completed` flag.
    #[error("task {0}: completedAt must be set iff completed")]
    CompletionMismatch(String),
}

impl ModelError {
    /// Creates a malformed-payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Returns true if this error describes an undecodable payload.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ModelError::Malformed(_))
    }
}
