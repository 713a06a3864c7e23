//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stored record cannot be decoded.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Encoding the record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store refused the write (used by test stores to simulate a full
    /// or read-only disk).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<tasksync_model::ModelError> for StoreError {
    fn from(err: tasksync_model::ModelError) -> Self {
        if err.is_malformed() {
            StoreError::Corrupted(err.to_string())
        } else {
            StoreError::Serialization(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_model::ModelError;

    #[test]
    fn model_errors_map_to_store_errors() {
        let err: StoreError = ModelError::malformed("bad").into();
        assert!(matches!(err, StoreError::Corrupted(_)));

        let err: StoreError = ModelError::Encode("nan".into()).into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
