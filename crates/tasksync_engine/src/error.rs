//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Authentication failed or no credentials are available.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server rejected the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// The remote payload is not a valid snapshot.
    #[error("malformed remote payload: {0}")]
    MalformedPayload(String),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] tasksync_store::StoreError),

    /// Snapshot encoding error.
    #[error("model error: {0}")]
    Model(#[from] tasksync_model::ModelError),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Not connected.
    #[error("not connected to remote")]
    NotConnected,

    /// The next version does not fit in a `u64`.
    #[error("version counter overflow")]
    VersionOverflow,

    /// A merge produced a version that does not advance past the sync point.
    #[error("merge produced stale version {got}, expected above {expected_above}")]
    StaleMerge {
        /// The version the merge had to exceed.
        expected_above: u64,
        /// The version the merge produced.
        got: u64,
    },

    /// A sync cycle is already running.
    #[error("a sync cycle is already running")]
    Busy,

    /// `resolve_conflict` was called with no merge awaiting review.
    #[error("no merged conflict awaiting review")]
    NoConflictPending,

    /// OAuth flow error (state mismatch, token endpoint rejection).
    #[error("oauth error: {0}")]
    OAuth(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a malformed-payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }

    /// Returns true if the remote payload could not be decoded.
    pub fn is_malformed_payload(&self) -> bool {
        match self {
            SyncError::MalformedPayload(_) => true,
            SyncError::Model(e) => e.is_malformed(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_model::ModelError;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::ServerError("internal error".into()).is_retryable());
        assert!(!SyncError::AuthenticationFailed("expired".into()).is_retryable());
        assert!(!SyncError::malformed("[]").is_retryable());
    }

    #[test]
    fn malformed_detection() {
        assert!(SyncError::malformed("bad json").is_malformed_payload());
        assert!(SyncError::from(ModelError::malformed("x")).is_malformed_payload());
        assert!(!SyncError::NotConnected.is_malformed_payload());
    }

    #[test]
    fn error_display() {
        let err = SyncError::NotConnected;
        assert_eq!(err.to_string(), "not connected to remote");

        let err = SyncError::StaleMerge {
            expected_above: 4,
            got: 4,
        };
        assert!(err.to_string().contains("stale version 4"));
    }
}
