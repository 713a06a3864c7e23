//! Error types for the reference server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request body.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request body exceeds the configured limit.
    #[error("payload too large: {size} bytes, limit {limit}")]
    PayloadTooLarge {
        /// Body size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Missing or invalid credentials.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Unknown path, or no snapshot stored yet.
    #[error("not found: {0}")]
    NotFound(String),

    /// Method not supported on this path.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Snapshot storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] tasksync_store::StoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::NotAuthorized(_) => 401,
            ServerError::NotFound(_) => 404,
            ServerError::MethodNotAllowed(_) => 405,
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::Storage(_) | ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
