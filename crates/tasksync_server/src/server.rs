//! The reference server facade.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::RequestHandler;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tasksync_model::Snapshot;
use tasksync_store::{InMemorySnapshotStore, SnapshotStore};

/// A response ready to be written by whatever HTTP layer hosts the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResponse {
    /// Status code.
    pub status: u16,
    /// JSON body.
    pub body: Vec<u8>,
}

impl ServerResponse {
    fn json(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    fn error(err: &ServerError) -> Self {
        let body = json!({ "error": err.to_string() }).to_string().into_bytes();
        Self::json(err.status_code(), body)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Content type of every response body.
    pub fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// The self-hosted snapshot endpoint.
///
/// Transport-agnostic: an HTTP framework (or a loopback client in tests)
/// passes the method, path, `Authorization` header and body to
/// [`DataServer::handle`] and writes back the returned response.
///
/// # Example
///
/// ```
/// use tasksync_server::{DataServer, ServerConfig};
///
/// let server = DataServer::in_memory(ServerConfig::default());
///
/// let response = server.handle("GET", "/api/data", None, b"");
/// assert_eq!(response.status, 404);
///
/// let response = server.handle("PUT", "/api/data", None, br#"{"version":0}"#);
/// assert_eq!(response.status, 200);
/// assert_eq!(server.current_version(), Some(1));
/// ```
pub struct DataServer<S: SnapshotStore = InMemorySnapshotStore> {
    handler: RequestHandler<S>,
    requests: AtomicU64,
}

impl DataServer<InMemorySnapshotStore> {
    /// Creates a server keeping the snapshot in memory.
    pub fn in_memory(config: ServerConfig) -> Self {
        Self::new(config, InMemorySnapshotStore::new())
    }
}

impl<S: SnapshotStore> DataServer<S> {
    /// Creates a server persisting the snapshot in `store`.
    pub fn new(config: ServerConfig, store: S) -> Self {
        Self {
            handler: RequestHandler::new(config, store),
            requests: AtomicU64::new(0),
        }
    }

    /// Handles one request.
    pub fn handle(
        &self,
        method: &str,
        path: &str,
        authorization: Option<&str>,
        body: &[u8],
    ) -> ServerResponse {
        self.requests.fetch_add(1, Ordering::Relaxed);
        match self.dispatch(method, path, authorization, body) {
            Ok(response) => response,
            Err(err) => {
                if err.is_server_error() {
                    tracing::error!(%method, %path, error = %err, "request failed");
                } else {
                    tracing::debug!(%method, %path, error = %err, "request rejected");
                }
                ServerResponse::error(&err)
            }
        }
    }

    fn dispatch(
        &self,
        method: &str,
        path: &str,
        authorization: Option<&str>,
        body: &[u8],
    ) -> ServerResult<ServerResponse> {
        self.handler.authorize(path, authorization)?;
        match method.to_ascii_uppercase().as_str() {
            "GET" => Ok(ServerResponse::json(200, self.handler.handle_get()?)),
            "PUT" => {
                let response = self.handler.handle_put(body)?;
                let body = serde_json::to_vec(&response)
                    .map_err(|e| ServerError::Internal(e.to_string()))?;
                Ok(ServerResponse::json(200, body))
            }
            other => Err(ServerError::MethodNotAllowed(other.to_string())),
        }
    }

    /// The stored snapshot, if any.
    pub fn snapshot(&self) -> ServerResult<Option<Snapshot>> {
        Ok(self.handler.store().load()?)
    }

    /// Version of the stored snapshot.
    pub fn current_version(&self) -> Option<u64> {
        self.snapshot().ok().flatten().map(|s| s.version)
    }

    /// Replaces the stored snapshot without version assignment.
    ///
    /// Lets tests and tools seed the server as another device would have.
    pub fn seed(&self, snapshot: &Snapshot) -> ServerResult<()> {
        Ok(self.handler.store().save(snapshot)?)
    }

    /// Number of requests handled.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        self.handler.config()
    }
}
