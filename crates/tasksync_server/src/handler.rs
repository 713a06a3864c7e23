//! Request handling for the snapshot resource.

use crate::auth::{bearer_token, SimpleTokenValidator, TokenValidator};
use crate::config::{AuthMode, ServerConfig};
use crate::error::{ServerError, ServerResult};
use parking_lot::Mutex;
use serde::Serialize;
use tasksync_model::{next_version, Snapshot};
use tasksync_store::SnapshotStore;

/// Path of the snapshot resource.
pub const DATA_PATH: &str = "/api/data";

/// Body of a successful PUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PutResponse {
    /// Version the snapshot was stored under.
    pub version: u64,
}

enum Authenticator {
    Open,
    Shared(SimpleTokenValidator),
    Signed(TokenValidator),
}

impl Authenticator {
    fn from_config(config: &ServerConfig) -> Self {
        match &config.auth {
            AuthMode::Disabled => Authenticator::Open,
            AuthMode::SharedSecret(secret) => {
                Authenticator::Shared(SimpleTokenValidator::new(secret.clone()))
            }
            AuthMode::Signed(auth) => Authenticator::Signed(TokenValidator::new(auth.clone())),
        }
    }

    fn check(&self, authorization: Option<&str>) -> ServerResult<()> {
        match self {
            Authenticator::Open => Ok(()),
            Authenticator::Shared(validator) => validator.validate(bearer_token(authorization)?),
            Authenticator::Signed(validator) => {
                let subject = validator.validate(bearer_token(authorization)?)?;
                tracing::debug!(%subject, "authenticated request");
                Ok(())
            }
        }
    }
}

/// Handles GET and PUT on the snapshot resource.
pub struct RequestHandler<S: SnapshotStore> {
    config: ServerConfig,
    store: S,
    auth: Authenticator,
    /// Serializes the read-assign-write of a PUT.
    write_lock: Mutex<()>,
}

impl<S: SnapshotStore> RequestHandler<S> {
    /// Creates a handler over `store`.
    pub fn new(config: ServerConfig, store: S) -> Self {
        let auth = Authenticator::from_config(&config);
        Self {
            config,
            store,
            auth,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the snapshot store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Checks the route and credentials shared by every method.
    pub fn authorize(&self, path: &str, authorization: Option<&str>) -> ServerResult<()> {
        let path = path.split('?').next().unwrap_or(path);
        if path.trim_end_matches('/') != DATA_PATH {
            return Err(ServerError::NotFound(path.to_string()));
        }
        self.auth.check(authorization)
    }

    /// Returns the stored snapshot as JSON.
    pub fn handle_get(&self) -> ServerResult<Vec<u8>> {
        let snapshot = self
            .store
            .load()?
            .ok_or_else(|| ServerError::NotFound("no snapshot stored".into()))?;
        snapshot
            .to_json()
            .map_err(|e| ServerError::Internal(e.to_string()))
    }

    /// Stores a snapshot and returns the version it was assigned.
    pub fn handle_put(&self, body: &[u8]) -> ServerResult<PutResponse> {
        if body.len() > self.config.max_body_bytes {
            return Err(ServerError::PayloadTooLarge {
                size: body.len(),
                limit: self.config.max_body_bytes,
            });
        }
        let mut snapshot =
            Snapshot::from_json(body).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

        let _guard = self.write_lock.lock();
        let current = self.store.load()?.map(|s| s.version);
        let version = next_version(current, snapshot.version)
            .ok_or_else(|| ServerError::Internal("version counter overflow".into()))?;
        snapshot.version = version;
        self.store.save(&snapshot)?;

        tracing::info!(version, previous = current, "stored snapshot");
        Ok(PutResponse { version })
    }
}
