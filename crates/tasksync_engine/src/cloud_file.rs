//! Transport storing the snapshot as one JSON file in user cloud storage.
//!
//! The storage provider has no notion of versions, so the transport assigns
//! them itself: a push reads the current file, applies [`assign_version`] and
//! writes the whole file back.

use crate::error::{SyncError, SyncResult};
use crate::http::decode_snapshot;
use crate::transport::{assign_version, BackendKind, PushReceipt, RemoteTransport, TokenProvider};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tasksync_model::Snapshot;

/// Default location of the snapshot file inside the user's storage.
pub const DEFAULT_FILE_PATH: &str = "/Apps/TaskSync/snapshot.json";

/// Minimal file API of a cloud storage provider.
pub trait FileStorageClient: Send + Sync {
    /// Downloads a file, `None` if it does not exist.
    fn download(&self, path: &str, access_token: &str) -> SyncResult<Option<Vec<u8>>>;

    /// Uploads a file, overwriting any existing one.
    fn upload(&self, path: &str, access_token: &str, contents: &[u8]) -> SyncResult<()>;
}

/// Transport for the file-based cloud storage backend.
pub struct CloudFileTransport<C: FileStorageClient, P: TokenProvider> {
    client: C,
    tokens: P,
    path: String,
}

impl<C: FileStorageClient, P: TokenProvider> CloudFileTransport<C, P> {
    /// Creates a transport using [`DEFAULT_FILE_PATH`].
    pub fn new(client: C, tokens: P) -> Self {
        Self {
            client,
            tokens,
            path: DEFAULT_FILE_PATH.to_string(),
        }
    }

    /// Uses a different file path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns the file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn token(&self) -> SyncResult<String> {
        self.tokens
            .access_token()?
            .ok_or_else(|| SyncError::AuthenticationFailed("no access token".into()))
    }
}

impl<C: FileStorageClient, P: TokenProvider> RemoteTransport for CloudFileTransport<C, P> {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudFile
    }

    fn fetch_remote(&self) -> SyncResult<Option<Snapshot>> {
        let token = self.token()?;
        match self.client.download(&self.path, &token)? {
            Some(bytes) => decode_snapshot(&bytes),
            None => Ok(None),
        }
    }

    fn push_remote(&self, snapshot: &Snapshot) -> SyncResult<PushReceipt> {
        let token = self.token()?;

        // A malformed file is overwritten, as if nothing were stored.
        let current = match self.client.download(&self.path, &token)? {
            Some(bytes) => match decode_snapshot(&bytes) {
                Ok(existing) => existing.map(|s| s.version),
                Err(e) if e.is_malformed_payload() => {
                    tracing::warn!(path = %self.path, error = %e, "overwriting malformed remote file");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let version = assign_version(current, snapshot.version)?;
        let mut stored = snapshot.clone();
        stored.version = version;
        self.client.upload(&self.path, &token, &stored.to_json()?)?;
        Ok(PushReceipt { version })
    }
}

/// In-memory [`FileStorageClient`] for tests.
///
/// Accepts any token unless one is required via [`Self::require_token`].
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    required_token: Mutex<Option<String>>,
    offline: AtomicBool,
}

impl MemoryFileStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects requests that do not carry `token`.
    pub fn require_token(&self, token: impl Into<String>) {
        *self.required_token.lock() = Some(token.into());
    }

    /// Makes every request fail with a retryable transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Writes raw file contents.
    pub fn put_raw(&self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files.lock().insert(path.to_string(), contents.into());
    }

    /// Reads raw file contents.
    pub fn get_raw(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    fn check(&self, token: &str) -> SyncResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("storage unreachable"));
        }
        match self.required_token.lock().as_deref() {
            Some(expected) if expected != token => {
                Err(SyncError::AuthenticationFailed("invalid access token".into()))
            }
            _ => Ok(()),
        }
    }
}

impl FileStorageClient for MemoryFileStorage {
    fn download(&self, path: &str, access_token: &str) -> SyncResult<Option<Vec<u8>>> {
        self.check(access_token)?;
        Ok(self.get_raw(path))
    }

    fn upload(&self, path: &str, access_token: &str, contents: &[u8]) -> SyncResult<()> {
        self.check(access_token)?;
        self.put_raw(path, contents.to_vec());
        Ok(())
    }
}

impl<T: FileStorageClient + ?Sized> FileStorageClient for std::sync::Arc<T> {
    fn download(&self, path: &str, access_token: &str) -> SyncResult<Option<Vec<u8>>> {
        (**self).download(path, access_token)
    }

    fn upload(&self, path: &str, access_token: &str, contents: &[u8]) -> SyncResult<()> {
        (**self).upload(path, access_token, contents)
    }
}
