//! Transport storing one snapshot document per authenticated user.

use crate::error::{SyncError, SyncResult};
use crate::transport::{assign_version, BackendKind, PushReceipt, RemoteTransport};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tasksync_model::Snapshot;

/// Default collection holding the per-user documents.
pub const DEFAULT_COLLECTION: &str = "userData";

/// Federated identity of the signed-in user.
pub trait IdentityProvider: Send + Sync {
    /// Returns the current user id, `None` when nobody is signed in.
    fn user_id(&self) -> SyncResult<Option<String>>;
}

/// A fixed identity.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    /// Signed in as `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(Some(user_id.into()))
    }

    /// Nobody signed in.
    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn user_id(&self) -> SyncResult<Option<String>> {
        Ok(self.0.clone())
    }
}

/// Document database access.
pub trait DocumentStore: Send + Sync {
    /// Reads a document.
    fn get(&self, collection: &str, id: &str) -> SyncResult<Option<Value>>;

    /// Writes a document, replacing it entirely.
    fn set(&self, collection: &str, id: &str, document: Value) -> SyncResult<()>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    fn get(&self, collection: &str, id: &str) -> SyncResult<Option<Value>> {
        (**self).get(collection, id)
    }

    fn set(&self, collection: &str, id: &str, document: Value) -> SyncResult<()> {
        (**self).set(collection, id, document)
    }
}

/// Transport for the document-database backend.
pub struct DocumentTransport<S: DocumentStore, I: IdentityProvider> {
    store: S,
    identity: I,
    collection: String,
}

impl<S: DocumentStore, I: IdentityProvider> DocumentTransport<S, I> {
    /// Creates a transport using [`DEFAULT_COLLECTION`].
    pub fn new(store: S, identity: I) -> Self {
        Self {
            store,
            identity,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    /// Uses a different collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    fn user(&self) -> SyncResult<String> {
        self.identity
            .user_id()?
            .ok_or_else(|| SyncError::AuthenticationFailed("not signed in".into()))
    }
}

fn decode(document: Value) -> SyncResult<Snapshot> {
    Snapshot::from_value(document).map_err(|e| SyncError::malformed(e.to_string()))
}

impl<S: DocumentStore, I: IdentityProvider> RemoteTransport for DocumentTransport<S, I> {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn fetch_remote(&self) -> SyncResult<Option<Snapshot>> {
        let user = self.user()?;
        match self.store.get(&self.collection, &user)? {
            None | Some(Value::Null) => Ok(None),
            Some(document) => decode(document).map(Some),
        }
    }

    fn push_remote(&self, snapshot: &Snapshot) -> SyncResult<PushReceipt> {
        let user = self.user()?;
        let current = match self.store.get(&self.collection, &user)? {
            None | Some(Value::Null) => None,
            Some(document) => decode(document).ok().map(|s| s.version),
        };

        let version = assign_version(current, snapshot.version)?;
        let mut stored = snapshot.clone();
        stored.version = version;
        self.store.set(&self.collection, &user, stored.to_value()?)?;
        tracing::debug!(user = %user, version, "stored snapshot document");
        Ok(PushReceipt { version })
    }
}

/// In-memory [`DocumentStore`] for tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<(String, String), Value>>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every request fail with a retryable transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    /// Returns true if no document is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> SyncResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(SyncError::transport_retryable("document store unreachable"))
        } else {
            Ok(())
        }
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, collection: &str, id: &str) -> SyncResult<Option<Value>> {
        self.check()?;
        Ok(self
            .documents
            .lock()
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    fn set(&self, collection: &str, id: &str, document: Value) -> SyncResult<()> {
        self.check()?;
        self.documents
            .lock()
            .insert((collection.to_string(), id.to_string()), document);
        Ok(())
    }
}
