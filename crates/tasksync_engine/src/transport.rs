//! Remote transport abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tasksync_model::Snapshot;

/// The kind of remote backend behind a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Self-hosted HTTP endpoint (`GET/PUT <base>/api/data`).
    SelfHosted,
    /// A single JSON file in user cloud storage.
    CloudFile,
    /// One document per user in a document database.
    Document,
    /// In-memory test double.
    Mock,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::SelfHosted => "self-hosted",
            BackendKind::CloudFile => "cloud-file",
            BackendKind::Document => "document",
            BackendKind::Mock => "mock",
        })
    }
}

/// Acknowledgement of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReceipt {
    /// The version the backend stored the snapshot under.
    pub version: u64,
}

/// A remote transport fetches and pushes whole snapshots.
///
/// All backends share the same semantics: a push overwrites the whole remote
/// snapshot, there is no partial-write guarantee and no server-side merge.
/// Every failure is returned as a [`SyncError`].
pub trait RemoteTransport: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Fetches the remote snapshot, `None` if the remote holds nothing yet.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MalformedPayload`] if the remote holds something
    /// that is not a snapshot, or a transport/auth error.
    fn fetch_remote(&self) -> SyncResult<Option<Snapshot>>;

    /// Stores `snapshot` remotely and returns the version it was stored under.
    ///
    /// Pushing the same snapshot again is safe: it is stored again under a
    /// new, higher version.
    fn push_remote(&self, snapshot: &Snapshot) -> SyncResult<PushReceipt>;
}

impl<T: RemoteTransport + ?Sized> RemoteTransport for std::sync::Arc<T> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn fetch_remote(&self) -> SyncResult<Option<Snapshot>> {
        (**self).fetch_remote()
    }

    fn push_remote(&self, snapshot: &Snapshot) -> SyncResult<PushReceipt> {
        (**self).push_remote(snapshot)
    }
}

/// The version a backend assigns to a pushed snapshot.
///
/// Never below what the client proposed and always above what is currently
/// stored, so every successful push strictly increases the remote version.
pub fn assign_version(current: Option<u64>, proposed: u64) -> SyncResult<u64> {
    tasksync_model::next_version(current, proposed).ok_or(SyncError::VersionOverflow)
}

/// Source of an access token for authenticated backends.
///
/// The interactive part of an OAuth flow lives outside the engine; a provider
/// only hands out the current token.
pub trait TokenProvider: Send + Sync {
    /// Returns the current access token, `None` for anonymous access.
    fn access_token(&self) -> SyncResult<Option<String>>;
}

/// A fixed bearer token (or none).
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    /// A provider returning `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// A provider for unauthenticated access.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> SyncResult<Option<String>> {
        Ok(self.0.clone())
    }
}

/// An in-memory remote for testing.
///
/// Assigns versions like a real backend and can be told to fail or to serve
/// a malformed payload.
#[derive(Debug, Default)]
pub struct MockTransport {
    remote: Mutex<Option<Snapshot>>,
    connected: AtomicBool,
    malformed: AtomicBool,
    fetches: AtomicU64,
    pushes: AtomicU64,
}

impl MockTransport {
    /// Creates a connected mock with an empty remote.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Creates a connected mock holding `snapshot`.
    pub fn with_remote(snapshot: Snapshot) -> Self {
        let mock = Self::new();
        *mock.remote.lock() = Some(snapshot);
        mock
    }

    /// Replaces the remote snapshot as another device would.
    pub fn set_remote(&self, snapshot: Option<Snapshot>) {
        *self.remote.lock() = snapshot;
    }

    /// Returns the remote snapshot.
    pub fn remote(&self) -> Option<Snapshot> {
        self.remote.lock().clone()
    }

    /// Sets the connected state. A disconnected mock fails every call.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes fetches report a malformed payload.
    pub fn set_malformed(&self, malformed: bool) {
        self.malformed.store(malformed, Ordering::SeqCst);
    }

    /// Number of fetch calls, including failed ones.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of push calls, including failed ones.
    pub fn push_count(&self) -> u64 {
        self.pushes.load(Ordering::SeqCst)
    }

    fn check_connected(&self) -> SyncResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::transport_retryable("remote unreachable"))
        }
    }
}

impl RemoteTransport for MockTransport {
    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    fn fetch_remote(&self) -> SyncResult<Option<Snapshot>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_connected()?;
        if self.malformed.load(Ordering::SeqCst) {
            return Err(SyncError::malformed("mock payload is not a snapshot"));
        }
        Ok(self.remote.lock().clone())
    }

    fn push_remote(&self, snapshot: &Snapshot) -> SyncResult<PushReceipt> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.check_connected()?;
        let mut remote = self.remote.lock();
        let version = assign_version(remote.as_ref().map(|s| s.version), snapshot.version)?;
        let mut stored = snapshot.clone();
        stored.version = version;
        *remote = Some(stored);
        Ok(PushReceipt { version })
    }
}
