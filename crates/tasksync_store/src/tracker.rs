//! Version tracker: the last reconciliation point.

use crate::backend::MetadataStore;
use crate::error::StoreResult;
use tasksync_model::{now_millis, Timestamp};

/// Metadata key holding the last synced version.
pub const LAST_VERSION_KEY: &str = "sync.last_version";
/// Metadata key holding the last synced time (epoch milliseconds).
pub const LAST_SYNCED_AT_KEY: &str = "sync.last_synced_at";

/// The two tracker scalars, read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncMarker {
    /// Version of the snapshot at the last successful sync (0 = never).
    pub last_version: u64,
    /// Wall time of the last successful sync (0 = never).
    pub last_synced_at: Timestamp,
}

impl SyncMarker {
    /// Creates a marker.
    pub fn new(last_version: u64, last_synced_at: Timestamp) -> Self {
        Self {
            last_version,
            last_synced_at,
        }
    }

    /// A marker for a device that never synced.
    pub fn never() -> Self {
        Self::default()
    }
}

/// Persists the last synced version and time.
///
/// Both values are written in one atomic metadata update. Reads never fail:
/// a missing, unreadable or corrupted value reads as 0 ("never synced").
pub struct VersionTracker {
    store: Box<dyn MetadataStore>,
}

impl VersionTracker {
    /// Creates a tracker on top of a metadata store.
    pub fn new(store: impl MetadataStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Records a successful sync at the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata store rejects the write.
    pub fn record_sync(&self, version: u64) -> StoreResult<()> {
        self.record_sync_at(version, now_millis())
    }

    /// Records a successful sync at the given time.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata store rejects the write.
    pub fn record_sync_at(&self, version: u64, at: Timestamp) -> StoreResult<()> {
        self.store.set_many(&[
            (LAST_VERSION_KEY, version.to_string()),
            (LAST_SYNCED_AT_KEY, at.to_string()),
        ])?;
        tracing::debug!(version, at, "recorded sync point");
        Ok(())
    }

    /// The last synced version, or 0.
    pub fn last_version(&self) -> u64 {
        self.read_version().unwrap_or(Some(0)).unwrap_or(0)
    }

    /// The last synced time, or 0.
    pub fn last_synced_at(&self) -> Timestamp {
        self.read_synced_at().unwrap_or(Some(0)).unwrap_or(0)
    }

    /// Both values.
    ///
    /// A missing value reads as 0. If either value is present but corrupted,
    /// the whole marker reads as [`SyncMarker::never`].
    pub fn marker(&self) -> SyncMarker {
        match (self.read_version(), self.read_synced_at()) {
            (Some(version), Some(at)) => SyncMarker::new(version.unwrap_or(0), at.unwrap_or(0)),
            _ => {
                tracing::warn!("corrupted sync bookkeeping, treating as never synced");
                SyncMarker::never()
            }
        }
    }

    /// Forgets the sync point.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata store rejects the write.
    pub fn reset(&self) -> StoreResult<()> {
        self.store.remove_many(&[LAST_VERSION_KEY, LAST_SYNCED_AT_KEY])
    }

    /// `None` when corrupted, `Some(None)` when absent.
    fn read_version(&self) -> Option<Option<u64>> {
        match self.read_scalar(LAST_VERSION_KEY) {
            Some(raw) => raw.trim().parse::<u64>().ok().map(Some),
            None => Some(None),
        }
    }

    fn read_synced_at(&self) -> Option<Option<Timestamp>> {
        match self.read_scalar(LAST_SYNCED_AT_KEY) {
            Some(raw) => raw
                .trim()
                .parse::<Timestamp>()
                .ok()
                .filter(|at| *at >= 0)
                .map(Some),
            None => Some(None),
        }
    }

    fn read_scalar(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "unreadable sync bookkeeping, treating as never synced");
                None
            }
        }
    }
}

impl std::fmt::Debug for VersionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionTracker")
            .field("marker", &self.marker())
            .finish()
    }
}
