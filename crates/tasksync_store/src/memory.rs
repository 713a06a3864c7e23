//! In-memory stores for testing.

use crate::backend::{MetadataStore, SnapshotStore};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tasksync_model::Snapshot;

/// An in-memory snapshot store.
///
/// Suitable for unit and integration tests. Writes can be made to fail with
/// [`InMemorySnapshotStore::set_fail_writes`] to exercise I/O failure paths,
/// and [`InMemorySnapshotStore::save_count`] reports how many writes
/// succeeded.
///
/// # Example
///
/// ```rust
/// use tasksync_store::{InMemorySnapshotStore, SnapshotStore};
/// use tasksync_model::Snapshot;
///
/// let store = InMemorySnapshotStore::new();
/// store.save(&Snapshot::empty()).unwrap();
/// assert_eq!(store.save_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    record: RwLock<Option<Snapshot>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    saves: AtomicU64,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding a snapshot.
    #[must_use]
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            record: RwLock::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Makes subsequent reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Returns a copy of the stored snapshot, bypassing failure injection.
    #[must_use]
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.record.read().clone()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> StoreResult<Option<Snapshot>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(self.record.read().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        *self.record.write() = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        *self.record.write() = None;
        Ok(())
    }
}

/// An in-memory metadata store.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    values: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl InMemoryMetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a raw value directly, bypassing failure injection.
    ///
    /// Useful for simulating corrupted bookkeeping.
    pub fn insert_raw(&self, key: &str, value: impl Into<String>) {
        self.values.write().insert(key.to_string(), value.into());
    }

    /// Makes subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        let mut values = self.values.write();
        for (key, value) in entries {
            values.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        let mut values = self.values.write();
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}
