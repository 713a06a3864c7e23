//! Store trait definitions.

use crate::error::StoreResult;
use tasksync_model::Snapshot;

/// Durable storage for the single local snapshot record.
///
/// # Invariants
///
/// - `save` replaces the whole record; a reader never sees a partial write
/// - `load` returns exactly the last successfully saved snapshot
/// - `load` on a store that was never written returns `Ok(None)`
///
/// # Implementors
///
/// - [`super::InMemorySnapshotStore`] - For testing
/// - [`super::FileSnapshotStore`] - For persistent storage
pub trait SnapshotStore: Send + Sync {
    /// Loads the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Corrupted`] if the record cannot be
    /// decoded, or an I/O error.
    fn load(&self) -> StoreResult<Option<Snapshot>>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    fn save(&self, snapshot: &Snapshot) -> StoreResult<()>;

    /// Removes the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be removed.
    fn clear(&self) -> StoreResult<()>;
}

/// Small string key/value store for sync bookkeeping.
pub trait MetadataStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes several values in one atomic update.
    fn set_many(&self, entries: &[(&str, String)]) -> StoreResult<()>;

    /// Removes several values in one atomic update.
    fn remove_many(&self, keys: &[&str]) -> StoreResult<()>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<T> {
    fn load(&self) -> StoreResult<Option<Snapshot>> {
        (**self).load()
    }

    fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        (**self).save(snapshot)
    }

    fn clear(&self) -> StoreResult<()> {
        (**self).clear()
    }
}

impl<T: MetadataStore + ?Sized> MetadataStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set_many(&self, entries: &[(&str, String)]) -> StoreResult<()> {
        (**self).set_many(entries)
    }

    fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        (**self).remove_many(keys)
    }
}
