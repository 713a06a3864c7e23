//! File-based stores for persistent storage.

use crate::backend::{MetadataStore, SnapshotStore};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tasksync_model::Snapshot;

/// A file-based snapshot store.
///
/// The snapshot is kept as one JSON file. Writes go to a sibling temporary
/// file which is synced and then renamed over the target, so a crash leaves
/// either the old or the new record, never a torn one.
///
/// # Example
///
/// ```no_run
/// use tasksync_store::{FileSnapshotStore, SnapshotStore};
/// use tasksync_model::Snapshot;
/// use std::path::Path;
///
/// let store = FileSnapshotStore::open_with_create_dirs(Path::new("data/snapshot.json")).unwrap();
/// store.save(&Snapshot::empty()).unwrap();
/// ```
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileSnapshotStore {
    /// Opens a store at the given path. The file is created on first save.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory does not exist.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("directory {} does not exist", parent.display()),
                )));
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            lock: RwLock::new(()),
        })
    }

    /// Opens a store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> StoreResult<Option<Snapshot>> {
        let _guard = self.lock.read();
        let Some(bytes) = read_if_exists(&self.path)? else {
            return Ok(None);
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(Snapshot::from_json(&bytes)?))
    }

    fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let bytes = snapshot.to_json()?;
        let _guard = self.lock.write();
        write_atomic(&self.path, &bytes)
    }

    fn clear(&self) -> StoreResult<()> {
        let _guard = self.lock.write();
        remove_if_exists(&self.path)
    }
}

/// A file-based metadata store.
///
/// All keys live in one JSON object file that is rewritten atomically on
/// every update. A corrupted file reads as an error for every key and is
/// replaced on the next write.
#[derive(Debug)]
pub struct FileMetadataStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileMetadataStore {
    /// Opens a metadata store at the given path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            lock: RwLock::new(()),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> StoreResult<BTreeMap<String, String>> {
        let Some(bytes) = read_if_exists(&self.path)? else {
            return Ok(BTreeMap::new());
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupted(e.to_string()))
    }

    fn read_map_for_update(&self) -> StoreResult<BTreeMap<String, String>> {
        match self.read_map() {
            Err(StoreError::Corrupted(reason)) => {
                tracing::warn!(path = %self.path.display(), %reason, "discarding corrupted metadata file");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec_pretty(map).map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&self.path, &bytes)
    }
}

impl MetadataStore for FileMetadataStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let _guard = self.lock.read();
        Ok(self.read_map()?.remove(key))
    }

    fn set_many(&self, entries: &[(&str, String)]) -> StoreResult<()> {
        let _guard = self.lock.write();
        let mut map = self.read_map_for_update()?;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        self.write_map(&map)
    }

    fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        let _guard = self.lock.write();
        let mut map = self.read_map_for_update()?;
        for key in keys {
            map.remove(*key);
        }
        self.write_map(&map)
    }
}

fn read_if_exists(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_model::Task;
    use tempfile::tempdir;

    fn snapshot_with_task() -> Snapshot {
        let mut snapshot = Snapshot::empty();
        snapshot.tasks.push(Task::with_id("t1", "Plan", "c1", 10));
        snapshot.version = 2;
        snapshot
    }

    #[test]
    fn snapshot_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::open(&dir.path().join("snapshot.json")).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn snapshot_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = snapshot_with_task();

        {
            let store = FileSnapshotStore::open(&path).unwrap();
            store.save(&snapshot).unwrap();
        }

        let store = FileSnapshotStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
        assert!(!dir.path().join("snapshot.json.tmp").exists());
    }

    #[test]
    fn snapshot_save_replaces_record() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::open(&dir.path().join("snapshot.json")).unwrap();

        store.save(&snapshot_with_task()).unwrap();
        store.save(&Snapshot::empty()).unwrap();

        assert_eq!(store.load().unwrap(), Some(Snapshot::empty()));
    }

    #[test]
    fn snapshot_corrupted_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, b"{\"tasks\": [").unwrap();

        let store = FileSnapshotStore::open(&path).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn snapshot_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let store = FileSnapshotStore::open(&path).unwrap();

        store.save(&snapshot_with_task()).unwrap();
        store.clear().unwrap();
        assert!(!path.exists());
        assert!(store.load().unwrap().is_none());

        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn snapshot_open_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("snapshot.json");
        assert!(FileSnapshotStore::open(&path).is_err());
        assert!(FileSnapshotStore::open_with_create_dirs(&path).is_ok());
    }

    #[test]
    fn metadata_set_and_get() {
        let dir = tempdir().unwrap();
        let store = FileMetadataStore::open(&dir.path().join("meta.json")).unwrap();

        assert_eq!(store.get("a").unwrap(), None);
        store
            .set_many(&[("a", "1".into()), ("b", "2".into())])
            .unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));

        store.remove_many(&["a"]).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn metadata_recovers_from_corruption_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, b"garbage").unwrap();

        let store = FileMetadataStore::open(&path).unwrap();
        assert!(matches!(store.get("a"), Err(StoreError::Corrupted(_))));

        store.set_many(&[("a", "1".into())]).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }
}
