//! # TaskSync Store
//!
//! Local durable store and version tracker for TaskSync.
//!
//! The local store holds **one logical record**: the last known full
//! snapshot. It is read and written wholesale and is the source of truth on
//! startup, before any network call.
//!
//! ## Design Principles
//!
//! - Stores never interpret or merge snapshots
//! - Writes replace the whole record (temp file + rename for file stores)
//! - Must be `Send + Sync`; all methods take `&self`
//! - The version tracker treats unreadable values as "never synced"
//!
//! ## Available Backends
//!
//! - [`InMemorySnapshotStore`] / [`InMemoryMetadataStore`] - For tests
//! - [`FileSnapshotStore`] / [`FileMetadataStore`] - For persistent storage
//!
//! ## Example
//!
//! ```rust
//! use tasksync_store::{InMemoryMetadataStore, VersionTracker};
//!
//! let tracker = VersionTracker::new(InMemoryMetadataStore::new());
//! assert_eq!(tracker.last_version(), 0);
//!
//! tracker.record_sync_at(7, 1_700_000_000_000).unwrap();
//! assert_eq!(tracker.last_version(), 7);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod tracker;

pub use backend::{MetadataStore, SnapshotStore};
pub use error::{StoreError, StoreResult};
pub use file::{FileMetadataStore, FileSnapshotStore};
pub use memory::{InMemoryMetadataStore, InMemorySnapshotStore};
pub use tracker::{SyncMarker, VersionTracker, LAST_SYNCED_AT_KEY, LAST_VERSION_KEY};
