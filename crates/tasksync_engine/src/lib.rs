//! # TaskSync Engine
//!
//! Offline-first snapshot synchronization for TaskSync.
//!
//! This crate provides:
//! - Conflict classification of a (local, remote, sync point) triple
//! - The automatic merge of two diverged snapshots
//! - Remote transports: self-hosted HTTP, cloud file, document database
//! - OAuth2-PKCE helpers for token-based backends
//! - The sync orchestrator state machine and its tokio driver
//!
//! ## Architecture
//!
//! Sync always exchanges **whole snapshots**:
//! 1. Read the last persisted local snapshot
//! 2. Fetch the remote snapshot
//! 3. Classify: noop, upload, take remote, or merge
//! 4. Apply the action, push if needed, record the sync point
//!
//! ## Key Invariants
//!
//! - The remote assigns versions; every push strictly increases it
//! - Only one sync cycle runs at a time
//! - Local writes never wait for the network
//! - A failed cycle leaves the pending-push flag raised for the next tick
//! - Merges never lose a task created locally after the sync point
//!
//! ## Example
//!
//! ```rust
//! use tasksync_engine::{
//!     MockTransport, SyncAction, SyncConfig, SyncOrchestrator,
//! };
//! use tasksync_model::Snapshot;
//! use tasksync_store::{InMemoryMetadataStore, InMemorySnapshotStore, VersionTracker};
//!
//! let orchestrator = SyncOrchestrator::new(
//!     MockTransport::new(),
//!     InMemorySnapshotStore::with_snapshot(Snapshot::empty()),
//!     VersionTracker::new(InMemoryMetadataStore::new()),
//!     SyncConfig::default(),
//! );
//!
//! let report = orchestrator.start().unwrap().unwrap();
//! assert_eq!(report.action, SyncAction::UploadOnly);
//! assert_eq!(orchestrator.tracker().last_version(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod classifier;
mod clock;
mod cloud_file;
mod config;
mod document;
mod driver;
mod error;
mod http;
mod merge;
pub mod oauth;
mod orchestrator;
mod transport;

pub use classifier::{classify, SyncAction};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cloud_file::{CloudFileTransport, FileStorageClient, MemoryFileStorage, DEFAULT_FILE_PATH};
pub use config::{RetryConfig, SyncConfig};
pub use document::{
    DocumentStore, DocumentTransport, IdentityProvider, MemoryDocumentStore, StaticIdentity,
    DEFAULT_COLLECTION,
};
pub use driver::{DriverHandle, SyncDriver};
pub use error::{SyncError, SyncResult};
pub use http::{
    HttpClient, HttpFailure, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer, Method,
    ReqwestClient, DATA_PATH,
};
pub use merge::{merge, MergeInfo, MergeOutcome};
pub use orchestrator::{
    ConflictChoice, ConflictReview, CycleReport, SyncOrchestrator, SyncStats, SyncStatus, Trigger,
};
pub use transport::{
    assign_version, BackendKind, MockTransport, PushReceipt, RemoteTransport, StaticToken,
    TokenProvider,
};
