//! Data directory layout and backend wiring.

use crate::config::{BackendSettings, Settings, CONFIG_FILE, TOKEN_ENV};
use std::path::{Path, PathBuf};
use tasksync_engine::{HttpTransport, ReqwestClient, StaticToken, SyncConfig, SyncOrchestrator, SyncResult};
use tasksync_store::{FileMetadataStore, FileSnapshotStore, StoreResult, VersionTracker};

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Tracker file name inside the data directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Directory used when `--data-dir` is not given.
pub const DEFAULT_DATA_DIR: &str = ".tasksync";

/// The orchestrator type the CLI drives.
pub type CliOrchestrator = SyncOrchestrator<HttpTransport<ReqwestClient>, FileSnapshotStore>;

/// A TaskSync data directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    data_dir: PathBuf,
}

impl Workspace {
    /// Uses `data_dir`, or [`DEFAULT_DATA_DIR`].
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        }
    }

    /// The data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the config file: `explicit`, or the one in the data directory.
    pub fn config_path(&self, explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(|| self.data_dir.join(CONFIG_FILE), Path::to_path_buf)
    }

    /// Opens the local snapshot store, creating the directory if needed.
    pub fn snapshot_store(&self) -> StoreResult<FileSnapshotStore> {
        FileSnapshotStore::open_with_create_dirs(&self.data_dir.join(SNAPSHOT_FILE))
    }

    /// Opens the version tracker.
    pub fn tracker(&self) -> StoreResult<VersionTracker> {
        let store = FileMetadataStore::open(&self.data_dir.join(METADATA_FILE))?;
        Ok(VersionTracker::new(store))
    }

    /// Builds an orchestrator for the configured backend.
    pub fn orchestrator(&self, settings: &Settings) -> Result<CliOrchestrator, Box<dyn std::error::Error>> {
        let transport = transport(settings, std::env::var(TOKEN_ENV).ok())?;
        let config = SyncConfig::new().with_request_timeout(settings.request_timeout());
        Ok(SyncOrchestrator::new(
            transport,
            self.snapshot_store()?,
            self.tracker()?,
            config,
        ))
    }
}

/// Builds the HTTP transport for `settings`.
pub fn transport(
    settings: &Settings,
    env_token: Option<String>,
) -> SyncResult<HttpTransport<ReqwestClient>> {
    let tokens = match settings.token(env_token) {
        Some(token) => StaticToken::new(token),
        None => StaticToken::anonymous(),
    };
    match &settings.backend {
        BackendSettings::Http { base_url, .. } => {
            let client = ReqwestClient::new(settings.request_timeout())?;
            Ok(HttpTransport::with_tokens(base_url.as_str(), client, tokens))
        }
    }
}
