//! Status command implementation.

use crate::workspace::Workspace;
use serde::Serialize;
use tasksync_model::Snapshot;
use tasksync_store::SnapshotStore;

/// Sync bookkeeping and a one-line summary of the local snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Data directory.
    pub data_dir: String,
    /// Version at the last sync (0 = never).
    pub last_version: u64,
    /// Time of the last sync (0 = never).
    pub last_synced_at: i64,
    /// Local snapshot summary, if one is stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSummary>,
}

/// Counts describing the local snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSummary {
    /// Snapshot version.
    pub version: u64,
    /// Last local modification.
    pub last_modified: i64,
    /// Number of tasks.
    pub tasks: usize,
    /// Number of completed tasks.
    pub completed: usize,
    /// Number of categories.
    pub categories: usize,
    /// Whether the snapshot changed since the last sync.
    pub modified_since_sync: bool,
}

impl LocalSummary {
    fn new(snapshot: &Snapshot, last_synced_at: i64) -> Self {
        Self {
            version: snapshot.version,
            last_modified: snapshot.last_modified,
            tasks: snapshot.tasks.len(),
            completed: snapshot.tasks.iter().filter(|t| t.completed).count(),
            categories: snapshot.categories.len(),
            modified_since_sync: snapshot.last_modified > last_synced_at,
        }
    }
}

/// Builds the status report.
pub fn collect(workspace: &Workspace) -> Result<StatusReport, Box<dyn std::error::Error>> {
    let marker = workspace.tracker()?.marker();
    let local = workspace.snapshot_store()?.load()?;
    Ok(StatusReport {
        data_dir: workspace.data_dir().display().to_string(),
        last_version: marker.last_version,
        last_synced_at: marker.last_synced_at,
        local: local
            .as_ref()
            .map(|s| LocalSummary::new(s, marker.last_synced_at)),
    })
}

/// Runs the status command.
pub fn run(workspace: &Workspace, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = collect(workspace)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &StatusReport) {
    println!("Data directory: {}", report.data_dir);
    if report.last_version == 0 {
        println!("Last sync:      never");
    } else {
        println!(
            "Last sync:      version {} at {}",
            report.last_version, report.last_synced_at
        );
    }
    match &report.local {
        Some(local) => {
            println!(
                "Local:          version {}, {} tasks ({} completed), {} categories",
                local.version, local.tasks, local.completed, local.categories
            );
            if local.modified_since_sync {
                println!("                modified since last sync");
            }
        }
        None => println!("Local:          no snapshot"),
    }
}
