//! Classify and sync command implementations.

use crate::config::Settings;
use crate::workspace::Workspace;
use tasksync_engine::{CycleReport, RemoteTransport};

/// Runs the classify command: fetches the remote and prints the action a
/// cycle would take, without applying it.
pub fn classify(workspace: &Workspace, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = workspace.orchestrator(settings)?;
    let marker = orchestrator.tracker().marker();
    let action = orchestrator.preview()?;

    println!("Backend:   {}", orchestrator.transport().kind());
    println!(
        "Tracker:   version {}, synced at {}",
        marker.last_version, marker.last_synced_at
    );
    println!("Action:    {action}");
    Ok(())
}

/// Runs the sync command: one full cycle.
pub fn run(workspace: &Workspace, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = workspace.orchestrator(settings)?;
    match orchestrator.sync_now() {
        Ok(Some(report)) => {
            print!("{}", describe(&report));
            Ok(())
        }
        Ok(None) => Err("another sync cycle is running".into()),
        Err(e) => {
            tracing::error!(error = %e, retryable = e.is_retryable(), "sync failed");
            Err(e.into())
        }
    }
}

/// Human-readable cycle summary.
pub fn describe(report: &CycleReport) -> String {
    let mut out = format!("Action:    {}\n", report.action);
    if let Some(version) = report.pushed_version {
        out.push_str(&format!("Pushed:    version {version}\n"));
    }
    if let Some(info) = &report.merge_info {
        out.push_str(&format!("Merged:    {}\n", info.summary()));
    }
    if !report.committed {
        out.push_str("Note:      result not applied locally; run sync again\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_engine::{MergeInfo, SyncAction, Trigger};

    #[test]
    fn describe_merge() {
        let report = CycleReport {
            trigger: Trigger::Manual,
            action: SyncAction::Merge,
            pushed_version: Some(5),
            merge_info: Some(MergeInfo {
                tasks_added: vec!["t1".into()],
                ..MergeInfo::default()
            }),
            committed: true,
        };
        let text = describe(&report);
        assert!(text.contains("Action:    merge"));
        assert!(text.contains("Pushed:    version 5"));
        assert!(text.contains("Merged:"));
        assert!(!text.contains("Note"));
    }

    #[test]
    fn describe_uncommitted() {
        let report = CycleReport {
            trigger: Trigger::Timer,
            action: SyncAction::TakeRemote,
            pushed_version: None,
            merge_info: None,
            committed: false,
        };
        assert!(describe(&report).contains("run sync again"));
    }
}
