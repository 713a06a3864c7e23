//! Reset-tracker command implementation.

use crate::workspace::Workspace;

/// Runs the reset-tracker command.
///
/// The next sync treats this device as never synced.
pub fn run(workspace: &Workspace) -> Result<(), Box<dyn std::error::Error>> {
    let tracker = workspace.tracker()?;
    let previous = tracker.marker();
    tracker.reset()?;
    tracing::info!(previous = previous.last_version, "sync point cleared");
    println!(
        "Cleared sync point (was version {}, synced at {})",
        previous.last_version, previous.last_synced_at
    );
    Ok(())
}
