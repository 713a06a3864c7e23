//! Conflict classification.
//!
//! Maps a (local, remote, marker) triple to exactly one [`SyncAction`].

use std::fmt;
use tasksync_model::Snapshot;
use tasksync_store::SyncMarker;

/// What a sync cycle does with the local and remote snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    /// Nothing to do.
    Noop,
    /// Push the local snapshot.
    UploadOnly,
    /// Replace the local snapshot with the remote one.
    TakeRemote,
    /// Both sides changed since the sync point; merge them.
    Merge,
}

impl SyncAction {
    /// Stable lowercase name, used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Noop => "noop",
            SyncAction::UploadOnly => "upload-only",
            SyncAction::TakeRemote => "take-remote",
            SyncAction::Merge => "merge",
        }
    }

    /// Returns true if the action writes to the remote.
    pub fn pushes(&self) -> bool {
        matches!(self, SyncAction::UploadOnly | SyncAction::Merge)
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides what to do with a local and a remote snapshot.
///
/// Rules, first match wins:
/// 1. no remote: upload if there is a local snapshot, otherwise nothing
/// 2. no local: take remote
/// 3. never synced (`last_version == 0`) and the remote holds real data:
///    take remote, so a new device cannot overwrite an existing remote
/// 4. remote advanced, local modified after the sync point, and a sync point
///    exists: merge
/// 5. remote advanced: take remote (local was only stale)
/// 6. newer `last_modified` wins; local winning means upload, a tie means
///    nothing to do
///
/// Rule 3 tests `last_version` rather than `last_synced_at`, so a tracker with
/// a version but no time is not treated as a fresh device.
pub fn classify(
    local: Option<&Snapshot>,
    remote: Option<&Snapshot>,
    marker: SyncMarker,
) -> SyncAction {
    let Some(remote) = remote else {
        return if local.is_some() {
            SyncAction::UploadOnly
        } else {
            SyncAction::Noop
        };
    };
    let Some(local) = local else {
        return SyncAction::TakeRemote;
    };

    if marker.last_version == 0 && remote.version > 0 && !remote.is_blank() {
        return SyncAction::TakeRemote;
    }

    let remote_advanced = remote.version > marker.last_version;
    if remote_advanced
        && local.last_modified > marker.last_synced_at
        && marker.last_synced_at > 0
    {
        return SyncAction::Merge;
    }
    if remote_advanced {
        return SyncAction::TakeRemote;
    }

    match local.last_modified.cmp(&remote.last_modified) {
        std::cmp::Ordering::Greater => SyncAction::UploadOnly,
        std::cmp::Ordering::Less => SyncAction::TakeRemote,
        std::cmp::Ordering::Equal => SyncAction::Noop,
    }
}
