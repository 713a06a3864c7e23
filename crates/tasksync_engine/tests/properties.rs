//! Property tests for the classifier and the merge.

use proptest::prelude::*;
use std::collections::BTreeSet;
use tasksync_engine::{classify, merge, SyncAction};
use tasksync_model::Snapshot;
use tasksync_store::SyncMarker;
use tasksync_testkit::generators::*;

const NOW: i64 = 5_000;

fn merged(local: &Snapshot, remote: &Snapshot, marker: SyncMarker) -> Snapshot {
    merge(local, remote, marker, NOW).unwrap().merged
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn merge_is_deterministic(
        local in snapshot_strategy(),
        remote in snapshot_strategy(),
        marker in marker_strategy(),
    ) {
        let first = merge(&local, &remote, marker, NOW).unwrap();
        let second = merge(&local, &remote, marker, NOW).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn merging_again_changes_nothing(
        local in snapshot_strategy(),
        remote in snapshot_strategy(),
        marker in marker_strategy(),
    ) {
        let once = merged(&local, &remote, marker);
        let twice = merged(&local, &once, marker);
        prop_assert_eq!(&twice.tasks, &once.tasks);
        prop_assert_eq!(&twice.categories, &once.categories);
        prop_assert_eq!(&twice.time_blocks, &once.time_blocks);
        prop_assert_eq!(&twice.pomodoro_sessions, &once.pomodoro_sessions);
        prop_assert_eq!(&twice.streak, &once.streak);
        prop_assert_eq!(&twice.chain_data, &once.chain_data);
    }

    #[test]
    fn time_block_members_only_grow(
        local in snapshot_strategy(),
        remote in snapshot_strategy(),
        marker in marker_strategy(),
    ) {
        let result = merged(&local, &remote, marker);
        for block in &result.time_blocks {
            let members: BTreeSet<&String> = block.task_ids.iter().collect();
            for side in [&local, &remote] {
                if let Some(before) = side.time_block(&block.id) {
                    for id in &before.task_ids {
                        prop_assert!(members.contains(id), "block {} lost {}", block.id, id);
                    }
                }
            }
        }
    }

    #[test]
    fn remote_content_is_never_dropped(
        local in snapshot_strategy(),
        remote in snapshot_strategy(),
        marker in marker_strategy(),
    ) {
        let result = merged(&local, &remote, marker);
        prop_assert!(task_ids(&result).is_superset(&task_ids(&remote)));
        for category in &remote.categories {
            prop_assert!(result.category(&category.id).is_some());
        }
        for date in &remote.streak.completion_dates {
            prop_assert!(result.streak.completion_dates.contains(date));
        }
    }

    #[test]
    fn new_local_tasks_are_kept(
        local in snapshot_strategy(),
        remote in snapshot_strategy(),
        marker in marker_strategy(),
    ) {
        let result = merged(&local, &remote, marker);
        for task in &local.tasks {
            if task.created_at > marker.last_synced_at && remote.task(&task.id).is_none() {
                prop_assert_eq!(result.task(&task.id), Some(task));
            }
        }
    }

    #[test]
    fn recent_local_completions_win(
        local in snapshot_strategy(),
        remote in snapshot_strategy(),
        marker in marker_strategy(),
    ) {
        let result = merged(&local, &remote, marker);
        for task in &local.tasks {
            let recent = task.completed_at.is_some_and(|at| at > marker.last_synced_at);
            if task.completed && recent {
                if let Some(theirs) = remote.task(&task.id) {
                    let ours = result.task(&task.id).unwrap();
                    prop_assert!(ours.completed);
                    if !theirs.completed {
                        prop_assert_eq!(ours.completed_at, task.completed_at);
                    }
                }
            }
        }
        prop_assert!(result.validate().is_ok());
    }

    #[test]
    fn merged_version_is_above_both_sides(
        local in snapshot_strategy(),
        remote in snapshot_strategy(),
        marker in marker_strategy(),
    ) {
        let result = merged(&local, &remote, marker);
        prop_assert_eq!(result.version, remote.version.max(marker.last_version) + 1);
        prop_assert_eq!(result.last_modified, NOW);
    }

    #[test]
    fn classification_is_total(
        local in maybe_snapshot_strategy(),
        remote in maybe_snapshot_strategy(),
        marker in marker_strategy(),
    ) {
        let action = classify(local.as_ref(), remote.as_ref(), marker);
        let expected_kind = match (&local, &remote) {
            (None, None) => Some(SyncAction::Noop),
            (Some(_), None) => Some(SyncAction::UploadOnly),
            (None, Some(_)) => Some(SyncAction::TakeRemote),
            _ => None,
        };
        if let Some(expected) = expected_kind {
            prop_assert_eq!(action, expected);
        }
        if action == SyncAction::Merge {
            prop_assert!(marker.last_synced_at > 0);
            prop_assert!(remote.as_ref().unwrap().version > marker.last_version);
        }
        prop_assert_eq!(action, classify(local.as_ref(), remote.as_ref(), marker));
    }
}
