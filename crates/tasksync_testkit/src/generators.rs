//! Property-based test generators using proptest.
//!
//! Ids are drawn from small pools so two independently generated snapshots
//! overlap often enough to exercise the merge paths for shared entities.
//! Within one snapshot ids are unique, as in real data.

use proptest::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tasksync_model::{
    Category, PomodoroMode, PomodoroSession, Snapshot, StreakData, Subcategory, Task, TimeBlock,
    Timestamp,
};
use tasksync_store::SyncMarker;

/// Upper bound (exclusive) of generated timestamps.
pub const MAX_TIME: Timestamp = 1_000;

/// Size of the task id pool.
pub const TASK_POOL: u8 = 8;

/// Strategy for timestamps in `0..MAX_TIME`.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    0..MAX_TIME
}

/// Strategy for task ids from the shared pool.
pub fn task_id_strategy() -> impl Strategy<Value = String> {
    (0..TASK_POOL).prop_map(task_id)
}

fn task_id(n: u8) -> String {
    format!("t{n}")
}

/// Strategy for a task with the given id.
///
/// `completed_at` is never earlier than `created_at`, and is set exactly
/// when the task is completed.
pub fn task_strategy(id: String) -> impl Strategy<Value = Task> {
    (
        timestamp_strategy(),
        prop::option::of(0..MAX_TIME),
        prop::option::of("[a-z ]{0,12}"),
    )
        .prop_map(move |(created_at, completed_after, notes)| {
            let mut task = Task::with_id(id.clone(), format!("Task {id}"), "work", created_at);
            if let Some(after) = completed_after {
                task.set_completed(true, created_at + after);
            }
            task.notes = notes;
            task
        })
}

fn tasks_strategy() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::btree_set(0..TASK_POOL, 0..6).prop_flat_map(|ids| {
        ids.into_iter()
            .map(|n| task_strategy(task_id(n)))
            .collect::<Vec<_>>()
    })
}

fn categories_strategy() -> impl Strategy<Value = Vec<Category>> {
    prop::collection::btree_map(0u8..4, prop::collection::btree_set(0u8..4, 0..3), 0..4).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(n, subs)| {
                    let id = format!("c{n}");
                    let mut category = Category::new(id.clone(), format!("Category {n}"), "#888888");
                    category.subcategories = subs
                        .into_iter()
                        .map(|s| Subcategory {
                            id: format!("{id}-s{s}"),
                            name: format!("Sub {s}"),
                            category_id: id.clone(),
                        })
                        .collect();
                    category
                })
                .collect()
        },
    )
}

/// Strategy for time blocks with unique ids `b0`..`b3`.
pub fn time_blocks_strategy() -> impl Strategy<Value = Vec<TimeBlock>> {
    prop::collection::btree_map(
        0u8..4,
        (timestamp_strategy(), prop::collection::btree_set(0..TASK_POOL, 0..5)),
        0..4,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(n, (created_at, members))| {
                let mut block = TimeBlock::new(format!("b{n}"), format!("Block {n}"), created_at);
                block.task_ids = members.into_iter().map(task_id).collect();
                block
            })
            .collect()
    })
}

fn sessions_strategy() -> impl Strategy<Value = Vec<PomodoroSession>> {
    prop::collection::btree_map(0u8..6, timestamp_strategy(), 0..4).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(n, start_time)| PomodoroSession {
                id: format!("p{n}"),
                start_time,
                end_time: start_time + 25,
                mode: PomodoroMode::Work,
                category_id: None,
            })
            .collect()
    })
}

fn streak_strategy() -> impl Strategy<Value = StreakData> {
    (prop::collection::btree_set(1u8..29, 0..6), 0u32..10, 0u32..20).prop_map(
        |(days, current, longest)| StreakData {
            completion_dates: days
                .into_iter()
                .map(|d| format!("2024-02-{d:02}"))
                .collect(),
            current_streak: current,
            longest_streak: longest.max(current),
        },
    )
}

fn templates_strategy() -> impl Strategy<Value = BTreeMap<String, serde_json::Value>> {
    prop::collection::btree_map(0u8..4, any::<u8>(), 0..3).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(n, steps)| (format!("tpl{n}"), json!({ "steps": steps })))
            .collect()
    })
}

/// Strategy for well-formed snapshots.
pub fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    (
        tasks_strategy(),
        categories_strategy(),
        time_blocks_strategy(),
        sessions_strategy(),
        streak_strategy(),
        templates_strategy(),
        0u64..20,
        timestamp_strategy(),
        any::<bool>(),
    )
        .prop_map(
            |(tasks, categories, time_blocks, sessions, streak, templates, version, modified, active)| {
                let active_block_id = if active {
                    time_blocks.first().map(|b| b.id.clone())
                } else {
                    None
                };
                let mut snapshot = Snapshot::empty();
                snapshot.tasks = tasks;
                snapshot.categories = categories;
                snapshot.time_blocks = time_blocks;
                snapshot.active_block_id = active_block_id;
                snapshot.pomodoro_sessions = sessions;
                snapshot.streak = streak;
                snapshot.chain_data.templates = templates;
                snapshot.version = version;
                snapshot.last_modified = modified;
                snapshot
            },
        )
}

/// Strategy for an optional snapshot, `None` about one time in four.
pub fn maybe_snapshot_strategy() -> impl Strategy<Value = Option<Snapshot>> {
    prop_oneof![
        1 => Just(None),
        3 => snapshot_strategy().prop_map(Some),
    ]
}

/// Strategy for tracker markers, including the never-synced marker.
pub fn marker_strategy() -> impl Strategy<Value = SyncMarker> {
    prop_oneof![
        1 => Just(SyncMarker::never()),
        4 => (0u64..20, timestamp_strategy())
            .prop_map(|(version, at)| SyncMarker::new(version, at)),
    ]
}

/// Task ids present in `snapshot`.
pub fn task_ids(snapshot: &Snapshot) -> BTreeSet<String> {
    snapshot.tasks.iter().map(|t| t.id.clone()).collect()
}
