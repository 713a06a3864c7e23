//! Snapshot merge.
//!
//! Reconciles a local and a remote snapshot that both changed since the last
//! sync point. The remote snapshot is the structural base; local data is
//! layered on top per entity kind:
//!
//! | entity            | rule                                                        |
//! |-------------------|-------------------------------------------------------------|
//! | task              | add local tasks created after the sync point; carry over    |
//! |                   | local completions made after the sync point                 |
//! | category          | union by id, subcategories unioned by id                    |
//! | time block        | add local blocks created after the sync point; union the    |
//! |                   | `task_ids` of blocks present on both sides                  |
//! | pomodoro session  | append local sessions started after the sync point          |
//! | streak            | union of dates, max of the stored counters                  |
//! | chain data        | union by key, remote wins ties                              |
//!
//! Nothing is ever removed: there are no tombstones, so a deletion on one
//! side does not propagate. Concurrent edits to other fields of a task that
//! exists on both sides are lost in favor of the remote copy, because
//! entities carry no per-field timestamps. Streak counters are not recomputed
//! from the merged dates and can under-report a streak that only becomes
//! contiguous after the union.

use crate::error::{SyncError, SyncResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tasksync_model::{
    Category, ChainData, PomodoroSession, Snapshot, StreakData, Task, TimeBlock, Timestamp,
};
use tasksync_store::SyncMarker;

/// What a merge combined, for logs and the conflict review UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeInfo {
    /// Local tasks inserted into the remote base.
    pub tasks_added: Vec<String>,
    /// Tasks whose local completion was carried over.
    pub completions_applied: Vec<String>,
    /// Local-only categories added.
    pub categories_added: Vec<String>,
    /// Local-only subcategories added to shared categories.
    pub subcategories_added: Vec<String>,
    /// Local-only time blocks added.
    pub time_blocks_added: Vec<String>,
    /// Shared time blocks whose task set grew.
    pub time_blocks_extended: Vec<String>,
    /// Local pomodoro sessions appended.
    pub sessions_added: Vec<String>,
    /// Completion dates only known locally.
    pub completion_dates_added: Vec<String>,
    /// Chain templates, chains and chain tasks added.
    pub chain_entries_added: usize,
}

impl MergeInfo {
    /// Returns true if the local side contributed nothing.
    pub fn is_empty(&self) -> bool {
        self.tasks_added.is_empty()
            && self.completions_applied.is_empty()
            && self.categories_added.is_empty()
            && self.subcategories_added.is_empty()
            && self.time_blocks_added.is_empty()
            && self.time_blocks_extended.is_empty()
            && self.sessions_added.is_empty()
            && self.completion_dates_added.is_empty()
            && self.chain_entries_added == 0
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no local changes merged".to_string();
        }
        let parts = [
            (self.tasks_added.len(), "task(s) added"),
            (self.completions_applied.len(), "completion(s) kept"),
            (self.categories_added.len(), "category(ies) added"),
            (self.subcategories_added.len(), "subcategory(ies) added"),
            (self.time_blocks_added.len(), "time block(s) added"),
            (self.time_blocks_extended.len(), "time block(s) extended"),
            (self.sessions_added.len(), "session(s) added"),
            (self.completion_dates_added.len(), "streak date(s) added"),
            (self.chain_entries_added, "chain entry(ies) added"),
        ];
        parts
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, label)| format!("{count} {label}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The result of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The merged snapshot.
    pub merged: Snapshot,
    /// What was combined.
    pub info: MergeInfo,
}

/// Merges `local` into `remote`.
///
/// `marker.last_synced_at` separates local changes made since the last sync
/// from stale local state. The merged snapshot gets
/// `version = max(remote.version, marker.last_version) + 1` and
/// `last_modified = now`. The result depends only on the arguments, so
/// merging the same inputs twice yields identical snapshots.
///
/// # Errors
///
/// Returns [`SyncError::VersionOverflow`] if the next version does not fit.
pub fn merge(
    local: &Snapshot,
    remote: &Snapshot,
    marker: SyncMarker,
    now: Timestamp,
) -> SyncResult<MergeOutcome> {
    let since = marker.last_synced_at;
    let mut info = MergeInfo::default();

    let version = remote
        .version
        .max(marker.last_version)
        .checked_add(1)
        .ok_or(SyncError::VersionOverflow)?;

    let tasks = merge_tasks(&local.tasks, &remote.tasks, since, &mut info);
    let categories = merge_categories(&local.categories, &remote.categories, &mut info);
    let time_blocks = merge_time_blocks(&local.time_blocks, &remote.time_blocks, since, &mut info);
    let pomodoro_sessions = merge_sessions(
        &local.pomodoro_sessions,
        &remote.pomodoro_sessions,
        since,
        &mut info,
    );
    let streak = merge_streak(&local.streak, &remote.streak, &mut info);
    let chain_data = merge_chain_data(&local.chain_data, &remote.chain_data, &mut info);

    let active_block_id = remote.active_block_id.clone().or_else(|| {
        local
            .active_block_id
            .clone()
            .filter(|id| time_blocks.iter().any(|b| &b.id == id))
    });

    let merged = Snapshot {
        tasks,
        categories,
        time_blocks,
        active_block_id,
        pomodoro_sessions,
        streak,
        chain_data,
        version,
        last_modified: now,
    };

    Ok(MergeOutcome { merged, info })
}

fn merge_tasks(local: &[Task], remote: &[Task], since: Timestamp, info: &mut MergeInfo) -> Vec<Task> {
    let mut merged = remote.to_vec();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(merged.len());
    for (pos, task) in merged.iter().enumerate() {
        index.entry(task.id.clone()).or_insert(pos);
    }

    for task in local {
        match index.get(&task.id) {
            Some(&pos) => {
                let base = &mut merged[pos];
                let completed_since = task.completed_at.is_some_and(|at| at > since);
                if task.completed && !base.completed && completed_since {
                    base.completed = true;
                    base.completed_at = task.completed_at;
                    info.completions_applied.push(task.id.clone());
                }
            }
            None if task.created_at > since => {
                index.insert(task.id.clone(), merged.len());
                merged.push(task.clone());
                info.tasks_added.push(task.id.clone());
            }
            None => {}
        }
    }
    merged
}

fn merge_categories(local: &[Category], remote: &[Category], info: &mut MergeInfo) -> Vec<Category> {
    let mut merged = remote.to_vec();

    for category in local {
        match merged.iter_mut().find(|c| c.id == category.id) {
            Some(base) => {
                for sub in &category.subcategories {
                    if !base.subcategories.iter().any(|s| s.id == sub.id) {
                        base.subcategories.push(sub.clone());
                        info.subcategories_added.push(sub.id.clone());
                    }
                }
            }
            None => {
                merged.push(category.clone());
                info.categories_added.push(category.id.clone());
            }
        }
    }
    merged
}

fn merge_time_blocks(
    local: &[TimeBlock],
    remote: &[TimeBlock],
    since: Timestamp,
    info: &mut MergeInfo,
) -> Vec<TimeBlock> {
    let mut merged = remote.to_vec();

    for block in local {
        match merged.iter_mut().find(|b| b.id == block.id) {
            Some(base) => {
                let (union, grew) = union_ids(&base.task_ids, &block.task_ids);
                base.task_ids = union;
                if grew {
                    info.time_blocks_extended.push(block.id.clone());
                }
            }
            None if block.created_at > since => {
                merged.push(block.clone());
                info.time_blocks_added.push(block.id.clone());
            }
            None => {}
        }
    }
    merged
}

/// Order-preserving set union: `base` order first, then new ids from `extra`.
/// Returns the union and whether `extra` contributed anything.
fn union_ids(base: &[String], extra: &[String]) -> (Vec<String>, bool) {
    let mut seen: HashSet<&str> = HashSet::with_capacity(base.len() + extra.len());
    let mut union = Vec::with_capacity(base.len() + extra.len());
    for id in base {
        if seen.insert(id.as_str()) {
            union.push(id.clone());
        }
    }
    let mut grew = false;
    for id in extra {
        if seen.insert(id.as_str()) {
            union.push(id.clone());
            grew = true;
        }
    }
    (union, grew)
}

fn merge_sessions(
    local: &[PomodoroSession],
    remote: &[PomodoroSession],
    since: Timestamp,
    info: &mut MergeInfo,
) -> Vec<PomodoroSession> {
    let mut merged = remote.to_vec();
    let mut known: HashSet<String> = remote.iter().map(|s| s.id.clone()).collect();

    for session in local {
        if session.start_time > since && known.insert(session.id.clone()) {
            merged.push(session.clone());
            info.sessions_added.push(session.id.clone());
        }
    }
    merged
}

fn merge_streak(local: &StreakData, remote: &StreakData, info: &mut MergeInfo) -> StreakData {
    let mut dates: BTreeSet<String> = remote.completion_dates.iter().cloned().collect();

    for date in &local.completion_dates {
        if dates.insert(date.clone()) {
            info.completion_dates_added.push(date.clone());
        }
    }

    StreakData {
        completion_dates: dates.into_iter().collect(),
        current_streak: local.current_streak.max(remote.current_streak),
        longest_streak: local.longest_streak.max(remote.longest_streak),
    }
}

fn merge_chain_data(local: &ChainData, remote: &ChainData, info: &mut MergeInfo) -> ChainData {
    ChainData {
        templates: union_by_key(&local.templates, &remote.templates, info),
        chains: union_by_key(&local.chains, &remote.chains, info),
        chain_tasks: union_by_key(&local.chain_tasks, &remote.chain_tasks, info),
    }
}

fn union_by_key(
    local: &BTreeMap<String, Value>,
    remote: &BTreeMap<String, Value>,
    info: &mut MergeInfo,
) -> BTreeMap<String, Value> {
    let mut merged = remote.clone();
    for (key, value) in local {
        if !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
            info.chain_entries_added += 1;
        }
    }
    merged
}
