//! The snapshot: the complete task-management state exchanged during sync.

use crate::entities::{Category, ChainData, PomodoroSession, StreakData, TimeBlock};
use crate::error::{ModelError, ModelResult};
use crate::task::Task;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// The complete application state, synchronized as a whole.
///
/// # Invariants
///
/// - `version` strictly increases on every successful push
/// - entity ids are unique within each collection
/// - every task satisfies `completed_at.is_some() == completed`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// All tasks.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// All categories.
    #[serde(default)]
    pub categories: Vec<Category>,
    /// All time blocks.
    #[serde(default)]
    pub time_blocks: Vec<TimeBlock>,
    /// The time block currently shown as active.
    #[serde(default)]
    pub active_block_id: Option<String>,
    /// Recorded pomodoro sessions.
    #[serde(default)]
    pub pomodoro_sessions: Vec<PomodoroSession>,
    /// Completion streak.
    #[serde(default)]
    pub streak: StreakData,
    /// Chain templates, chains and chain tasks.
    #[serde(default)]
    pub chain_data: ChainData,
    /// Version assigned by the last successful push (0 = never pushed).
    #[serde(default)]
    pub version: u64,
    /// Last local modification, epoch milliseconds.
    #[serde(default)]
    pub last_modified: Timestamp,
}

impl Snapshot {
    /// Creates an empty snapshot at version 0.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the snapshot holds neither tasks nor categories.
    pub fn is_blank(&self) -> bool {
        self.tasks.is_empty() && self.categories.is_empty()
    }

    /// Looks up a task by id.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Looks up a task by id for modification.
    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Looks up a time block by id.
    pub fn time_block(&self, id: &str) -> Option<&TimeBlock> {
        self.time_blocks.iter().find(|b| b.id == id)
    }

    /// Looks up a category by id.
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Sets `last_modified`.
    pub fn touch(&mut self, now: Timestamp) {
        self.last_modified = now;
    }

    /// Returns true if both snapshots describe the same persisted state
    /// (same version and same modification time).
    pub fn same_revision(&self, other: &Snapshot) -> bool {
        self.version == other.version && self.last_modified == other.last_modified
    }

    /// Checks id uniqueness and the task completion invariant.
    pub fn validate(&self) -> ModelResult<()> {
        check_unique("task", self.tasks.iter().map(|t| t.id.as_str()))?;
        check_unique("category", self.categories.iter().map(|c| c.id.as_str()))?;
        check_unique("time block", self.time_blocks.iter().map(|b| b.id.as_str()))?;
        check_unique(
            "pomodoro session",
            self.pomodoro_sessions.iter().map(|s| s.id.as_str()),
        )?;

        if let Some(task) = self.tasks.iter().find(|t| !t.completion_is_consistent()) {
            return Err(ModelError::CompletionMismatch(task.id.clone()));
        }
        Ok(())
    }

    /// Encodes to compact JSON bytes.
    pub fn to_json(&self) -> ModelResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ModelError::Encode(e.to_string()))
    }

    /// Encodes to indented JSON.
    pub fn to_json_pretty(&self) -> ModelResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ModelError::Encode(e.to_string()))
    }

    /// Decodes from JSON bytes.
    ///
    /// The payload must be a JSON object; anything else is
    /// [`ModelError::Malformed`].
    pub fn from_json(bytes: &[u8]) -> ModelResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::malformed(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Decodes from an already parsed JSON value.
    pub fn from_value(value: Value) -> ModelResult<Self> {
        if !value.is_object() {
            return Err(ModelError::malformed("expected a JSON object"));
        }
        serde_json::from_value(value).map_err(|e| ModelError::malformed(e.to_string()))
    }

    /// Encodes to a JSON value.
    pub fn to_value(&self) -> ModelResult<Value> {
        serde_json::to_value(self).map_err(|e| ModelError::Encode(e.to_string()))
    }
}

/// The version a backend stores a pushed snapshot under.
///
/// Never below `proposed` and always above `current`, so every successful
/// push strictly increases the stored version. `None` on overflow.
pub fn next_version(current: Option<u64>, proposed: u64) -> Option<u64> {
    let floor = match current {
        Some(v) => v.checked_add(1)?,
        None => 1,
    };
    Some(proposed.max(floor))
}

fn check_unique<'a>(kind: &'static str, ids: impl Iterator<Item = &'a str>) -> ModelResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ModelError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}
