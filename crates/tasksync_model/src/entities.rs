//! Categories, time blocks, pomodoro sessions, streak and chain data.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A task category with its subcategories.
///
/// Categories carry no modification timestamp, so a merge can only add them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Display color (CSS color string).
    #[serde(default)]
    pub color: String,
    /// Subcategories belonging to this category.
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

impl Category {
    /// Creates a category without subcategories.
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
            subcategories: Vec::new(),
        }
    }
}

/// A subcategory within a [`Category`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Owning category id.
    #[serde(default)]
    pub category_id: String,
}

/// A named span of days grouping a set of tasks.
///
/// `task_ids` has set semantics and never loses a member through a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// First day (`YYYY-MM-DD`).
    #[serde(default)]
    pub start_date: String,
    /// Last day (`YYYY-MM-DD`).
    #[serde(default)]
    pub end_date: String,
    /// Tasks scheduled in this block.
    #[serde(default)]
    pub task_ids: Vec<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Timestamp,
}

impl TimeBlock {
    /// Creates an empty block.
    pub fn new(id: impl Into<String>, name: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start_date: String::new(),
            end_date: String::new(),
            task_ids: Vec::new(),
            created_at,
        }
    }

    /// Returns true if the block contains the given task.
    pub fn contains(&self, task_id: &str) -> bool {
        self.task_ids.iter().any(|id| id == task_id)
    }
}

/// Pomodoro timer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PomodoroMode {
    /// Focus period.
    #[default]
    Work,
    /// Short pause between focus periods.
    ShortBreak,
    /// Long pause after several focus periods.
    LongBreak,
}

/// A recorded pomodoro session. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    /// Unique identifier.
    pub id: String,
    /// Session start.
    #[serde(default)]
    pub start_time: Timestamp,
    /// Session end.
    #[serde(default)]
    pub end_time: Timestamp,
    /// Timer mode.
    #[serde(default)]
    pub mode: PomodoroMode,
    /// Category the session was attributed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

/// Completion streak bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakData {
    /// Days (`YYYY-MM-DD`) on which at least one task was completed.
    #[serde(default)]
    pub completion_dates: Vec<String>,
    /// Length of the streak ending today.
    #[serde(default)]
    pub current_streak: u32,
    /// Longest streak ever recorded.
    #[serde(default)]
    pub longest_streak: u32,
}

/// Chain templates, per-day chains and chain tasks.
///
/// Entries are opaque JSON objects keyed by id (or by date for `chains`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainData {
    /// Reusable chain templates.
    #[serde(default)]
    pub templates: BTreeMap<String, Value>,
    /// Chains instantiated per day.
    #[serde(default)]
    pub chains: BTreeMap<String, Value>,
    /// Tasks that only exist inside chains.
    #[serde(default)]
    pub chain_tasks: BTreeMap<String, Value>,
}

impl ChainData {
    /// Total number of entries across the three maps.
    pub fn len(&self) -> usize {
        self.templates.len() + self.chains.len() + self.chain_tasks.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
