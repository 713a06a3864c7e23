//! Task entity.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single task.
///
/// `id` and `created_at` never change after creation. `completed_at` is set
/// if and only if `completed` is true; use [`Task::set_completed`] to keep
/// the two in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique, immutable identifier.
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Owning category.
    #[serde(default)]
    pub category_id: String,
    /// Optional subcategory within the owning category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory_id: Option<String>,
    /// Whether the task is done.
    #[serde(default)]
    pub completed: bool,
    /// When the task was completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Relative size of the task.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Due date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Creation time, immutable.
    #[serde(default)]
    pub created_at: Timestamp,
    /// Ids of tasks this one depends on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    /// Minutes actually spent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<u32>,
}

fn default_weight() -> f64 {
    1.0
}

impl Task {
    /// Creates a new open task with a random id.
    pub fn new(title: impl Into<String>, category_id: impl Into<String>, now: Timestamp) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, category_id, now)
    }

    /// Creates a new open task with the given id.
    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        category_id: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category_id: category_id.into(),
            subcategory_id: None,
            completed: false,
            completed_at: None,
            weight: default_weight(),
            notes: None,
            due_date: None,
            created_at: now,
            depends_on: None,
            actual_duration: None,
        }
    }

    /// Marks the task completed (or reopens it), maintaining `completed_at`.
    pub fn set_completed(&mut self, completed: bool, now: Timestamp) {
        self.completed = completed;
        self.completed_at = if completed { Some(now) } else { None };
    }

    /// Returns true if `completed_at` agrees with `completed`.
    pub fn completion_is_consistent(&self) -> bool {
        self.completed == self.completed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_open() {
        let task = Task::new("Write report", "work", 100);
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.created_at, 100);
        assert_eq!(task.weight, 1.0);
        assert!(!task.id.is_empty());
    }

    #[test]
    fn set_completed_maintains_timestamp() {
        let mut task = Task::with_id("t1", "Write report", "work", 100);

        task.set_completed(true, 250);
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(250));
        assert!(task.completion_is_consistent());

        task.set_completed(false, 300);
        assert_eq!(task.completed_at, None);
        assert!(task.completion_is_consistent());
    }

    #[test]
    fn decode_with_missing_optional_fields() {
        let json = r#"{"id":"t1","title":"Read","categoryId":"c1","createdAt":5}"#;
        let task: Task = serde_json::from_str(json).unwrap();

        assert_eq!(task.id, "t1");
        assert_eq!(task.weight, 1.0);
        assert!(task.depends_on.is_none());
    }

    #[test]
    fn encode_skips_absent_fields() {
        let task = Task::with_id("t1", "Read", "c1", 5);
        let json = serde_json::to_string(&task).unwrap();

        assert!(json.contains("\"categoryId\":\"c1\""));
        assert!(!json.contains("completedAt"));
        assert!(!json.contains("dependsOn"));
    }
}
