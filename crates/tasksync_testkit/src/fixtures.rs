//! Test fixtures and store helpers.
//!
//! Provides a snapshot builder with short-hand entity constructors and
//! temporary file-backed stores that clean up after themselves.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tasksync_model::{
    Category, PomodoroMode, PomodoroSession, Snapshot, Subcategory, Task, TimeBlock, Timestamp,
};
use tasksync_store::{FileMetadataStore, FileSnapshotStore, VersionTracker};
use tempfile::TempDir;

/// Category id given to tasks built by [`SnapshotBuilder::task`].
pub const DEFAULT_CATEGORY: &str = "work";

/// Fluent builder for snapshots used in tests.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// Starts from an empty snapshot at version 0.
    pub fn new() -> Self {
        Self {
            snapshot: Snapshot::empty(),
        }
    }

    /// Starts from an existing snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Sets the version.
    pub fn version(mut self, version: u64) -> Self {
        self.snapshot.version = version;
        self
    }

    /// Sets `last_modified`.
    pub fn last_modified(mut self, at: Timestamp) -> Self {
        self.snapshot.last_modified = at;
        self
    }

    /// Adds an open task in [`DEFAULT_CATEGORY`].
    pub fn task(self, id: &str, created_at: Timestamp) -> Self {
        self.with_task(Task::with_id(id, format!("Task {id}"), DEFAULT_CATEGORY, created_at))
    }

    /// Adds a task completed at `completed_at`.
    pub fn completed_task(self, id: &str, created_at: Timestamp, completed_at: Timestamp) -> Self {
        let mut task = Task::with_id(id, format!("Task {id}"), DEFAULT_CATEGORY, created_at);
        task.set_completed(true, completed_at);
        self.with_task(task)
    }

    /// Adds an arbitrary task.
    pub fn with_task(mut self, task: Task) -> Self {
        self.snapshot.tasks.push(task);
        self
    }

    /// Adds a category without subcategories.
    pub fn category(mut self, id: &str) -> Self {
        self.snapshot
            .categories
            .push(Category::new(id, id.to_uppercase(), "#3366ff"));
        self
    }

    /// Adds a subcategory to an existing category, creating the category if
    /// needed.
    pub fn subcategory(mut self, category_id: &str, id: &str) -> Self {
        if self.snapshot.category(category_id).is_none() {
            self = self.category(category_id);
        }
        if let Some(category) = self
            .snapshot
            .categories
            .iter_mut()
            .find(|c| c.id == category_id)
        {
            category.subcategories.push(Subcategory {
                id: id.to_string(),
                name: id.to_string(),
                category_id: category_id.to_string(),
            });
        }
        self
    }

    /// Adds a time block holding `task_ids`.
    pub fn time_block(mut self, id: &str, created_at: Timestamp, task_ids: &[&str]) -> Self {
        let mut block = TimeBlock::new(id, format!("Block {id}"), created_at);
        block.task_ids = task_ids.iter().map(|t| t.to_string()).collect();
        self.snapshot.time_blocks.push(block);
        self
    }

    /// Marks a block as active.
    pub fn active_block(mut self, id: &str) -> Self {
        self.snapshot.active_block_id = Some(id.to_string());
        self
    }

    /// Adds a 25 minute work session.
    pub fn session(mut self, id: &str, start_time: Timestamp) -> Self {
        self.snapshot.pomodoro_sessions.push(PomodoroSession {
            id: id.to_string(),
            start_time,
            end_time: start_time + 25 * 60 * 1000,
            mode: PomodoroMode::Work,
            category_id: None,
        });
        self
    }

    /// Adds a completion date (`YYYY-MM-DD`).
    pub fn completion_date(mut self, date: &str) -> Self {
        self.snapshot.streak.completion_dates.push(date.to_string());
        self
    }

    /// Sets the streak counters.
    pub fn streak(mut self, current: u32, longest: u32) -> Self {
        self.snapshot.streak.current_streak = current;
        self.snapshot.streak.longest_streak = longest;
        self
    }

    /// Adds a chain template.
    pub fn chain_template(mut self, id: &str, body: Value) -> Self {
        self.snapshot.chain_data.templates.insert(id.to_string(), body);
        self
    }

    /// Finishes the snapshot.
    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

/// A snapshot with `count` open tasks (`t1`..`tN`) at `version`.
pub fn snapshot_with_tasks(count: usize, version: u64, last_modified: Timestamp) -> Snapshot {
    (1..=count)
        .fold(
            SnapshotBuilder::new()
                .version(version)
                .last_modified(last_modified)
                .category(DEFAULT_CATEGORY),
            |builder, n| builder.task(&format!("t{n}"), last_modified),
        )
        .build()
}

/// File-backed snapshot and metadata stores in a temporary directory.
///
/// The directory is removed when the value is dropped.
pub struct TempStores {
    dir: TempDir,
}

impl TempStores {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// The directory holding the store files.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.path().join("snapshot.json")
    }

    /// Path of the metadata file.
    pub fn metadata_path(&self) -> PathBuf {
        self.dir.path().join("metadata.json")
    }

    /// Opens the snapshot store. Reopening sees earlier writes.
    pub fn snapshot_store(&self) -> FileSnapshotStore {
        FileSnapshotStore::open(&self.snapshot_path()).expect("Failed to open snapshot store")
    }

    /// Opens the metadata store.
    pub fn metadata_store(&self) -> FileMetadataStore {
        FileMetadataStore::open(&self.metadata_path()).expect("Failed to open metadata store")
    }

    /// Opens a version tracker over the metadata store.
    pub fn tracker(&self) -> VersionTracker {
        VersionTracker::new(self.metadata_store())
    }
}

impl Default for TempStores {
    fn default() -> Self {
        Self::new()
    }
}
