//! # TaskSync Model
//!
//! Snapshot data model and JSON wire codec for TaskSync.
//!
//! This crate provides:
//! - [`Snapshot`], the unit of synchronization
//! - The entity types it carries ([`Task`], [`Category`], [`TimeBlock`],
//!   [`PomodoroSession`], [`StreakData`], [`ChainData`])
//! - JSON encoding/decoding of the wire format
//!
//! This is a pure model crate with no I/O operations.
//!
//! ## Wire format
//!
//! A snapshot is a JSON object with camelCase keys. `version` is an integer
//! and `lastModified` is epoch milliseconds:
//!
//! ```rust
//! use tasksync_model::Snapshot;
//!
//! let json = r#"{"tasks":[],"categories":[],"version":3,"lastModified":1700000000000}"#;
//! let snapshot = Snapshot::from_json(json.as_bytes()).unwrap();
//! assert_eq!(snapshot.version, 3);
//! assert!(snapshot.is_blank());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entities;
mod error;
mod snapshot;
mod task;
mod time;

pub use entities::{
    Category, ChainData, PomodoroMode, PomodoroSession, StreakData, Subcategory, TimeBlock,
};
pub use error::{ModelError, ModelResult};
pub use snapshot::{next_version, Snapshot};
pub use task::Task;
pub use time::{now_millis, Timestamp};
