//! # TaskSync Testkit
//!
//! Test utilities for TaskSync.
//!
//! This crate provides:
//! - Snapshot builders and canned entities
//! - Temporary file-backed stores
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use tasksync_testkit::prelude::*;
//!
//! let snapshot = SnapshotBuilder::new()
//!     .version(3)
//!     .last_modified(100)
//!     .task("t1", 50)
//!     .build();
//! assert_eq!(snapshot.tasks.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
