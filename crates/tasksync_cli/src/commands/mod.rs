//! CLI command implementations.

pub mod inspect;
pub mod reset;
pub mod status;
pub mod sync;
