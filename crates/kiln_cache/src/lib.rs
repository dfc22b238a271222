//! Incremental build state and staleness analysis.
//!
//! This crate persists what was compiled and when ([`BuildState`]), and
//! compares the current candidate files against it to decide which sources
//! must be recompiled ([`analyze`]). State handling is fail-safe: a missing,
//! corrupt, or incompatible state file means "rebuild everything", never an
//! error.

#![warn(missing_docs)]

pub mod error;
pub mod stale;
pub mod state;

pub use error::StateError;
pub use stale::{analyze, Analysis, StaleFile, StaleReason};
pub use state::{BuildState, FileRecord, STATE_FORMAT_VERSION};
