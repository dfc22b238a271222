//! Shared foundational types used across the Kiln compilation core.
//!
//! This crate provides content hashing for change detection, the output mode
//! and staleness strategy shared by configuration and the build-state cache,
//! and path normalisation helpers.

#![warn(missing_docs)]

pub mod hash;
pub mod output;
pub mod path;

pub use hash::{ContentHash, ParseHashError};
pub use output::{OutputMode, Staleness};
pub use path::{dedup_paths, normalize_lexically, to_slash};
