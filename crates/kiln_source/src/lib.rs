//! Source set resolution: include/exclude matching and source-root traversal.
//!
//! [`PatternSet`] evaluates glob-style include/exclude rules against
//! root-relative paths, and [`resolve`] walks the configured
//! [`SourceRoot`]s to produce the [`CandidateFile`]s of one compilation unit.

#![warn(missing_docs)]

pub mod error;
pub mod pattern;
pub mod resolver;

pub use error::ResolveError;
pub use pattern::{default_include, PatternSet};
pub use resolver::{resolve, CandidateFile, SourceRole, SourceRoot};
