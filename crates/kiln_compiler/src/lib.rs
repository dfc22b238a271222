//! Compilation orchestration for one source set.
//!
//! [`compile`] runs the pipeline: resolve candidate sources, decide which are
//! stale against the previous build state, build the compiler arguments,
//! invoke the compiler in-process or as a forked process, apply the failure
//! policy, and persist the new state.

#![warn(missing_docs)]

pub mod args;
pub mod compile;
pub mod error;
pub mod host;
pub mod invoke;
pub mod policy;

pub use args::{build, CompileUnit, CompilerArguments, DEFAULT_LEVEL_WARNING};
pub use compile::{compile, CompileContext, Outcome, OutcomeStatus};
pub use error::CompileError;
pub use host::{
    ArtifactManager, InMemoryArtifacts, JavaHomeToolchain, NoToolchains, StaticToolchain,
    ToolchainManager, JAVA_HOME,
};
pub use invoke::{
    resolve_executable, Compiler, CompilerManager, InvocationMode, InvocationResult, Invoker,
    DEFAULT_COMMAND_LINE_LIMIT,
};
pub use policy::{report, FailurePolicy, Verdict};

/// Version recorded in build state files; a different version forces a
/// full rebuild.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
