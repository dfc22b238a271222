//! Parsing and validation of `kiln.toml` project configuration files.
//!
//! This crate reads the project configuration file into a strongly-typed
//! [`ProjectConfig`] and resolves it, per source role, into the
//! [`CompilerConfig`] value the compilation core consumes.

#![warn(missing_docs)]

pub mod compiler;
pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use compiler::{ArtifactId, CompilerConfig, LanguageLevel, DEFAULT_SOURCE, DEFAULT_TARGET};
pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::resolve_unit;
pub use types::*;
