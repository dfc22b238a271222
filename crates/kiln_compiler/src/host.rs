//! Capabilities the embedding host provides to the compilation core.
//!
//! The core never loads project models or resolves toolchains itself; it
//! asks the host through these traits. In-memory implementations are
//! provided for simple hosts and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use kiln_config::ArtifactId;
use tracing::debug;

use crate::invoke::find_in_dirs;

/// Environment variable naming the installed JDK.
pub const JAVA_HOME: &str = "JAVA_HOME";

/// Records where a project artifact's built output lives.
pub trait ArtifactManager {
    /// Returns the path registered for `artifact`, if any.
    fn path(&self, artifact: &ArtifactId) -> Option<PathBuf>;

    /// Registers `path` as the built output of `artifact`.
    fn set_path(&self, artifact: &ArtifactId, path: &Path);
}

/// Locates tools provided by an installed toolchain.
pub trait ToolchainManager {
    /// Returns the executable of `tool` (a compiler id), if the toolchain
    /// provides it.
    fn find_tool(&self, tool: &str) -> Option<PathBuf>;
}

/// An [`ArtifactManager`] that keeps registrations in memory.
#[derive(Debug, Default)]
pub struct InMemoryArtifacts {
    paths: Mutex<HashMap<ArtifactId, PathBuf>>,
}

impl InMemoryArtifacts {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactManager for InMemoryArtifacts {
    fn path(&self, artifact: &ArtifactId) -> Option<PathBuf> {
        let paths = self.paths.lock().unwrap_or_else(|e| e.into_inner());
        paths.get(artifact).cloned()
    }

    fn set_path(&self, artifact: &ArtifactId, path: &Path) {
        let mut paths = self.paths.lock().unwrap_or_else(|e| e.into_inner());
        paths.insert(artifact.clone(), path.to_path_buf());
    }
}

/// A [`ToolchainManager`] with no toolchains installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoToolchains;

impl ToolchainManager for NoToolchains {
    fn find_tool(&self, _tool: &str) -> Option<PathBuf> {
        None
    }
}

/// A [`ToolchainManager`] backed by a fixed tool table.
#[derive(Debug, Default, Clone)]
pub struct StaticToolchain {
    tools: HashMap<String, PathBuf>,
}

impl StaticToolchain {
    /// Creates an empty toolchain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool.
    pub fn with_tool(mut self, tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(tool.into(), path.into());
        self
    }
}

impl ToolchainManager for StaticToolchain {
    fn find_tool(&self, tool: &str) -> Option<PathBuf> {
        self.tools.get(tool).cloned()
    }
}

/// A [`ToolchainManager`] that finds tools in `<home>/bin`, where home is
/// usually `JAVA_HOME`.
#[derive(Debug, Default, Clone)]
pub struct JavaHomeToolchain {
    home: Option<PathBuf>,
}

impl JavaHomeToolchain {
    /// Uses `home`, or nothing when `None`.
    pub fn new(home: Option<PathBuf>) -> Self {
        Self { home }
    }

    /// Reads the home directory from `JAVA_HOME`; an unset or empty
    /// variable provides no tools.
    pub fn from_env() -> Self {
        let home = std::env::var_os(JAVA_HOME)
            .filter(|h| !h.is_empty())
            .map(PathBuf::from);
        if let Some(home) = &home {
            debug!(home = %home.display(), "using {JAVA_HOME} toolchain");
        }
        Self::new(home)
    }
}

impl ToolchainManager for JavaHomeToolchain {
    fn find_tool(&self, tool: &str) -> Option<PathBuf> {
        let bin = self.home.as_ref()?.join("bin");
        find_in_dirs(tool, vec![bin])
    }
}
