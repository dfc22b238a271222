//! Classpath and argument assembly.
//!
//! [`build`] turns a [`CompileUnit`] and its [`CompilerConfig`] into
//! structured [`CompilerArguments`], which in-process compilers consume
//! directly and forked compilers receive as a command line.

use std::path::{Path, PathBuf};

use kiln_common::{dedup_paths, OutputMode};
use kiln_config::{CompilerConfig, DEFAULT_SOURCE, DEFAULT_TARGET};
use tracing::warn;

use crate::error::CompileError;

/// Emitted once per invocation when no language level is configured.
pub const DEFAULT_LEVEL_WARNING: &str =
    "no explicit value set for target or release; set `release` (or `source` and `target`) \
     in [compiler] to keep builds reproducible across kiln upgrades";

#[cfg(windows)]
const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: &str = ":";

/// The files submitted in one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileUnit {
    /// Source roots, passed as the source path.
    pub roots: Vec<PathBuf>,
    /// Stale sources to compile, in candidate order.
    pub sources: Vec<PathBuf>,
    /// Directory receiving the outputs.
    pub destination: PathBuf,
}

/// Everything a compiler needs for one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerArguments {
    /// Output directory.
    pub destination: PathBuf,
    /// Classpath, de-duplicated, in resolution order.
    pub classpath: Vec<PathBuf>,
    /// Source roots.
    pub sourcepath: Vec<PathBuf>,
    /// Annotation processor path, de-duplicated.
    pub processor_path: Vec<PathBuf>,
    /// Run annotation processors.
    pub annotation_processing: bool,
    /// Emit debug information.
    pub debug: bool,
    /// Report warnings.
    pub show_warnings: bool,
    /// Report deprecated API usage in detail.
    pub show_deprecation: bool,
    /// Source file encoding.
    pub encoding: Option<String>,
    /// `-source` level.
    pub source: Option<String>,
    /// `-target` level.
    pub target: Option<String>,
    /// `--release` level.
    pub release: Option<String>,
    /// Per-source or aggregate outputs.
    pub output_mode: OutputMode,
    /// Extra arguments, unmodified.
    pub extra: Vec<String>,
    /// Sources to compile.
    pub sources: Vec<PathBuf>,
    /// Warnings raised while building the arguments.
    pub warnings: Vec<String>,
}

impl CompilerArguments {
    /// Renders the arguments as a compiler command line, without the
    /// executable.
    pub fn to_command_line(&self) -> Vec<String> {
        let mut line = vec!["-d".to_string(), display(&self.destination)];

        if !self.classpath.is_empty() {
            line.push("-classpath".to_string());
            line.push(join_paths(&self.classpath));
        }
        if !self.sourcepath.is_empty() {
            line.push("-sourcepath".to_string());
            line.push(join_paths(&self.sourcepath));
        }
        if !self.processor_path.is_empty() {
            line.push("--processor-path".to_string());
            line.push(join_paths(&self.processor_path));
        }
        if !self.annotation_processing {
            line.push("-proc:none".to_string());
        }
        if self.debug {
            line.push("-g".to_string());
        }
        if !self.show_warnings {
            line.push("-nowarn".to_string());
        }
        if self.show_deprecation {
            line.push("-deprecation".to_string());
        }
        if let Some(encoding) = &self.encoding {
            line.push("-encoding".to_string());
            line.push(encoding.clone());
        }

        if let Some(release) = &self.release {
            line.push("--release".to_string());
            line.push(release.clone());
        } else {
            if let Some(source) = &self.source {
                line.push("-source".to_string());
                line.push(source.clone());
            }
            if let Some(target) = &self.target {
                line.push("-target".to_string());
                line.push(target.clone());
            }
        }

        line.extend(self.extra.iter().cloned());
        line.extend(self.sources.iter().map(|s| display(s)));
        line
    }
}

/// Builds the arguments for `unit`.
///
/// Classpath and processor path keep their first occurrence of each entry.
/// When `release` is set only `--release` is passed; otherwise the
/// configured `source`/`target` are passed as-is, and only if none of the
/// three is set do both defaults apply, with a warning.
pub fn build(unit: &CompileUnit, config: &CompilerConfig) -> CompilerArguments {
    let base = std::env::current_dir().unwrap_or_default();
    let mut warnings = Vec::new();

    let level = &config.level;
    let (source, target, release) = if let Some(release) = &level.release {
        (None, None, Some(release.clone()))
    } else if level.is_unset() {
        warn!("{DEFAULT_LEVEL_WARNING}");
        warnings.push(DEFAULT_LEVEL_WARNING.to_string());
        (
            Some(DEFAULT_SOURCE.to_string()),
            Some(DEFAULT_TARGET.to_string()),
            None,
        )
    } else {
        (level.source.clone(), level.target.clone(), None)
    };

    CompilerArguments {
        destination: unit.destination.clone(),
        classpath: dedup_paths(&config.classpath, &base),
        sourcepath: dedup_paths(&unit.roots, &base),
        processor_path: dedup_paths(&config.processor_path, &base),
        annotation_processing: config.annotation_processing,
        debug: config.debug,
        show_warnings: config.show_warnings,
        show_deprecation: config.show_deprecation,
        encoding: config.encoding.clone(),
        source,
        target,
        release,
        output_mode: config.output_mode.clone(),
        extra: config.args.clone(),
        sources: unit.sources.clone(),
        warnings,
    }
}

/// Creates the destination directory and its parents.
///
/// Called only when there is something to compile.
pub fn prepare_destination(destination: &Path) -> Result<(), CompileError> {
    std::fs::create_dir_all(destination).map_err(|e| CompileError::Io {
        path: destination.to_path_buf(),
        source: e,
    })
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| display(p))
        .collect::<Vec<_>>()
        .join(PATH_LIST_SEPARATOR)
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
