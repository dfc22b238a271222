//! The typed per-unit compiler configuration.
//!
//! A [`CompilerConfig`] is everything the compilation core needs to compile
//! one source set. It is produced from `kiln.toml` by
//! [`resolve_unit`](crate::resolve_unit), or built directly by hosts and
//! tests.

use std::fmt;
use std::path::PathBuf;

use kiln_common::{OutputMode, Staleness};
use kiln_source::SourceRole;

/// Source level passed when no language level is configured.
pub const DEFAULT_SOURCE: &str = "1.8";

/// Target level passed when no language level is configured.
pub const DEFAULT_TARGET: &str = "1.8";

/// Source, target, and release levels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LanguageLevel {
    /// Source language level.
    pub source: Option<String>,
    /// Target bytecode level.
    pub target: Option<String>,
    /// Release level; when set, `source` and `target` are not passed.
    pub release: Option<String>,
}

impl LanguageLevel {
    /// Returns `true` if none of the three levels is set.
    pub fn is_unset(&self) -> bool {
        self.source.is_none() && self.target.is_none() && self.release.is_none()
    }
}

/// Identifies the project artifact the main output belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactId {
    /// Artifact name.
    pub name: String,
    /// Artifact version.
    pub version: String,
}

impl ArtifactId {
    /// Creates an artifact id.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Configuration of one compilation unit.
///
/// Relative paths are taken against the current directory when the unit
/// is compiled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Main or test.
    pub role: SourceRole,
    /// Directories searched for sources.
    pub roots: Vec<PathBuf>,
    /// Include globs; empty means every file with `source_extension`.
    pub includes: Vec<String>,
    /// Exclude globs; an excluded file is never compiled.
    pub excludes: Vec<String>,
    /// Extension of source files selected by the default include.
    pub source_extension: String,
    /// Directory receiving compiled outputs.
    pub destination: PathBuf,
    /// Build state file; `None` stores it next to the destination.
    pub state_path: Option<PathBuf>,
    /// Classpath entries in resolution order.
    pub classpath: Vec<PathBuf>,
    /// Annotation processor path entries.
    pub processor_path: Vec<PathBuf>,
    /// Language levels.
    pub level: LanguageLevel,
    /// Source file encoding.
    pub encoding: Option<String>,
    /// Do nothing for this unit.
    pub skip: bool,
    /// Return an error when compilation fails.
    pub fail_on_error: bool,
    /// Treat warnings as failures.
    pub fail_on_warning: bool,
    /// Run the compiler as a separate process.
    pub fork: bool,
    /// Emit debug information.
    pub debug: bool,
    /// Report compiler warnings.
    pub show_warnings: bool,
    /// Report deprecated API usage in detail.
    pub show_deprecation: bool,
    /// Run annotation processors.
    pub annotation_processing: bool,
    /// Per-source or aggregate outputs.
    pub output_mode: OutputMode,
    /// How changed sources are detected.
    pub staleness: Staleness,
    /// Compiler identifier.
    pub compiler_id: String,
    /// Explicit executable for forked compilation.
    pub executable: Option<PathBuf>,
    /// Extra arguments, passed unmodified after the generated ones.
    pub args: Vec<String>,
    /// Override of the platform command-line limit for forked compilation.
    pub max_command_line: Option<usize>,
    /// Artifact to register the destination for, if any.
    pub artifact: Option<ArtifactId>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            role: SourceRole::Main,
            roots: Vec::new(),
            includes: Vec::new(),
            excludes: Vec::new(),
            source_extension: "java".to_string(),
            destination: PathBuf::new(),
            state_path: None,
            classpath: Vec::new(),
            processor_path: Vec::new(),
            level: LanguageLevel::default(),
            encoding: None,
            skip: false,
            fail_on_error: true,
            fail_on_warning: false,
            fork: false,
            debug: true,
            show_warnings: true,
            show_deprecation: false,
            annotation_processing: true,
            output_mode: OutputMode::default(),
            staleness: Staleness::default(),
            compiler_id: "javac".to_string(),
            executable: None,
            args: Vec::new(),
            max_command_line: None,
            artifact: None,
        }
    }
}

impl CompilerConfig {
    /// Creates a configuration with default options for the given roots and
    /// destination.
    pub fn new(role: SourceRole, roots: Vec<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            role,
            roots,
            destination: destination.into(),
            ..Self::default()
        }
    }
}
