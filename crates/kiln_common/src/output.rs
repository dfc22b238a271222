//! Output mode and staleness strategy shared by configuration and the build cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default extension of per-source output artifacts.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "class";

/// How a compiler maps source files to output artifacts.
///
/// Determines both which output must exist for a source to be considered
/// up to date and whether a unit can be recompiled partially.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OutputMode {
    /// One output artifact per source file, mirroring the source's relative path.
    PerSource {
        /// Extension that replaces the source extension (e.g. `class`).
        output_extension: String,
    },
    /// One output artifact for the whole source set.
    Aggregate {
        /// File name of the single artifact, relative to the destination.
        output_file: String,
    },
}

impl OutputMode {
    /// Creates a per-source mode with the given output extension.
    pub fn per_source(output_extension: impl Into<String>) -> Self {
        OutputMode::PerSource {
            output_extension: output_extension.into(),
        }
    }

    /// Creates an aggregate mode producing `output_file` in the destination.
    pub fn aggregate(output_file: impl Into<String>) -> Self {
        OutputMode::Aggregate {
            output_file: output_file.into(),
        }
    }

    /// Returns `true` for [`OutputMode::Aggregate`].
    pub fn is_aggregate(&self) -> bool {
        matches!(self, OutputMode::Aggregate { .. })
    }

    /// Returns the output artifact that a source at `relative` (a
    /// `/`-separated path below its source root) is expected to produce.
    ///
    /// In aggregate mode every source maps to the same artifact.
    pub fn expected_output(&self, destination: &Path, relative: &str) -> PathBuf {
        match self {
            OutputMode::PerSource { output_extension } => {
                let mut out = destination.to_path_buf();
                out.extend(relative.split('/').filter(|s| !s.is_empty()));
                out.set_extension(output_extension);
                out
            }
            OutputMode::Aggregate { output_file } => destination.join(output_file),
        }
    }
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::per_source(DEFAULT_OUTPUT_EXTENSION)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::PerSource { output_extension } => {
                write!(f, "per-source (*.{output_extension})")
            }
            OutputMode::Aggregate { output_file } => write!(f, "aggregate ({output_file})"),
        }
    }
}

/// How a source file is judged changed relative to its recorded state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Staleness {
    /// Changed only if the modification time is strictly newer than recorded.
    Timestamp,
    /// Changed only if the content hash differs; unchanged mtime and length
    /// are trusted without reading the file.
    #[default]
    ContentHash,
}
