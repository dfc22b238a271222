//! Persisted build state for one destination directory.
//!
//! The state is stored as JSON next to the destination, at
//! `<dest parent>/.kiln-state/<dest name>.json`, and replaced atomically
//! (write to a temporary file, then rename) so a crash mid-write leaves the
//! previous state intact.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use kiln_common::{ContentHash, OutputMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StateError;

/// Current state file format. Files with another version are ignored.
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Directory, next to the destination, that holds state files.
const STATE_DIR: &str = ".kiln-state";

/// What was observed about one source file when it was last compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Modification time in nanoseconds since the Unix epoch.
    pub modified_ns: u64,
    /// Size in bytes.
    pub len: u64,
    /// Content hash, when the content-hash strategy computed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,
}

/// Record of the last successful compilation into one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    /// State file format version.
    pub format_version: u32,

    /// Kiln version that wrote this state. Invalidate on version change.
    pub tool_version: String,

    /// Destination directory the recorded outputs live in.
    pub destination: PathBuf,

    /// Output mode used for the recorded compilation.
    pub output_mode: OutputMode,

    /// Per-source records keyed by `/`-separated path relative to its root.
    pub files: BTreeMap<String, FileRecord>,
}

impl BuildState {
    /// Creates an empty state for a destination.
    pub fn new(destination: &Path, output_mode: OutputMode, tool_version: &str) -> Self {
        Self {
            format_version: STATE_FORMAT_VERSION,
            tool_version: tool_version.to_string(),
            destination: destination.to_path_buf(),
            output_mode,
            files: BTreeMap::new(),
        }
    }

    /// Returns where the state of `destination` is stored by default.
    pub fn default_path(destination: &Path) -> PathBuf {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "classes".to_string());
        let parent = destination.parent().unwrap_or(destination);
        parent.join(STATE_DIR).join(format!("{name}.json"))
    }

    /// Loads a state file, returning `None` if it doesn't exist or can't be
    /// parsed.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable build state");
                None
            }
        }
    }

    /// Loads a state file and keeps it only if it was written for the same
    /// destination, output mode, format, and tool version.
    pub fn load_compatible(
        path: &Path,
        destination: &Path,
        output_mode: &OutputMode,
        tool_version: &str,
    ) -> Option<Self> {
        let state = Self::load(path)?;
        if state.is_compatible(destination, output_mode, tool_version) {
            Some(state)
        } else {
            debug!(path = %path.display(), "discarding build state written for a different configuration");
            None
        }
    }

    /// Returns `true` if this state can be trusted for the given setup.
    pub fn is_compatible(
        &self,
        destination: &Path,
        output_mode: &OutputMode,
        tool_version: &str,
    ) -> bool {
        self.format_version == STATE_FORMAT_VERSION
            && self.tool_version == tool_version
            && self.destination == destination
            && &self.output_mode == output_mode
    }

    /// Writes the state atomically.
    ///
    /// On failure the temporary file is removed and the previous state file
    /// is deleted too, so the next run rebuilds from scratch instead of
    /// trusting a record that no longer matches the outputs.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let result = self.write_atomically(path);
        if result.is_err() {
            let _ = std::fs::remove_file(temp_path(path));
            Self::discard(path);
        }
        result
    }

    fn write_atomically(&self, path: &Path) -> Result<(), StateError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StateError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| StateError::Serialization {
            reason: e.to_string(),
        })?;
        let tmp = temp_path(path);
        let io_error = |e| StateError::Io {
            path: tmp.clone(),
            source: e,
        };
        let mut file = File::create(&tmp).map_err(io_error)?;
        file.write_all(json.as_bytes()).map_err(io_error)?;
        // Flushed before the rename so a crash never leaves an empty state file.
        file.sync_all().map_err(io_error)?;
        drop(file);
        std::fs::rename(&tmp, path).map_err(|e| StateError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), files = self.files.len(), "build state saved");
        Ok(())
    }

    /// Deletes a state file. A missing file is not an error.
    pub fn discard(path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "build state discarded"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not delete build state"),
        }
    }
}

/// Converts a modification time to nanoseconds since the Unix epoch.
///
/// Times before the epoch map to 0.
pub fn modified_ns(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
