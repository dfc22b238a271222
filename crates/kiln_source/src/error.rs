//! Error types for source set resolution.

use std::path::PathBuf;

/// Errors that abort source set resolution before any compilation work.
///
/// A missing source root is not an error; it simply contributes no files.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// An include or exclude pattern is not a valid glob.
    #[error("invalid source pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as configured.
        pattern: String,
        /// Description of the syntax problem.
        reason: String,
    },

    /// A source root or an entry below it exists but cannot be read.
    #[error("cannot read source directory {path}: {source}")]
    Unreadable {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_display() {
        let err = ResolveError::InvalidPattern {
            pattern: "**/A**.java".to_string(),
            reason: "recursive wildcards must form a single path component".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("invalid source pattern"));
        assert!(msg.contains("**/A**.java"));
    }

    #[test]
    fn unreadable_display() {
        let err = ResolveError::Unreadable {
            path: PathBuf::from("/src/main/java"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("cannot read source directory"));
        assert!(msg.contains("/src/main/java"));
    }
}
