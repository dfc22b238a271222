//! Error types for build state persistence.

use std::path::PathBuf;

/// Errors that can occur while writing the build state.
///
/// Reads never fail: an unreadable state is treated as absent. Write
/// failures are reported so the caller can warn, but they do not make a
/// successful compilation fail.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// An I/O error occurred while writing or replacing the state file.
    #[error("build state I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The state could not be serialized.
    #[error("failed to serialize build state: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = StateError::Io {
            path: PathBuf::from("/target/.kiln-state/classes.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("build state I/O error"));
        assert!(msg.contains("classes.json"));
    }

    #[test]
    fn serialization_error_display() {
        let err = StateError::Serialization {
            reason: "key must be a string".to_string(),
        };
        assert!(err.to_string().contains("key must be a string"));
    }
}
