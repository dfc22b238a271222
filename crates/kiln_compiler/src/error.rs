//! Error types for compilation.

use std::path::PathBuf;

use kiln_diagnostics::Diagnostic;
use kiln_source::ResolveError;

/// Errors that abort the compilation of a unit.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Source resolution failed before any work was done.
    #[error("source resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// The compiler could not be found or started.
    #[error("cannot start compiler '{compiler}': {reason}")]
    InvocationStart {
        /// The compiler id or executable.
        compiler: String,
        /// Why it could not be started.
        reason: String,
    },

    /// Compilation failed and the failure policy escalates it.
    #[error(
        "compilation failed: {} error(s), {} warning(s)",
        .diagnostics.iter().filter(|d| d.is_error()).count(),
        .diagnostics.iter().filter(|d| d.severity == kiln_diagnostics::Severity::Warning).count()
    )]
    CompilationFailed {
        /// Every diagnostic the compiler reported.
        diagnostics: Vec<Diagnostic>,
    },

    /// A filesystem operation needed for compilation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl CompileError {
    /// Returns the compiler diagnostics carried by this error, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::CompilationFailed { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_failed_counts() {
        let err = CompileError::CompilationFailed {
            diagnostics: vec![
                Diagnostic::error("a"),
                Diagnostic::error("b"),
                Diagnostic::warning("c"),
            ],
        };
        assert_eq!(err.to_string(), "compilation failed: 2 error(s), 1 warning(s)");
        assert_eq!(err.diagnostics().len(), 3);
    }

    #[test]
    fn invocation_start_display() {
        let err = CompileError::InvocationStart {
            compiler: "javac".to_string(),
            reason: "not found on PATH".to_string(),
        };
        assert_eq!(err.to_string(), "cannot start compiler 'javac': not found on PATH");
        assert!(err.diagnostics().is_empty());
    }

    #[test]
    fn resolution_from() {
        let err: CompileError = ResolveError::InvalidPattern {
            pattern: "**/A**".to_string(),
            reason: "bad".to_string(),
        }
        .into();
        assert!(matches!(err, CompileError::Resolution(_)));
    }
}
