//! Failure policy: whether a failed compilation aborts the build.

use kiln_diagnostics::Severity;
use tracing::{error, warn};

use crate::error::CompileError;
use crate::invoke::InvocationResult;

/// How failures are escalated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Return an error when compilation fails.
    pub fail_on_error: bool,
    /// Count warnings as failures.
    pub fail_on_warning: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            fail_on_error: true,
            fail_on_warning: false,
        }
    }
}

/// The verdict on an invocation that the policy let through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The compilation succeeded.
    Succeeded,
    /// The compilation failed, but `fail_on_error` is off.
    FailedTolerated,
}

/// Applies `policy` to `result`.
///
/// A run fails if the compiler reported failure, exited non-zero, or
/// emitted an error diagnostic; with `fail_on_warning`, any warning fails it
/// too. A failure becomes [`CompileError::CompilationFailed`] carrying every
/// diagnostic, unless `fail_on_error` is off.
pub fn report(result: &InvocationResult, policy: FailurePolicy) -> Result<Verdict, CompileError> {
    let exited_badly = result.exit_code.is_some_and(|code| code != 0);
    let mut failed = !result.success || exited_badly || result.has_errors();
    if policy.fail_on_warning && result.has_warnings() {
        warn!("warnings found and fail_on_warning is set");
        failed = true;
    }

    if !failed {
        return Ok(Verdict::Succeeded);
    }

    if policy.fail_on_error {
        for diag in result.diagnostics.iter().filter(|d| d.severity == Severity::Error) {
            error!("{diag}");
        }
        return Err(CompileError::CompilationFailed {
            diagnostics: result.diagnostics.clone(),
        });
    }

    let errors = result.diagnostics.iter().filter(|d| d.is_error()).count();
    warn!(
        errors,
        exit_code = ?result.exit_code,
        "compilation failed; continuing because fail_on_error is off"
    );
    Ok(Verdict::FailedTolerated)
}
