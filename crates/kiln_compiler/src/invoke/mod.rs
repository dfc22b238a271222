//! Compiler invocation, in-process or as a forked process.
//!
//! Both paths normalise to the same [`InvocationResult`]: a success flag,
//! the complete list of diagnostics, and the exit code when forked.

mod fork;

use std::collections::BTreeMap;
use std::path::PathBuf;

use kiln_diagnostics::{Diagnostic, DiagnosticListener, DiagnosticSink, Severity};
use tracing::debug;

use crate::args::CompilerArguments;
use crate::error::CompileError;

pub(crate) use fork::find_in_dirs;
pub use fork::{resolve_executable, DEFAULT_COMMAND_LINE_LIMIT};

/// A compiler that runs inside the host process.
pub trait Compiler: Send + Sync {
    /// Identifier the compiler is registered under.
    fn id(&self) -> &str;

    /// Compiles `arguments.sources`, reporting diagnostics to `listener`.
    ///
    /// Returns `Ok(false)` when compilation ran but failed, and `Err` when
    /// the compiler could not run at all.
    fn compile(
        &self,
        arguments: &CompilerArguments,
        listener: &dyn DiagnosticListener,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// Registry of in-process compilers, keyed by id.
#[derive(Default)]
pub struct CompilerManager {
    compilers: BTreeMap<String, Box<dyn Compiler>>,
}

impl CompilerManager {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a compiler, replacing any previous one with the same id.
    pub fn register(&mut self, compiler: Box<dyn Compiler>) {
        self.compilers.insert(compiler.id().to_string(), compiler);
    }

    /// Registers a compiler and returns the registry.
    pub fn with(mut self, compiler: Box<dyn Compiler>) -> Self {
        self.register(compiler);
        self
    }

    /// Looks up a compiler by id.
    pub fn get(&self, id: &str) -> Option<&dyn Compiler> {
        self.compilers.get(id).map(|c| c.as_ref())
    }

    /// Returns the registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.compilers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for CompilerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

/// How the compiler is run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationMode {
    /// Call a registered [`Compiler`].
    InProcess {
        /// Registry id.
        compiler_id: String,
    },
    /// Spawn an external executable.
    Forked {
        /// Resolved executable path.
        executable: PathBuf,
    },
}

/// The outcome of one compiler run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvocationResult {
    /// Whether the compiler reported success.
    pub success: bool,
    /// Every diagnostic, in reporting order.
    pub diagnostics: Vec<Diagnostic>,
    /// Exit code of a forked compiler; `None` in-process or when killed.
    pub exit_code: Option<i32>,
}

impl InvocationResult {
    /// Returns `true` if any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Returns `true` if any diagnostic is a warning.
    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning)
    }
}

/// Runs compilers for the compilation core.
#[derive(Debug)]
pub struct Invoker<'a> {
    compilers: &'a CompilerManager,
    command_line_limit: usize,
    argfile_dir: Option<PathBuf>,
}

impl<'a> Invoker<'a> {
    /// Creates an invoker using the platform command-line limit.
    pub fn new(compilers: &'a CompilerManager) -> Self {
        Self {
            compilers,
            command_line_limit: DEFAULT_COMMAND_LINE_LIMIT,
            argfile_dir: None,
        }
    }

    /// Overrides the length above which forked arguments go to a file.
    pub fn with_command_line_limit(mut self, limit: usize) -> Self {
        self.command_line_limit = limit;
        self
    }

    /// Writes argument files to `dir` instead of the system temp directory.
    pub fn with_argfile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.argfile_dir = Some(dir.into());
        self
    }

    /// Runs the compiler. Diagnostics are fully collected before returning.
    pub fn invoke(
        &self,
        arguments: &CompilerArguments,
        mode: &InvocationMode,
    ) -> Result<InvocationResult, CompileError> {
        match mode {
            InvocationMode::InProcess { compiler_id } => self.invoke_in_process(arguments, compiler_id),
            InvocationMode::Forked { executable } => {
                fork::run(
                    executable,
                    arguments,
                    self.command_line_limit,
                    self.argfile_dir.as_deref(),
                )
            }
        }
    }

    fn invoke_in_process(
        &self,
        arguments: &CompilerArguments,
        compiler_id: &str,
    ) -> Result<InvocationResult, CompileError> {
        let compiler = self
            .compilers
            .get(compiler_id)
            .ok_or_else(|| CompileError::InvocationStart {
                compiler: compiler_id.to_string(),
                reason: "no in-process compiler registered under this id".to_string(),
            })?;

        debug!(compiler = compiler_id, sources = arguments.sources.len(), "invoking in-process compiler");
        let sink = DiagnosticSink::new();
        let reported_success = compiler
            .compile(arguments, &sink)
            .map_err(|e| CompileError::InvocationStart {
                compiler: compiler_id.to_string(),
                reason: e.to_string(),
            })?;
        debug!(
            compiler = compiler_id,
            success = reported_success,
            errors = sink.error_count(),
            warnings = sink.warning_count(),
            "in-process compiler finished"
        );

        // A compiler that reports errors has failed, whatever it returned.
        Ok(InvocationResult {
            success: reported_success && !sink.has_errors(),
            diagnostics: sink.take_all(),
            exit_code: None,
        })
    }
}
