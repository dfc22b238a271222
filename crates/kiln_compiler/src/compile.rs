//! The compilation pipeline for one unit.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use kiln_cache::{analyze, Analysis, BuildState, FileRecord};
use kiln_common::{normalize_lexically, OutputMode};
use kiln_config::CompilerConfig;
use kiln_diagnostics::Diagnostic;
use kiln_source::{resolve, CandidateFile, PatternSet, SourceRoot};
use tracing::{debug, info, warn};

use crate::args::{self, CompileUnit};
use crate::error::CompileError;
use crate::host::{ArtifactManager, ToolchainManager};
use crate::invoke::{resolve_executable, CompilerManager, InvocationMode, Invoker, DEFAULT_COMMAND_LINE_LIMIT};
use crate::policy::{self, FailurePolicy, Verdict};
use crate::TOOL_VERSION;

/// Host capabilities available to [`compile`].
#[derive(Clone, Copy)]
pub struct CompileContext<'a> {
    /// In-process compilers.
    pub compilers: &'a CompilerManager,
    /// Toolchain lookup for forked compilers.
    pub toolchains: &'a dyn ToolchainManager,
    /// Artifact registration.
    pub artifacts: &'a dyn ArtifactManager,
}

/// What happened to a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The unit was configured to be skipped.
    Skipped,
    /// No source matched.
    NothingToCompile,
    /// Every output was current.
    UpToDate,
    /// Stale sources were compiled successfully.
    Compiled,
    /// Compilation failed but the failure was not escalated.
    CompiledWithErrors,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::NothingToCompile => "nothing to compile",
            OutcomeStatus::UpToDate => "up to date",
            OutcomeStatus::Compiled => "compiled",
            OutcomeStatus::CompiledWithErrors => "compiled with errors",
        };
        f.write_str(s)
    }
}

/// Result of compiling one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// What happened.
    pub status: OutcomeStatus,
    /// Diagnostics reported by the compiler.
    pub diagnostics: Vec<Diagnostic>,
    /// Sources submitted to the compiler.
    pub compiled: Vec<PathBuf>,
    /// Outputs that exist after the run.
    pub artifacts: Vec<PathBuf>,
    /// Non-fatal problems, such as a build state that could not be saved.
    pub warnings: Vec<String>,
}

impl Outcome {
    fn new(status: OutcomeStatus) -> Self {
        Self {
            status,
            diagnostics: Vec::new(),
            compiled: Vec::new(),
            artifacts: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Compiles one unit: resolves its sources, recompiles the stale ones, and
/// records the new build state.
pub fn compile(config: &CompilerConfig, context: &CompileContext<'_>) -> Result<Outcome, CompileError> {
    if config.skip {
        info!(role = %config.role, "not compiling sources (skipped)");
        return Ok(Outcome::new(OutcomeStatus::Skipped));
    }

    let absolute;
    let config = if has_relative_paths(config) {
        let cwd = std::env::current_dir().map_err(|e| CompileError::Io {
            path: PathBuf::from("."),
            source: e,
        })?;
        absolute = absolutize(config, &cwd);
        &absolute
    } else {
        config
    };

    let patterns = PatternSet::new(&config.includes, &config.excludes, &config.source_extension)?;
    let roots: Vec<SourceRoot> = config
        .roots
        .iter()
        .map(|r| SourceRoot::new(r, config.role))
        .collect();
    let candidates = resolve(&roots, &patterns)?;

    if candidates.is_empty() {
        info!(role = %config.role, "no sources to compile");
        return Ok(Outcome::new(OutcomeStatus::NothingToCompile));
    }

    let state_path = config
        .state_path
        .clone()
        .unwrap_or_else(|| BuildState::default_path(&config.destination));
    let previous = BuildState::load_compatible(
        &state_path,
        &config.destination,
        &config.output_mode,
        TOOL_VERSION,
    );
    let analysis = analyze(
        &candidates,
        previous.as_ref(),
        &config.output_mode,
        &config.destination,
        config.staleness,
    );
    remove_orphans(&analysis, &config.output_mode, &config.destination);

    let mut outcome = if analysis.is_up_to_date() {
        info!(role = %config.role, sources = candidates.len(), "all outputs are up to date");
        let mut outcome = Outcome::new(OutcomeStatus::UpToDate);
        let unchanged = previous
            .as_ref()
            .is_some_and(|p| p.files == analysis.observed);
        if !unchanged {
            let state = new_state(config, analysis.observed.clone());
            persist(&state, &state_path, &mut outcome);
        }
        outcome
    } else {
        compile_stale(config, context, &analysis, &state_path)?
    };

    outcome.artifacts = existing_outputs(&candidates, &config.output_mode, &config.destination);
    if let Some(artifact) = &config.artifact {
        if config.destination.is_dir() {
            context.artifacts.set_path(artifact, &config.destination);
            debug!(%artifact, path = %config.destination.display(), "registered artifact");
        }
    }
    Ok(outcome)
}

fn has_relative_paths(config: &CompilerConfig) -> bool {
    let relative = |p: &PathBuf| !p.is_absolute();
    config.roots.iter().any(relative)
        || relative(&config.destination)
        || config.state_path.as_ref().is_some_and(relative)
        || config.classpath.iter().any(relative)
        || config.processor_path.iter().any(relative)
        || config.executable.as_ref().is_some_and(|e| relative(e) && e.components().count() > 1)
}

/// Resolves every relative path of `config` against `base`. A bare
/// executable name is left alone for the `PATH` search.
fn absolutize(config: &CompilerConfig, base: &Path) -> CompilerConfig {
    let abs = |p: &PathBuf| {
        if p.is_absolute() {
            p.clone()
        } else {
            normalize_lexically(&base.join(p))
        }
    };
    let mut config = config.clone();
    config.roots = config.roots.iter().map(abs).collect();
    config.destination = abs(&config.destination);
    config.state_path = config.state_path.as_ref().map(abs);
    config.classpath = config.classpath.iter().map(abs).collect();
    config.processor_path = config.processor_path.iter().map(abs).collect();
    config.executable = config
        .executable
        .as_ref()
        .map(|e| if e.components().count() > 1 { abs(e) } else { e.clone() });
    config
}

fn compile_stale(
    config: &CompilerConfig,
    context: &CompileContext<'_>,
    analysis: &Analysis,
    state_path: &Path,
) -> Result<Outcome, CompileError> {
    let unit = CompileUnit {
        roots: config.roots.clone(),
        sources: analysis.stale_files().map(|f| f.path.clone()).collect(),
        destination: config.destination.clone(),
    };
    args::prepare_destination(&unit.destination)?;
    let arguments = args::build(&unit, config);

    let in_process = context.compilers.get(&config.compiler_id).is_some();
    if !config.fork && !in_process {
        debug!(compiler = %config.compiler_id, "no in-process compiler registered, forking");
    }
    let mode = if config.fork || !in_process {
        InvocationMode::Forked {
            executable: resolve_executable(
                config.executable.as_deref(),
                &config.compiler_id,
                context.toolchains,
            )?,
        }
    } else {
        InvocationMode::InProcess {
            compiler_id: config.compiler_id.clone(),
        }
    };

    info!(
        role = %config.role,
        sources = unit.sources.len(),
        destination = %unit.destination.display(),
        "compiling {} source file(s)",
        unit.sources.len()
    );
    let invoker = Invoker::new(context.compilers)
        .with_command_line_limit(config.max_command_line.unwrap_or(DEFAULT_COMMAND_LINE_LIMIT));
    let result = invoker.invoke(&arguments, &mode)?;

    let policy = FailurePolicy {
        fail_on_error: config.fail_on_error,
        fail_on_warning: config.fail_on_warning,
    };
    let verdict = policy::report(&result, policy)?;

    let mut observed = analysis.observed.clone();
    let status = match verdict {
        Verdict::Succeeded => OutcomeStatus::Compiled,
        Verdict::FailedTolerated => {
            for rel in failed_sources(analysis, &result.diagnostics, &config.output_mode) {
                observed.remove(&rel);
            }
            OutcomeStatus::CompiledWithErrors
        }
    };

    let mut outcome = Outcome::new(status);
    outcome.warnings = arguments.warnings;
    outcome.diagnostics = result.diagnostics;
    outcome.compiled = unit.sources;

    let state = new_state(config, observed);
    persist(&state, state_path, &mut outcome);
    Ok(outcome)
}

fn new_state(
    config: &CompilerConfig,
    files: BTreeMap<String, FileRecord>,
) -> BuildState {
    let mut state = BuildState::new(&config.destination, config.output_mode.clone(), TOOL_VERSION);
    state.files = files;
    state
}

/// Saves the state; a failure is only a warning on the outcome.
fn persist(state: &BuildState, path: &Path, outcome: &mut Outcome) {
    if let Err(e) = state.save(path) {
        warn!(error = %e, "could not persist build state; the next run rebuilds everything");
        outcome.warnings.push(format!("could not persist build state: {e}"));
    }
}

/// Relative paths of stale sources whose compilation failed.
///
/// Errors attributed to specific stale files mark only those; otherwise
/// (aggregate mode, unattributed errors) every stale source counts as
/// failed.
fn failed_sources(analysis: &Analysis, diagnostics: &[Diagnostic], mode: &OutputMode) -> Vec<String> {
    let all = || -> Vec<String> { analysis.stale.iter().map(|s| s.file.relative.clone()).collect() };
    if mode.is_aggregate() {
        return all();
    }

    let errors: Vec<&Diagnostic> = diagnostics.iter().filter(|d| d.is_error()).collect();
    if errors.is_empty() || errors.iter().any(|d| d.file().is_none()) {
        return all();
    }

    let reported: HashSet<&Path> = errors.iter().filter_map(|d| d.file()).collect();
    let failed: Vec<String> = analysis
        .stale
        .iter()
        .filter(|s| reported.iter().any(|r| same_file(&s.file, r)))
        .map(|s| s.file.relative.clone())
        .collect();
    if failed.is_empty() {
        all()
    } else {
        failed
    }
}

fn same_file(candidate: &CandidateFile, reported: &Path) -> bool {
    if reported.is_absolute() {
        normalize_lexically(reported) == candidate.path
    } else {
        candidate.path.ends_with(reported)
    }
}

/// Deletes the per-source outputs of sources that no longer exist.
fn remove_orphans(analysis: &Analysis, mode: &OutputMode, destination: &Path) {
    if mode.is_aggregate() {
        return;
    }
    for rel in &analysis.removed {
        let output = mode.expected_output(destination, rel);
        match std::fs::remove_file(&output) {
            Ok(()) => debug!(output = %output.display(), "removed output of deleted source"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(output = %output.display(), error = %e, "could not remove stale output"),
        }
    }
}

fn existing_outputs(candidates: &[CandidateFile], mode: &OutputMode, destination: &Path) -> Vec<PathBuf> {
    if mode.is_aggregate() {
        let output = mode.expected_output(destination, "");
        return if output.is_file() { vec![output] } else { Vec::new() };
    }
    candidates
        .iter()
        .map(|c| mode.expected_output(destination, &c.relative))
        .filter(|p| p.is_file())
        .collect()
}
