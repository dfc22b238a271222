//! Forked compilation: executable lookup, argument files, process spawn.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use kiln_diagnostics::{parse_compiler_output, Diagnostic};
use tempfile::NamedTempFile;
use tracing::debug;

use super::InvocationResult;
use crate::args::CompilerArguments;
use crate::error::CompileError;
use crate::host::ToolchainManager;

/// Command-line length above which arguments are passed in a file.
#[cfg(windows)]
pub const DEFAULT_COMMAND_LINE_LIMIT: usize = 8 * 1024;
/// Command-line length above which arguments are passed in a file.
#[cfg(not(windows))]
pub const DEFAULT_COMMAND_LINE_LIMIT: usize = 128 * 1024;

const ARGFILE_PREFIX: &str = "kiln-args-";

/// Finds the executable of a forked compiler.
///
/// Lookup order: the explicit path (a bare name is searched on `PATH`),
/// then the toolchain's tool for `compiler_id`, then `compiler_id` on
/// `PATH`.
pub fn resolve_executable(
    explicit: Option<&Path>,
    compiler_id: &str,
    toolchains: &dyn ToolchainManager,
) -> Result<PathBuf, CompileError> {
    let path_dirs = || {
        std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
            .unwrap_or_default()
    };

    if let Some(explicit) = explicit {
        let found = if explicit.components().count() == 1 {
            find_in_dirs(&explicit.to_string_lossy(), path_dirs())
        } else {
            explicit.is_file().then(|| explicit.to_path_buf())
        };
        return found.ok_or_else(|| CompileError::InvocationStart {
            compiler: explicit.display().to_string(),
            reason: "executable not found".to_string(),
        });
    }

    if let Some(tool) = toolchains.find_tool(compiler_id) {
        debug!(compiler = compiler_id, tool = %tool.display(), "using toolchain compiler");
        return Ok(tool);
    }

    find_in_dirs(compiler_id, path_dirs()).ok_or_else(|| CompileError::InvocationStart {
        compiler: compiler_id.to_string(),
        reason: "not provided by a toolchain and not found on PATH".to_string(),
    })
}

pub(crate) fn find_in_dirs(name: &str, dirs: Vec<PathBuf>) -> Option<PathBuf> {
    let mut names = vec![name.to_string()];
    if cfg!(windows) && Path::new(name).extension().is_none() {
        names.push(format!("{name}.exe"));
    }
    dirs.iter()
        .flat_map(|dir| names.iter().map(move |n| dir.join(n)))
        .find(|candidate| candidate.is_file())
}

/// Spawns `executable` with the rendered arguments and waits for it.
pub(super) fn run(
    executable: &Path,
    arguments: &CompilerArguments,
    limit: usize,
    argfile_dir: Option<&Path>,
) -> Result<InvocationResult, CompileError> {
    let line = arguments.to_command_line();
    let length = executable.as_os_str().len() + line.iter().map(|a| a.len() + 1).sum::<usize>();

    let mut command = Command::new(executable);
    command.stdin(Stdio::null());

    // Kept alive until the process exits; removed on drop.
    let argfile = if length > limit {
        let file = write_argfile(&line, argfile_dir)?;
        let mut arg = OsString::from("@");
        arg.push(file.path());
        command.arg(arg);
        debug!(length, limit, argfile = %file.path().display(), "command line too long, using argument file");
        Some(file)
    } else {
        command.args(&line);
        None
    };

    debug!(executable = %executable.display(), args = line.len(), "spawning compiler");
    let output = command.output().map_err(|e| CompileError::InvocationStart {
        compiler: executable.display().to_string(),
        reason: e.to_string(),
    })?;
    drop(argfile);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.is_empty() {
        debug!(stdout = %stdout, "compiler stdout");
    }
    if !stderr.is_empty() {
        debug!(stderr = %stderr, "compiler stderr");
    }

    let mut diagnostics = parse_compiler_output(&stdout);
    diagnostics.extend(parse_compiler_output(&stderr));

    let exit_code = output.status.code();
    if exit_code.is_none() {
        diagnostics.push(Diagnostic::error(format!(
            "compiler process {} terminated by signal",
            executable.display()
        )));
    }

    Ok(InvocationResult {
        success: output.status.success(),
        diagnostics,
        exit_code,
    })
}

/// Writes one argument per line, quoting those that need it.
fn write_argfile(line: &[String], dir: Option<&Path>) -> Result<NamedTempFile, CompileError> {
    let dir = dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
    let io_error = |e| CompileError::Io {
        path: dir.clone(),
        source: e,
    };
    let mut file = tempfile::Builder::new()
        .prefix(ARGFILE_PREFIX)
        .suffix(".txt")
        .tempfile_in(&dir)
        .map_err(io_error)?;
    for arg in line {
        writeln!(file, "{}", quote_arg(arg)).map_err(io_error)?;
    }
    file.flush().map_err(io_error)?;
    Ok(file)
}

fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '#'));
    if !needs_quotes {
        return arg.to_string();
    }
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
