//! Per-role resolution: turning the project configuration into the
//! [`CompilerConfig`] of one compilation unit.
//!
//! Project-relative paths are made absolute, `[compiler]` options are
//! combined with the role's overrides, and the test role gets the main
//! output directory at the front of its classpath.

use std::path::{Path, PathBuf};

use kiln_common::normalize_lexically;
use kiln_source::SourceRole;
use tracing::debug;

use crate::compiler::{ArtifactId, CompilerConfig, LanguageLevel};
use crate::error::ConfigError;
use crate::types::{ProjectConfig, SourceSetConfig};

/// Returns the output directory name of a source set, relative to the
/// build directory.
pub(crate) fn output_name(section: &SourceSetConfig, role: SourceRole) -> String {
    match (&section.output, role) {
        (Some(out), _) => out.clone(),
        (None, SourceRole::Main) => "classes".to_string(),
        (None, SourceRole::Test) => "test-classes".to_string(),
    }
}

/// Resolves the compilation unit of `role`.
///
/// `project_dir` must be absolute; every relative path in the
/// configuration is taken relative to it.
pub fn resolve_unit(
    config: &ProjectConfig,
    project_dir: &Path,
    role: SourceRole,
) -> Result<CompilerConfig, ConfigError> {
    if !project_dir.is_absolute() {
        return Err(ConfigError::ValidationError(format!(
            "project directory must be absolute: {}",
            project_dir.display()
        )));
    }

    let section = role_section(config, role);
    let compiler = &config.compiler;
    let build_dir = absolute(project_dir, &config.build.directory);
    let destination = normalize_lexically(&build_dir.join(output_name(section, role)));

    let roots = if section.roots.is_empty() {
        vec![project_dir
            .join("src")
            .join(role.to_string())
            .join(&compiler.source_extension)]
    } else {
        section
            .roots
            .iter()
            .map(|r| absolute(project_dir, r))
            .collect()
    };

    let mut classpath = Vec::new();
    if role == SourceRole::Test {
        let main_out = output_name(&config.main, SourceRole::Main);
        classpath.push(normalize_lexically(&build_dir.join(main_out)));
    }
    classpath.extend(
        config
            .build
            .classpath
            .iter()
            .chain(&section.classpath)
            .map(|p| absolute(project_dir, p)),
    );

    let level = LanguageLevel {
        source: section.source.clone().or_else(|| compiler.source.clone()),
        target: section.target.clone().or_else(|| compiler.target.clone()),
        release: section.release.clone().or_else(|| compiler.release.clone()),
    };

    let artifact = (role == SourceRole::Main)
        .then(|| ArtifactId::new(&config.project.name, &config.project.version));

    let unit = CompilerConfig {
        role,
        roots,
        includes: section.includes.clone(),
        excludes: section.excludes.clone(),
        source_extension: compiler.source_extension.clone(),
        destination,
        state_path: None,
        classpath,
        processor_path: config
            .build
            .processor_path
            .iter()
            .map(|p| absolute(project_dir, p))
            .collect(),
        level,
        encoding: compiler.encoding.clone(),
        skip: section.skip,
        fail_on_error: compiler.fail_on_error,
        fail_on_warning: compiler.fail_on_warning,
        fork: compiler.fork,
        debug: compiler.debug,
        show_warnings: compiler.show_warnings,
        show_deprecation: compiler.show_deprecation,
        annotation_processing: compiler.annotation_processing,
        output_mode: compiler.output.clone(),
        staleness: config.build.staleness,
        compiler_id: compiler.id.clone(),
        executable: compiler
            .executable
            .as_deref()
            .map(|e| absolute_executable(project_dir, e)),
        args: compiler.args.iter().chain(&section.args).cloned().collect(),
        max_command_line: compiler.max_command_line,
        artifact,
    };

    debug!(
        role = %role,
        destination = %unit.destination.display(),
        roots = unit.roots.len(),
        classpath = unit.classpath.len(),
        "resolved compilation unit"
    );
    Ok(unit)
}

fn role_section(config: &ProjectConfig, role: SourceRole) -> &SourceSetConfig {
    match role {
        SourceRole::Main => &config.main,
        SourceRole::Test => &config.test,
    }
}

fn absolute(project_dir: &Path, path: &str) -> PathBuf {
    normalize_lexically(&project_dir.join(path))
}

/// A bare command name stays as-is so it is looked up on `PATH`.
fn absolute_executable(project_dir: &Path, executable: &str) -> PathBuf {
    let path = Path::new(executable);
    if path.components().count() == 1 {
        path.to_path_buf()
    } else {
        absolute(project_dir, executable)
    }
}
