//! `kiln compile`, `kiln test-compile` and `kiln build`.
//!
//! The full pipeline for each requested role:
//!
//! 1. Find project root (walk up looking for `kiln.toml`)
//! 2. Load config via `kiln_config`
//! 3. Resolve the role's compile unit
//! 4. Compile the stale sources via `kiln_compiler`
//! 5. Render diagnostics

use kiln_compiler::{
    compile, CompileContext, CompileError, CompilerManager, InMemoryArtifacts, JavaHomeToolchain,
    Outcome, OutcomeStatus,
};
use kiln_config::ProjectConfig;
use kiln_diagnostics::{Diagnostic, DiagnosticRenderer, JsonRenderer, Severity, TerminalRenderer};
use kiln_source::SourceRole;
use serde_json::json;
use tracing::debug;

use crate::project::resolve_project_root;
use crate::{CompileArgs, GlobalArgs, ReportFormat};

/// What one role produced, for the final report.
struct UnitReport {
    role: SourceRole,
    status: Option<OutcomeStatus>,
    diagnostics: Vec<Diagnostic>,
    warnings: Vec<String>,
}

impl UnitReport {
    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn failed(&self) -> bool {
        self.status.is_none()
    }
}

/// Runs the given roles in order, stopping at the first one that fails.
///
/// Returns exit code 0 if every role compiled, 1 if compilation failed.
pub fn run(
    roles: &[SourceRole],
    args: &CompileArgs,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = kiln_config::load_config(&project_dir)?;
    debug!(project = %project_dir.display(), name = %config.project.name, "loaded configuration");

    // No in-process compiler ships with the binary, so every unit forks.
    let compilers = CompilerManager::new();
    let toolchains = JavaHomeToolchain::from_env();
    let artifacts = InMemoryArtifacts::new();
    let context = CompileContext {
        compilers: &compilers,
        toolchains: &toolchains,
        artifacts: &artifacts,
    };

    let mut reports = Vec::new();
    for &role in roles {
        let unit = kiln_config::resolve_unit(&config, &project_dir, role)?;
        if !global.quiet && args.format == ReportFormat::Text {
            eprintln!(
                "   Compiling {} v{} ({role}) -> {}",
                config.project.name,
                config.project.version,
                unit.destination.display()
            );
        }

        let report = match compile(&unit, &context) {
            Ok(outcome) => unit_report(role, outcome),
            Err(CompileError::CompilationFailed { diagnostics }) => UnitReport {
                role,
                status: None,
                diagnostics,
                warnings: Vec::new(),
            },
            Err(e) => return Err(e.into()),
        };

        if args.format == ReportFormat::Text {
            print_text(&report, &config, global);
        }
        let failed = report.failed();
        reports.push(report);
        if failed {
            break;
        }
    }

    if args.format == ReportFormat::Json {
        println!("{}", json_report(&reports));
    }

    if reports.iter().any(UnitReport::failed) {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn unit_report(role: SourceRole, outcome: Outcome) -> UnitReport {
    UnitReport {
        role,
        status: Some(outcome.status),
        diagnostics: outcome.diagnostics,
        warnings: outcome.warnings,
    }
}

fn print_text(report: &UnitReport, config: &ProjectConfig, global: &GlobalArgs) {
    let renderer = TerminalRenderer::new(global.color);
    for diag in &report.diagnostics {
        eprint!("{}", renderer.render(diag));
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    match report.status {
        Some(status) if !global.quiet => eprintln!(
            "    Finished {} ({}): {status}, {errors} error(s), {warnings} warning(s)",
            config.project.name, report.role
        ),
        Some(_) => {}
        None => eprintln!(
            "error: could not compile {} ({}) due to {errors} error(s); {warnings} warning(s) emitted",
            config.project.name, report.role
        ),
    }
}

fn json_report(reports: &[UnitReport]) -> String {
    let units: Vec<serde_json::Value> = reports
        .iter()
        .map(|r| {
            let diagnostics: Vec<serde_json::Value> = r
                .diagnostics
                .iter()
                .filter_map(|d| serde_json::from_str(&JsonRenderer.render(d)).ok())
                .collect();
            json!({
                "role": r.role,
                "status": r.status.map_or_else(|| "failed".to_string(), |s| s.to_string()),
                "errors": r.count(Severity::Error),
                "warnings": r.count(Severity::Warning),
                "diagnostics": diagnostics,
                "notes": r.warnings,
            })
        })
        .collect();
    serde_json::to_string_pretty(&units).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn project(toml_extra: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("kiln.toml"),
            format!("[project]\nname = \"app\"\nversion = \"1.0\"\n{toml_extra}"),
        )
        .unwrap();
        tmp
    }

    fn global(dir: &Path) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: Some(dir.display().to_string()),
        }
    }

    fn text() -> CompileArgs {
        CompileArgs {
            format: ReportFormat::Text,
        }
    }

    #[test]
    fn empty_project_compiles_nothing() {
        let tmp = project("");
        let code = run(&[SourceRole::Main, SourceRole::Test], &text(), &global(tmp.path())).unwrap();
        assert_eq!(code, 0);
        assert!(!tmp.path().join("target/classes").exists());
    }

    #[test]
    fn skipped_test_role_succeeds() {
        let tmp = project("[test]\nskip = true\n");
        fs::create_dir_all(tmp.path().join("src/test/java")).unwrap();
        fs::write(tmp.path().join("src/test/java/ATest.java"), "class ATest {}").unwrap();
        let code = run(&[SourceRole::Test], &text(), &global(tmp.path())).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn missing_compiler_is_an_error() {
        let tmp = project("[compiler]\nid = \"kiln-no-such-compiler\"\n");
        fs::create_dir_all(tmp.path().join("src/main/java")).unwrap();
        fs::write(tmp.path().join("src/main/java/A.java"), "class A {}").unwrap();
        let err = run(&[SourceRole::Main], &text(), &global(tmp.path())).unwrap_err();
        assert!(err.to_string().contains("kiln-no-such-compiler"));
    }

    /// Writes an empty `<name>.class` into the `-d` directory for every
    /// `.java` argument; reads `@argfile`s.
    #[cfg(unix)]
    const FAKE_JAVAC: &str = r#"#!/bin/sh
if [ "${1#@}" != "$1" ]; then
  set -- $(cat "${1#@}")
fi
dest=""
while [ $# -gt 0 ]; do
  case "$1" in
    -d) dest="$2"; shift 2 ;;
    -classpath|-sourcepath|--processor-path|-encoding|-source|-target|--release) shift 2 ;;
    *.java) : > "$dest/$(basename "$1" .java).class"; shift ;;
    *) shift ;;
  esac
done
"#;

    #[cfg(unix)]
    #[test]
    fn build_compiles_main_then_test_with_forked_compiler() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = project("[compiler]\nexecutable = \"bin/fake-javac\"\nrelease = \"17\"\n");
        let javac = tmp.path().join("bin/fake-javac");
        fs::create_dir_all(javac.parent().unwrap()).unwrap();
        fs::write(&javac, FAKE_JAVAC).unwrap();
        fs::set_permissions(&javac, fs::Permissions::from_mode(0o755)).unwrap();
        fs::create_dir_all(tmp.path().join("src/main/java")).unwrap();
        fs::create_dir_all(tmp.path().join("src/test/java")).unwrap();
        fs::write(tmp.path().join("src/main/java/App.java"), "class App {}").unwrap();
        fs::write(tmp.path().join("src/test/java/AppTest.java"), "class AppTest {}").unwrap();

        let code = run(&[SourceRole::Main, SourceRole::Test], &text(), &global(tmp.path())).unwrap();
        assert_eq!(code, 0);
        assert!(tmp.path().join("target/classes/App.class").exists());
        assert!(tmp.path().join("target/test-classes/AppTest.class").exists());

        // Nothing is stale the second time round
        let code = run(&[SourceRole::Main, SourceRole::Test], &text(), &global(tmp.path())).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("kiln.toml"), "[project]\nname = \"\"\nversion = \"1\"\n").unwrap();
        assert!(run(&[SourceRole::Main], &text(), &global(tmp.path())).is_err());
    }

    #[test]
    fn json_report_lists_units() {
        let reports = vec![
            UnitReport {
                role: SourceRole::Main,
                status: Some(OutcomeStatus::UpToDate),
                diagnostics: vec![Diagnostic::warning("deprecated API")],
                warnings: Vec::new(),
            },
            UnitReport {
                role: SourceRole::Test,
                status: None,
                diagnostics: vec![Diagnostic::error("cannot find symbol")],
                warnings: vec!["could not persist build state".to_string()],
            },
        ];
        let value: serde_json::Value = serde_json::from_str(&json_report(&reports)).unwrap();
        assert_eq!(value[0]["role"], "main");
        assert_eq!(value[0]["status"], "up to date");
        assert_eq!(value[0]["warnings"], 1);
        assert_eq!(value[1]["status"], "failed");
        assert_eq!(value[1]["errors"], 1);
        assert_eq!(value[1]["diagnostics"][0]["message"], "cannot find symbol");
        assert_eq!(value[1]["notes"][0], "could not persist build state");
    }
}
