//! Shared fixtures: an on-disk project layout and a stub in-process
//! compiler that writes empty outputs.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use kiln_common::{to_slash, OutputMode};
use kiln_compiler::{
    CompileContext, Compiler, CompilerArguments, CompilerManager, InMemoryArtifacts, NoToolchains,
};
use kiln_config::{ArtifactId, CompilerConfig, LanguageLevel};
use kiln_diagnostics::{Diagnostic, DiagnosticListener, Location};
use kiln_source::SourceRole;
use tempfile::TempDir;

/// Id the stub compiler is registered under.
pub const STUB_ID: &str = "stub";

/// Marker that makes the stub compiler report an error for a source.
pub const BROKEN: &str = "BROKEN";

// ---------------------------------------------------------------------------
// Stub compiler
// ---------------------------------------------------------------------------

/// Writes an empty output per source (or one aggregate output) and records
/// every invocation. Sources containing [`BROKEN`] get an error diagnostic
/// and no output, unless `partial_outputs` is set; `always_fail` fails every
/// run.
pub struct StubCompiler {
    pub always_fail: bool,
    pub partial_outputs: bool,
    pub calls: Arc<Mutex<Vec<CompilerArguments>>>,
}

impl Compiler for StubCompiler {
    fn id(&self) -> &str {
        STUB_ID
    }

    fn compile(
        &self,
        arguments: &CompilerArguments,
        listener: &dyn DiagnosticListener,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        self.calls.lock().unwrap().push(arguments.clone());

        if self.always_fail {
            listener.report(Diagnostic::error("forced failure"));
            return Ok(false);
        }

        let mut ok = true;
        for source in &arguments.sources {
            if fs::read_to_string(source)?.contains(BROKEN) {
                listener.report(
                    Diagnostic::error("cannot compile").at(Location::file(source).at_line(1)),
                );
                ok = false;
                if !self.partial_outputs {
                    continue;
                }
            }
            if let OutputMode::PerSource { .. } = arguments.output_mode {
                let relative = arguments
                    .sourcepath
                    .iter()
                    .find_map(|root| source.strip_prefix(root).ok())
                    .ok_or("source outside every root")?;
                let output = arguments
                    .output_mode
                    .expected_output(&arguments.destination, &to_slash(relative));
                fs::create_dir_all(output.parent().ok_or("no parent")?)?;
                fs::write(output, b"")?;
            }
        }
        if ok && arguments.output_mode.is_aggregate() {
            fs::write(arguments.output_mode.expected_output(&arguments.destination, ""), b"")?;
        }
        Ok(ok)
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Host capabilities with the stub compiler registered.
pub struct Host {
    pub compilers: CompilerManager,
    pub artifacts: InMemoryArtifacts,
    pub calls: Arc<Mutex<Vec<CompilerArguments>>>,
}

impl Host {
    pub fn new() -> Self {
        Self::with_stub(false, false)
    }

    pub fn failing() -> Self {
        Self::with_stub(true, false)
    }

    /// Broken sources still get an output file, as some compilers leave
    /// behind.
    pub fn partial() -> Self {
        Self::with_stub(false, true)
    }

    fn with_stub(always_fail: bool, partial_outputs: bool) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let compilers = CompilerManager::new().with(Box::new(StubCompiler {
            always_fail,
            partial_outputs,
            calls: Arc::clone(&calls),
        }));
        Self {
            compilers,
            artifacts: InMemoryArtifacts::new(),
            calls,
        }
    }

    pub fn context(&self) -> CompileContext<'_> {
        CompileContext {
            compilers: &self.compilers,
            toolchains: &NoToolchains,
            artifacts: &self.artifacts,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> CompilerArguments {
        self.calls.lock().unwrap().last().cloned().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Project layout
// ---------------------------------------------------------------------------

/// A scratch project with `src/main/java`, `src/test/java` and `target/`.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn main_source(&self, name: &str) -> PathBuf {
        self.write(&format!("src/main/java/{name}"), "public class X {}")
    }

    pub fn test_source(&self, name: &str) -> PathBuf {
        self.write(&format!("src/test/java/{name}"), "public class XTest {}")
    }

    pub fn main_dest(&self) -> PathBuf {
        self.path("target/classes")
    }

    pub fn test_dest(&self) -> PathBuf {
        self.path("target/test-classes")
    }

    pub fn main_config(&self) -> CompilerConfig {
        let mut config = CompilerConfig::new(
            SourceRole::Main,
            vec![self.path("src/main/java")],
            self.main_dest(),
        );
        config.compiler_id = STUB_ID.to_string();
        config.level = release("17");
        config.artifact = Some(artifact());
        config
    }

    pub fn test_config(&self) -> CompilerConfig {
        let mut config = CompilerConfig::new(
            SourceRole::Test,
            vec![self.path("src/test/java")],
            self.test_dest(),
        );
        config.compiler_id = STUB_ID.to_string();
        config.level = release("17");
        config.classpath = vec![self.main_dest()];
        config
    }
}

pub fn artifact() -> ArtifactId {
    ArtifactId::new("app", "1.0")
}

pub fn release(level: &str) -> LanguageLevel {
    LanguageLevel {
        release: Some(level.to_string()),
        ..LanguageLevel::default()
    }
}

/// Lists every file below `dir`, relative and `/`-separated, sorted.
pub fn files_under(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| to_slash(e.path().strip_prefix(dir).unwrap()))
        .collect();
    files.sort();
    files
}
