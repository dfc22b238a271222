//! Source-root traversal producing the candidate files of a compilation unit.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use kiln_common::{normalize_lexically, to_slash};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ResolveError;
use crate::pattern::PatternSet;

/// Whether a source root belongs to the main or the test sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// Production sources.
    Main,
    /// Test sources, compiled against the main output.
    Test,
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRole::Main => write!(f, "main"),
            SourceRole::Test => write!(f, "test"),
        }
    }
}

/// A directory that contains sources for one role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRoot {
    /// Absolute path of the directory.
    pub path: PathBuf,
    /// Main or test.
    pub role: SourceRole,
}

impl SourceRoot {
    /// Creates a source root.
    pub fn new(path: impl Into<PathBuf>, role: SourceRole) -> Self {
        Self {
            path: path.into(),
            role,
        }
    }
}

/// A source file selected for one invocation.
///
/// Produced fresh on every run and never persisted; the build state keys
/// its records by [`relative`](Self::relative).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateFile {
    /// Absolute, lexically normalised path of the file.
    pub path: PathBuf,
    /// The source root the file was found under.
    pub root: PathBuf,
    /// Path relative to `root`, `/`-separated.
    pub relative: String,
    /// Last modification time.
    pub modified: SystemTime,
    /// Size in bytes.
    pub len: u64,
}

/// Walks every root and returns the files selected by `patterns`.
///
/// Roots that do not exist contribute nothing. Files reachable through more
/// than one root are kept once, under the first root. Within a root, files
/// are returned in file-name order.
pub fn resolve(
    roots: &[SourceRoot],
    patterns: &PatternSet,
) -> Result<Vec<CandidateFile>, ResolveError> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for root in roots {
        let root_path = normalize_lexically(&root.path);
        if !root_path.exists() {
            debug!(root = %root_path.display(), role = %root.role, "source root does not exist, skipping");
            continue;
        }
        if !root_path.is_dir() {
            return Err(ResolveError::Unreadable {
                path: root_path,
                source: std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
            });
        }

        let before = files.len();
        walk_root(&root_path, patterns, &mut seen, &mut files)?;
        debug!(
            root = %root_path.display(),
            role = %root.role,
            selected = files.len() - before,
            "scanned source root"
        );
    }

    Ok(files)
}

fn walk_root(
    root: &Path,
    patterns: &PatternSet,
    seen: &mut HashSet<PathBuf>,
    files: &mut Vec<CandidateFile>,
) -> Result<(), ResolveError> {
    let walker = walkdir::WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = to_slash(rel);
        if !patterns.matches(&relative) {
            continue;
        }

        let path = normalize_lexically(entry.path());
        if !seen.insert(path.clone()) {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| walk_error(root, e))?;
        let modified = metadata
            .modified()
            .map_err(|e| ResolveError::Unreadable {
                path: path.clone(),
                source: e,
            })?;

        files.push(CandidateFile {
            path,
            root: root.to_path_buf(),
            relative,
            modified,
            len: metadata.len(),
        });
    }

    Ok(())
}

fn walk_error(root: &Path, err: walkdir::Error) -> ResolveError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
    ResolveError::Unreadable { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "class X {}").unwrap();
    }

    fn java_patterns() -> PatternSet {
        PatternSet::new(&[], &[], "java").unwrap()
    }

    #[test]
    fn walks_recursively_with_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "com/example/App.java");
        write(dir.path(), "Main.java");
        write(dir.path(), "README.md");

        let roots = [SourceRoot::new(dir.path(), SourceRole::Main)];
        let files = resolve(&roots, &java_patterns()).unwrap();
        let rels: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(rels, vec!["Main.java", "com/example/App.java"]);
        assert!(files.iter().all(|f| f.path.is_absolute()));
        assert_eq!(files[0].len, 10);
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let roots = [SourceRoot::new(dir.path().join("absent"), SourceRole::Test)];
        assert!(resolve(&roots, &java_patterns()).unwrap().is_empty());
    }

    #[test]
    fn file_as_root_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "A.java");
        let roots = [SourceRoot::new(dir.path().join("A.java"), SourceRole::Main)];
        let err = resolve(&roots, &java_patterns()).unwrap_err();
        assert!(matches!(err, ResolveError::Unreadable { .. }));
    }

    #[test]
    fn excluded_files_never_appear() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=4 {
            write(dir.path(), &format!("TestCompile{n}.java"));
        }
        let patterns = PatternSet::new(
            &["**/TestCompile4*.java".to_string()],
            &["**/TestCompile2*.java".to_string(), "**/TestCompile3*.java".to_string()],
            "java",
        )
        .unwrap();
        let roots = [SourceRoot::new(dir.path(), SourceRole::Main)];
        let files = resolve(&roots, &patterns).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, "TestCompile4.java");
    }

    #[test]
    fn overlapping_roots_deduplicate() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pkg/A.java");
        let roots = [
            SourceRoot::new(dir.path(), SourceRole::Main),
            SourceRoot::new(dir.path().join("pkg"), SourceRole::Main),
            SourceRoot::new(dir.path().join("pkg/../pkg"), SourceRole::Main),
        ];
        let files = resolve(&roots, &java_patterns()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, "pkg/A.java");
    }

    #[test]
    fn role_display() {
        assert_eq!(SourceRole::Main.to_string(), "main");
        assert_eq!(SourceRole::Test.to_string(), "test");
    }
}
