//! Path normalisation helpers.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Converts a path to a string using `/` as the only separator.
pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.replace('\\', "/")
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Removes `.` components and folds `..` into its parent without touching
/// the filesystem (symlinks are not resolved).
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Makes each path absolute against `base`, normalises it, and drops later
/// duplicates. Order of first occurrence is preserved.
pub fn dedup_paths<I, P>(paths: I, base: &Path) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            normalize_lexically(path)
        } else {
            normalize_lexically(&base.join(path))
        };
        if seen.insert(absolute.clone()) {
            out.push(absolute);
        }
    }
    out
}
