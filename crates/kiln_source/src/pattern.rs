//! Include/exclude glob matching over root-relative paths.
//!
//! Patterns use `/` as separator (`\` is accepted and normalised), `**` for
//! any number of directories including none, `*` and `?` within a single
//! path segment. A trailing `/` selects everything below a directory.

use glob::{MatchOptions, Pattern};

use crate::error::ResolveError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Returns the include pattern used when none is configured: every file
/// with the given extension anywhere below the root.
pub fn default_include(source_extension: &str) -> String {
    format!("**/*.{source_extension}")
}

/// A compiled set of include and exclude patterns.
///
/// A path is selected if it matches at least one include and no exclude.
/// Excludes always win; their order is irrelevant.
#[derive(Debug, Clone)]
pub struct PatternSet {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PatternSet {
    /// Compiles include and exclude patterns.
    ///
    /// An empty include list falls back to [`default_include`] for
    /// `source_extension`.
    pub fn new(
        includes: &[String],
        excludes: &[String],
        source_extension: &str,
    ) -> Result<Self, ResolveError> {
        let includes = if includes.is_empty() {
            vec![compile(&default_include(source_extension))?]
        } else {
            includes.iter().map(|p| compile(p)).collect::<Result<_, _>>()?
        };
        let excludes = excludes.iter().map(|p| compile(p)).collect::<Result<_, _>>()?;
        Ok(Self { includes, excludes })
    }

    /// Returns `true` if `relative` is selected by this set.
    pub fn matches(&self, relative: &str) -> bool {
        let path = normalize(relative);
        self.includes
            .iter()
            .any(|p| p.matches_with(&path, MATCH_OPTIONS))
            && !self
                .excludes
                .iter()
                .any(|p| p.matches_with(&path, MATCH_OPTIONS))
    }
}

fn compile(raw: &str) -> Result<Pattern, ResolveError> {
    let mut pattern = normalize(raw);
    if pattern.is_empty() || pattern.ends_with('/') {
        pattern.push_str("**/*");
    }
    Pattern::new(&pattern).map_err(|e| ResolveError::InvalidPattern {
        pattern: raw.to_string(),
        reason: e.msg.to_string(),
    })
}

fn normalize(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    path.trim_start_matches('/').to_string()
}
