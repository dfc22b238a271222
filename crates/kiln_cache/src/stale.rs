//! Staleness analysis: which candidates must be recompiled.
//!
//! Compares each candidate against its [`FileRecord`] in the previous
//! [`BuildState`] and checks that its expected output still exists. The
//! comparison strategy is chosen by [`Staleness`]; in aggregate output mode
//! the decision is all-or-nothing.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use kiln_common::{ContentHash, OutputMode, Staleness};
use kiln_source::CandidateFile;
use tracing::debug;

use crate::state::{modified_ns, BuildState, FileRecord};

/// Why a candidate was judged stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StaleReason {
    /// No record of the file in the previous state.
    New,
    /// The file changed since it was recorded.
    Changed,
    /// The file's expected output is missing from the destination.
    MissingOutput,
    /// Aggregate mode: another candidate is stale, so every one is.
    Aggregate,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::New => write!(f, "new"),
            StaleReason::Changed => write!(f, "changed"),
            StaleReason::MissingOutput => write!(f, "missing output"),
            StaleReason::Aggregate => write!(f, "aggregate rebuild"),
        }
    }
}

/// A candidate that must be recompiled, with the reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaleFile {
    /// The candidate.
    pub file: CandidateFile,
    /// Why it is stale.
    pub reason: StaleReason,
}

/// Result of comparing the current candidates against the previous state.
#[derive(Clone, Debug, Default)]
pub struct Analysis {
    /// Candidates that must be recompiled, in candidate order.
    pub stale: Vec<StaleFile>,

    /// Relative paths recorded in the previous state that are no longer
    /// candidates, sorted.
    pub removed: Vec<String>,

    /// Record to persist for every candidate, keyed by relative path.
    pub observed: BTreeMap<String, FileRecord>,
}

impl Analysis {
    /// Returns `true` if nothing needs to be recompiled.
    pub fn is_up_to_date(&self) -> bool {
        self.stale.is_empty()
    }

    /// Iterates over the stale candidates.
    pub fn stale_files(&self) -> impl Iterator<Item = &CandidateFile> {
        self.stale.iter().map(|s| &s.file)
    }

    /// Returns the number of stale candidates.
    pub fn stale_count(&self) -> usize {
        self.stale.len()
    }
}

/// Decides which candidates are stale.
///
/// `state` must already be filtered for compatibility; `None` means every
/// candidate is new. Empty `candidates` yield an empty analysis without
/// touching the filesystem.
pub fn analyze(
    candidates: &[CandidateFile],
    state: Option<&BuildState>,
    output_mode: &OutputMode,
    destination: &Path,
    strategy: Staleness,
) -> Analysis {
    if candidates.is_empty() {
        return Analysis {
            removed: removed_entries(candidates, state),
            ..Analysis::default()
        };
    }

    let mut observed = BTreeMap::new();
    let mut reasons = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let previous = state.and_then(|s| s.files.get(&candidate.relative));
        let (record, changed) = observe(candidate, previous, strategy);
        let reason = match previous {
            None => Some(StaleReason::New),
            Some(_) if changed => Some(StaleReason::Changed),
            Some(_) if !output_mode.is_aggregate() => {
                let output = output_mode.expected_output(destination, &candidate.relative);
                (!output.exists()).then_some(StaleReason::MissingOutput)
            }
            Some(_) => None,
        };
        observed.insert(candidate.relative.clone(), record);
        reasons.push(reason);
    }

    if output_mode.is_aggregate() {
        let output = output_mode.expected_output(destination, "");
        let output_missing = !output.exists();
        let any_stale = reasons.iter().any(Option::is_some);
        if any_stale || output_missing {
            let fallback = if output_missing {
                StaleReason::MissingOutput
            } else {
                StaleReason::Aggregate
            };
            for reason in &mut reasons {
                reason.get_or_insert(fallback);
            }
        }
    }

    let stale: Vec<StaleFile> = candidates
        .iter()
        .zip(reasons)
        .filter_map(|(file, reason)| {
            let reason = reason?;
            debug!(file = %file.relative, %reason, "stale");
            Some(StaleFile {
                file: file.clone(),
                reason,
            })
        })
        .collect();

    let removed = removed_entries(candidates, state);
    for rel in &removed {
        debug!(file = %rel, "source removed since last build");
    }

    Analysis {
        stale,
        removed,
        observed,
    }
}

/// Builds the record for `candidate` and reports whether it changed
/// relative to `previous`. With no previous record the file counts as
/// changed.
fn observe(
    candidate: &CandidateFile,
    previous: Option<&FileRecord>,
    strategy: Staleness,
) -> (FileRecord, bool) {
    let modified = modified_ns(candidate.modified);
    match strategy {
        Staleness::Timestamp => {
            let changed = previous.map_or(true, |p| modified > p.modified_ns);
            let record = FileRecord {
                modified_ns: modified,
                len: candidate.len,
                content_hash: None,
            };
            (record, changed)
        }
        Staleness::ContentHash => {
            if let Some(p) = previous {
                if p.modified_ns == modified && p.len == candidate.len && p.content_hash.is_some()
                {
                    return (p.clone(), false);
                }
            }
            // Unreadable now means stale; the compiler will report it.
            let hash = ContentHash::from_file(&candidate.path).ok();
            let changed = match (previous, hash) {
                (Some(p), Some(h)) => p.content_hash != Some(h),
                _ => true,
            };
            let record = FileRecord {
                modified_ns: modified,
                len: candidate.len,
                content_hash: hash,
            };
            (record, changed)
        }
    }
}

fn removed_entries(candidates: &[CandidateFile], state: Option<&BuildState>) -> Vec<String> {
    let Some(state) = state else {
        return Vec::new();
    };
    let current: HashSet<&str> = candidates.iter().map(|c| c.relative.as_str()).collect();
    state
        .files
        .keys()
        .filter(|k| !current.contains(k.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        dest: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("src");
            let dest = dir.path().join("classes");
            fs::create_dir_all(&root).unwrap();
            fs::create_dir_all(&dest).unwrap();
            Self {
                _dir: dir,
                root,
                dest,
            }
        }

        fn source(&self, rel: &str, content: &str) -> CandidateFile {
            let path = self.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            self.candidate(rel)
        }

        fn candidate(&self, rel: &str) -> CandidateFile {
            let path = self.root.join(rel);
            let meta = fs::metadata(&path).unwrap();
            CandidateFile {
                path,
                root: self.root.clone(),
                relative: rel.to_string(),
                modified: meta.modified().unwrap(),
                len: meta.len(),
            }
        }

        fn output(&self, rel: &str) {
            let path = self.dest.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "cafebabe").unwrap();
        }

        fn state(&self, mode: OutputMode, analysis: &Analysis) -> BuildState {
            let mut state = BuildState::new(&self.dest, mode, "test");
            state.files = analysis.observed.clone();
            state
        }
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    fn rels(analysis: &Analysis) -> Vec<&str> {
        analysis.stale.iter().map(|s| s.file.relative.as_str()).collect()
    }

    #[test]
    fn no_state_means_everything_is_new() {
        let fx = Fixture::new();
        let files = vec![fx.source("A.java", "a"), fx.source("p/B.java", "b")];
        let mode = OutputMode::default();

        let analysis = analyze(&files, None, &mode, &fx.dest, Staleness::ContentHash);
        assert_eq!(rels(&analysis), vec!["A.java", "p/B.java"]);
        assert!(analysis.stale.iter().all(|s| s.reason == StaleReason::New));
        assert_eq!(analysis.observed.len(), 2);
        assert!(analysis.removed.is_empty());
    }

    #[test]
    fn second_run_is_up_to_date() {
        let fx = Fixture::new();
        let files = vec![fx.source("A.java", "a"), fx.source("p/B.java", "b")];
        let mode = OutputMode::default();
        let first = analyze(&files, None, &mode, &fx.dest, Staleness::ContentHash);
        fx.output("A.class");
        fx.output("p/B.class");
        let state = fx.state(mode.clone(), &first);

        let second = analyze(&files, Some(&state), &mode, &fx.dest, Staleness::ContentHash);
        assert!(second.is_up_to_date());
        assert_eq!(second.observed, first.observed);
    }

    #[test]
    fn touched_but_identical_is_not_stale() {
        let fx = Fixture::new();
        let files = vec![fx.source("A.java", "class A {}")];
        let mode = OutputMode::default();
        let first = analyze(&files, None, &mode, &fx.dest, Staleness::ContentHash);
        fx.output("A.class");
        let state = fx.state(mode.clone(), &first);

        set_mtime(&files[0].path, SystemTime::now() + Duration::from_secs(60));
        let touched = vec![fx.candidate("A.java")];
        let analysis = analyze(&touched, Some(&state), &mode, &fx.dest, Staleness::ContentHash);
        assert!(analysis.is_up_to_date());
        // The new mtime is recorded so the next run skips hashing
        assert_ne!(
            analysis.observed["A.java"].modified_ns,
            state.files["A.java"].modified_ns
        );
    }

    #[test]
    fn modified_content_is_stale() {
        let fx = Fixture::new();
        let files = vec![fx.source("A.java", "class A {}"), fx.source("B.java", "class B {}")];
        let mode = OutputMode::default();
        let first = analyze(&files, None, &mode, &fx.dest, Staleness::ContentHash);
        fx.output("A.class");
        fx.output("B.class");
        let state = fx.state(mode.clone(), &first);

        let files = vec![fx.source("A.java", "class A { int x; }"), fx.candidate("B.java")];
        let analysis = analyze(&files, Some(&state), &mode, &fx.dest, Staleness::ContentHash);
        assert_eq!(rels(&analysis), vec!["A.java"]);
        assert_eq!(analysis.stale[0].reason, StaleReason::Changed);
    }

    #[test]
    fn deleted_output_makes_source_stale() {
        let fx = Fixture::new();
        let files = vec![fx.source("A.java", "a"), fx.source("B.java", "b")];
        let mode = OutputMode::default();
        let first = analyze(&files, None, &mode, &fx.dest, Staleness::ContentHash);
        fx.output("A.class");
        let state = fx.state(mode.clone(), &first);

        let analysis = analyze(&files, Some(&state), &mode, &fx.dest, Staleness::ContentHash);
        assert_eq!(rels(&analysis), vec!["B.java"]);
        assert_eq!(analysis.stale[0].reason, StaleReason::MissingOutput);
    }

    #[test]
    fn timestamp_strategy_equal_mtime_is_not_stale() {
        let fx = Fixture::new();
        let files = vec![fx.source("A.java", "a")];
        let mode = OutputMode::default();
        let first = analyze(&files, None, &mode, &fx.dest, Staleness::Timestamp);
        assert!(first.observed["A.java"].content_hash.is_none());
        fx.output("A.class");
        let state = fx.state(mode.clone(), &first);

        // Content changes but the mtime is forced back to the recorded value
        let recorded = files[0].modified;
        fs::write(&files[0].path, "b").unwrap();
        set_mtime(&files[0].path, recorded);
        let same = vec![fx.candidate("A.java")];
        let analysis = analyze(&same, Some(&state), &mode, &fx.dest, Staleness::Timestamp);
        assert!(analysis.is_up_to_date());

        set_mtime(&files[0].path, recorded - Duration::from_secs(10));
        let older = vec![fx.candidate("A.java")];
        let analysis = analyze(&older, Some(&state), &mode, &fx.dest, Staleness::Timestamp);
        assert!(analysis.is_up_to_date());

        set_mtime(&files[0].path, recorded + Duration::from_secs(10));
        let newer = vec![fx.candidate("A.java")];
        let analysis = analyze(&newer, Some(&state), &mode, &fx.dest, Staleness::Timestamp);
        assert_eq!(analysis.stale[0].reason, StaleReason::Changed);
    }

    #[test]
    fn aggregate_is_all_or_nothing() {
        let fx = Fixture::new();
        let files = vec![
            fx.source("A.java", "a"),
            fx.source("B.java", "b"),
            fx.source("C.java", "c"),
        ];
        let mode = OutputMode::aggregate("compiled.class");
        let first = analyze(&files, None, &mode, &fx.dest, Staleness::ContentHash);
        assert_eq!(first.stale_count(), 3);
        fx.output("compiled.class");
        let state = fx.state(mode.clone(), &first);

        let analysis = analyze(&files, Some(&state), &mode, &fx.dest, Staleness::ContentHash);
        assert!(analysis.is_up_to_date());

        let files = vec![fx.candidate("A.java"), fx.source("B.java", "bb"), fx.candidate("C.java")];
        let analysis = analyze(&files, Some(&state), &mode, &fx.dest, Staleness::ContentHash);
        assert_eq!(analysis.stale_count(), 3);
        assert_eq!(analysis.stale[0].reason, StaleReason::Aggregate);
        assert_eq!(analysis.stale[1].reason, StaleReason::Changed);
    }

    #[test]
    fn aggregate_missing_output_rebuilds_all() {
        let fx = Fixture::new();
        let files = vec![fx.source("A.java", "a"), fx.source("B.java", "b")];
        let mode = OutputMode::aggregate("compiled.class");
        let first = analyze(&files, None, &mode, &fx.dest, Staleness::ContentHash);
        let state = fx.state(mode.clone(), &first);

        let analysis = analyze(&files, Some(&state), &mode, &fx.dest, Staleness::ContentHash);
        assert_eq!(analysis.stale_count(), 2);
        assert!(analysis
            .stale
            .iter()
            .all(|s| s.reason == StaleReason::MissingOutput));
    }

    #[test]
    fn removed_sources_are_reported() {
        let fx = Fixture::new();
        let files = vec![fx.source("A.java", "a"), fx.source("B.java", "b")];
        let mode = OutputMode::default();
        let first = analyze(&files, None, &mode, &fx.dest, Staleness::ContentHash);
        fx.output("A.class");
        let state = fx.state(mode.clone(), &first);

        let analysis = analyze(&files[..1], Some(&state), &mode, &fx.dest, Staleness::ContentHash);
        assert!(analysis.is_up_to_date());
        assert_eq!(analysis.removed, vec!["B.java".to_string()]);
        assert!(!analysis.observed.contains_key("B.java"));
    }

    #[test]
    fn empty_candidates_yield_empty_analysis() {
        let fx = Fixture::new();
        let analysis = analyze(
            &[],
            None,
            &OutputMode::default(),
            &fx.dest.join("never"),
            Staleness::ContentHash,
        );
        assert!(analysis.is_up_to_date());
        assert!(analysis.observed.is_empty());
        assert!(!fx.dest.join("never").exists());
    }

    #[test]
    fn reason_display() {
        assert_eq!(StaleReason::MissingOutput.to_string(), "missing output");
        assert_eq!(StaleReason::New.to_string(), "new");
    }
}
