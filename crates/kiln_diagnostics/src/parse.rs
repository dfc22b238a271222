//! Parsing of a forked compiler's text output into diagnostics.
//!
//! Recognised header forms:
//!
//! ```text
//! src/A.java:12: error: ';' expected
//! src/A.kt:3:7: warning: unused variable
//! error: invalid flag: -foo
//! Note: Some input files use unchecked or unsafe operations.
//! ```
//!
//! Lines following a header (source excerpt, caret, `symbol:` details) are
//! attached to it as notes. A caret line also supplies the column when the
//! header had none. Summary lines such as `2 errors` are dropped. Anything
//! else before the first header becomes a diagnostic of
//! [`Severity::Other`].

use crate::diagnostic::{Diagnostic, Location};
use crate::severity::Severity;

const KEYWORDS: [&str; 3] = ["error", "warning", "note"];

/// Parses combined stdout/stderr text into diagnostics, preserving order.
pub fn parse_compiler_output(output: &str) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut current: Option<Diagnostic> = None;

    for raw in output.lines() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if is_summary(line) {
            diagnostics.extend(current.take());
            continue;
        }
        if let Some(diag) = parse_header(line) {
            diagnostics.extend(current.take());
            current = Some(diag);
            continue;
        }
        match current.as_mut() {
            Some(diag) => {
                fill_column_from_caret(diag, line);
                diag.notes.push(line.to_string());
            }
            None => diagnostics.push(Diagnostic::new(Severity::Other, line.trim())),
        }
    }

    diagnostics.extend(current);
    diagnostics
}

/// Parses a header line, located or not.
fn parse_header(line: &str) -> Option<Diagnostic> {
    for keyword in KEYWORDS {
        for prefix in [format!("{keyword}: "), format!("{}: ", capitalize(keyword))] {
            if let Some(message) = line.strip_prefix(prefix.as_str()) {
                let severity = Severity::from_keyword(keyword)?;
                return Some(Diagnostic::new(severity, message.trim()));
            }
        }
    }

    let (pos, keyword) = KEYWORDS
        .iter()
        .filter_map(|kw| line.find(&format!(": {kw}: ")).map(|pos| (pos, *kw)))
        .min_by_key(|(pos, _)| *pos)?;

    let location = parse_location(&line[..pos])?;
    let message = &line[pos + keyword.len() + 4..];
    let severity = Severity::from_keyword(keyword)?;
    Some(Diagnostic::new(severity, message.trim()).at(location))
}

/// Parses `file[:line[:column]]`. Drive-letter colons stay part of the file.
fn parse_location(head: &str) -> Option<Location> {
    let mut file = head;
    let mut numbers = Vec::new();
    while numbers.len() < 2 {
        match file.rsplit_once(':') {
            Some((rest, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
                numbers.push(tail.parse::<u32>().ok()?);
                file = rest;
            }
            _ => break,
        }
    }
    if file.trim().is_empty() {
        return None;
    }

    let mut location = Location::file(file.trim());
    match numbers.as_slice() {
        [line] => location = location.at_line(*line),
        [column, line] => location = location.at_line(*line).at_column(*column),
        _ => {}
    }
    Some(location)
}

/// Returns `true` for lines like `1 error` or `3 warnings`.
fn is_summary(line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let (Some(count), Some(word), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    count.bytes().all(|b| b.is_ascii_digit())
        && matches!(word, "error" | "errors" | "warning" | "warnings")
}

fn fill_column_from_caret(diag: &mut Diagnostic, line: &str) {
    let Some(location) = diag.location.as_mut() else {
        return;
    };
    if location.line.is_none() || location.column.is_some() {
        return;
    }
    if line.trim() == "^" {
        if let Some(idx) = line.find('^') {
            location.column = u32::try_from(idx + 1).ok();
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
