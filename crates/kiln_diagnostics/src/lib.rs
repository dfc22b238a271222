//! Compiler diagnostics: records, severity, collection, parsing, and rendering.
//!
//! A [`Diagnostic`] is one message reported by a compiler, with an optional
//! source [`Location`]. In-process compilers report through the
//! [`DiagnosticListener`] trait (implemented by the thread-safe
//! [`DiagnosticSink`]); forked compilers print text, which
//! [`parse_compiler_output`] turns into the same records. Renderers format
//! them for the terminal or as JSON.

#![warn(missing_docs)]

pub mod diagnostic;
pub mod parse;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use diagnostic::{Diagnostic, Location};
pub use parse::parse_compiler_output;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::{DiagnosticListener, DiagnosticSink};
