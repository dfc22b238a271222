//! Kiln CLI: the command-line interface for incremental compilation.
//!
//! Provides `kiln compile` for the main sources, `kiln test-compile` for the
//! test sources, and `kiln build` for both in order.

#![warn(missing_docs)]

mod compile;
mod project;

use std::io::IsTerminal;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use kiln_source::SourceRole;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "KILN_LOG";

/// Kiln, an incremental compiler driver.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln incremental compiler driver")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `kiln.toml` file or the directory containing it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile the main sources.
    Compile(CompileArgs),
    /// Compile the test sources against the main output.
    TestCompile(CompileArgs),
    /// Compile the main sources, then the test sources.
    Build(CompileArgs),
}

/// Arguments shared by the compile commands.
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Output format for diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Compile(ref args) => compile::run(&[SourceRole::Main], args, &global),
        Command::TestCompile(ref args) => compile::run(&[SourceRole::Test], args, &global),
        Command::Build(ref args) => {
            compile::run(&[SourceRole::Main, SourceRole::Test], args, &global)
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr log subscriber.
///
/// `-v` and `-q` take precedence over `KILN_LOG`; without either the
/// variable applies, defaulting to `info`.
fn init_logging(global: &GlobalArgs) {
    let filter = match log_level(global) {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(global.color)
        .with_target(false)
        .init();
}

fn log_level(global: &GlobalArgs) -> Option<&'static str> {
    if global.verbose {
        Some("debug")
    } else if global.quiet {
        Some("error")
    } else {
        None
    }
}
