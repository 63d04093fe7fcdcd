// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_graph_path;

/// Command-line arguments for `taskhive`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskhive",
    version,
    about = "Validate a budgeted task graph and run it against the built-in workers.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the graph file (TOML, or JSON when the extension is `.json`).
    #[arg(long, value_name = "PATH", default_value_os_t = default_graph_path())]
    pub graph: PathBuf,

    /// Ledger session id. Defaults to a fresh UUID.
    #[arg(long, value_name = "ID")]
    pub session: Option<String>,

    /// Validate and print the batch plan, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Reject invalid graphs without trying the repair pass.
    #[arg(long)]
    pub no_repair: bool,

    /// Write the run summary JSON here instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKHIVE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
