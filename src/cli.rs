// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `scatter`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scatter",
    version,
    about = "Run commands on multiple SSH nodes with real-time output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the node configuration file (TOML).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override the SSH key of every node.
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Do not write per-node log files.
    #[arg(long)]
    pub no_logs: bool,

    /// Parse + validate, print nodes and commands, but don't connect anywhere.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCATTER_LOG` or a default level will be used.
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
