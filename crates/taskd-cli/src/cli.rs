//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskd",
    version,
    about = "Run directory-server admin tasks with dependency-aware scheduling.",
    long_about = None
)]
pub struct CliArgs {
    /// Scheduler config (TOML). Built-in defaults when omitted.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// JSON array of task entries to submit as one batch.
    #[arg(long, value_name = "PATH")]
    pub tasks: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
