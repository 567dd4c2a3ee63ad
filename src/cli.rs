// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::types::{parse_duration, RestartMode};

/// Command-line arguments for `fleetrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fleetrun",
    version,
    about = "Discover worker units under a directory and run them all, multiplexing their output.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory whose subdirectories are the units.
    #[arg(value_name = "ROOT", default_value = "agents")]
    pub root: PathBuf,

    /// Path to a config file (TOML).
    ///
    /// Default: `Fleetrun.toml` in the working directory, if it exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Relaunch units after they exit (same as `--restart-mode any-exit`).
    #[arg(long)]
    pub restart: bool,

    /// Which exits trigger a relaunch. Overrides `--restart`.
    #[arg(long, value_enum, value_name = "MODE")]
    pub restart_mode: Option<RestartMode>,

    /// Delay before a relaunch, e.g. `5s` or `500ms`.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub restart_delay: Option<Duration>,

    /// How long a unit gets to exit after SIGTERM before it is killed.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub stop_timeout: Option<Duration>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLEETRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Discover units and print their commands, but launch nothing.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Restart mode requested on the command line, if any.
    pub fn requested_restart_mode(&self) -> Option<RestartMode> {
        match (self.restart_mode, self.restart) {
            (Some(mode), _) => Some(mode),
            (None, true) => Some(RestartMode::AnyExit),
            (None, false) => None,
        }
    }
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
