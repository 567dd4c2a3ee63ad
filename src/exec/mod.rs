// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] launches a unit's command with `tokio::process::Command`
//!   and provides wait / graceful-stop / kill primitives.
//! - [`output`] turns a process's pipes into `[unit] line` records on a
//!   shared sink.

pub mod output;
pub mod process;

pub use output::{multiplex, ConsoleSink, OutputSink};
pub use process::{ExitOutcome, ProcessHandle, ProcessOutput, StopHandle, StopOutcome};
