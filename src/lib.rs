// src/lib.rs

pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod policy;
pub mod signals;
pub mod supervisor;
pub mod types;

use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::discovery::{resolve, Discovery};
use crate::errors::FleetError;
use crate::policy::RestartPolicy;
use crate::signals::TerminationSignals;
use crate::supervisor::{RunReport, ShutdownHandle, Supervisor};
use crate::types::RestartMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + CLI overrides
/// - unit discovery
/// - the supervisor
/// - SIGINT / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(args.config.as_deref())?;
    apply_cli_overrides(&mut cfg, &args)?;

    let discovery = resolve(&args.root, &cfg.discovery)?;
    print_discovery(&args.root, &discovery);

    if args.dry_run || discovery.is_empty() {
        return Ok(());
    }

    let policy = RestartPolicy::new(cfg.supervisor.restart, cfg.supervisor.restart_delay);
    print_banner(&policy);

    let supervisor = Supervisor::new(
        discovery.into_descriptors(),
        policy,
        cfg.supervisor.stop_timeout,
    );

    spawn_signal_listener(supervisor.shutdown_handle())?;

    let report = supervisor.run().await;
    print_report(&report);
    Ok(())
}

/// CLI flags win over the config file.
pub fn apply_cli_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> crate::errors::Result<()> {
    if let Some(mode) = args.requested_restart_mode() {
        cfg.supervisor.restart = mode;
    }
    if let Some(delay) = args.restart_delay {
        cfg.supervisor.restart_delay = delay;
    }
    if let Some(timeout) = args.stop_timeout {
        if timeout.is_zero() {
            return Err(FleetError::ConfigError(
                "--stop-timeout must be greater than zero".to_string(),
            ));
        }
        cfg.supervisor.stop_timeout = timeout;
    }
    Ok(())
}

/// Forward termination signals to the supervisor. Only the first one starts
/// the shutdown path.
fn spawn_signal_listener(handle: ShutdownHandle) -> Result<()> {
    let mut signals = TerminationSignals::install()?;

    tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            if handle.request_shutdown() {
                println!("\nStopping all units...");
                info!(signal, "termination requested; shutting down");
            } else {
                warn!(signal, "shutdown already in progress; ignoring signal");
            }
        }
        error!("signal stream closed; no further termination requests will be seen");
    });

    Ok(())
}

fn print_discovery(root: &Path, discovery: &Discovery) {
    if discovery.is_empty() {
        println!("0 units found in {}", root.display());
    } else {
        println!("Found {} units in {}:", discovery.units.len(), root.display());
    }

    for unit in &discovery.units {
        let file = unit
            .launch_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  - {} → {}", unit.descriptor.name, file);
        println!("      cmd: {}", unit.descriptor.command_line());
    }

    for warning in &discovery.warnings {
        println!("  ! skipped {warning}");
    }
}

fn print_banner(policy: &RestartPolicy) {
    println!();
    println!("Starting all units...");
    if policy.is_enabled() {
        let which = match policy.mode {
            RestartMode::NonZero => "failed exits only",
            _ => "any exit",
        };
        println!("Auto-restart enabled ({which}, after {:?})", policy.backoff);
    }
    println!("Press Ctrl+C to stop all units");
    println!();
}

fn print_report(report: &RunReport) {
    println!();
    match report.shutdown {
        Some(summary) => println!("All units stopped: {summary}"),
        None => println!("All units finished"),
    }
    for unit in &report.units {
        let last = match unit.last_exit {
            Some(exit) if exit.is_success() => "success".to_string(),
            Some(exit) => format!("exit code {}", exit.code()),
            None => "never launched".to_string(),
        };
        println!("  - {}: {} launch(es), last: {}", unit.unit, unit.launches, last);
    }
}
