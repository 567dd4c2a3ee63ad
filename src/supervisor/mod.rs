// src/supervisor/mod.rs

//! Top-level orchestration.
//!
//! One [`lifecycle`] task per unit runs concurrently on the Tokio runtime.
//! The [`Supervisor`] waits for either every unit to finish or a shutdown
//! request, and in the latter case runs the [`shutdown`] path exactly once.
//!
//! All shared mutable state lives in [`state::SupervisorState`]; lifecycle
//! tasks only touch their own entry, the shutdown path only reads a
//! snapshot.

pub mod lifecycle;
pub mod shutdown;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::discovery::UnitDescriptor;
use crate::exec::{ConsoleSink, OutputSink};
use crate::policy::RestartPolicy;

pub use lifecycle::{UnitEvent, UnitReport, UnitState, OUTPUT_DRAIN_GRACE};
pub use shutdown::{ShutdownHandle, ShutdownSummary};

use lifecycle::UnitLifecycle;
use state::SupervisorState;

/// What a supervisor run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per unit, in completion order.
    pub units: Vec<UnitReport>,
    /// Present when the run ended through the shutdown path.
    pub shutdown: Option<ShutdownSummary>,
}

pub struct Supervisor {
    units: Vec<UnitDescriptor>,
    policy: RestartPolicy,
    stop_timeout: Duration,
    sink: Arc<dyn OutputSink>,
    events: Option<mpsc::UnboundedSender<UnitEvent>>,
    state: Arc<SupervisorState>,
}

impl Supervisor {
    pub fn new(units: Vec<UnitDescriptor>, policy: RestartPolicy, stop_timeout: Duration) -> Self {
        let state = Arc::new(SupervisorState::new(units.len()));
        Self {
            units,
            policy,
            stop_timeout,
            sink: Arc::new(ConsoleSink),
            events: None,
            state,
        }
    }

    /// Replace the default STDOUT sink.
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Receive a [`UnitEvent`] for every lifecycle step.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<UnitEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Run every unit until all are finished or shutdown is requested
    /// through a [`ShutdownHandle`].
    pub async fn run(self) -> RunReport {
        let mut report = RunReport::default();

        if self.units.is_empty() {
            info!("0 units found; nothing to supervise");
            return report;
        }

        info!(
            units = self.units.len(),
            restart = ?self.policy.mode,
            "starting units"
        );

        let mut tasks = JoinSet::new();
        for descriptor in self.units.iter().cloned() {
            let lifecycle = UnitLifecycle {
                descriptor,
                state: Arc::clone(&self.state),
                policy: self.policy,
                stop_timeout: self.stop_timeout,
                sink: Arc::clone(&self.sink),
                events: self.events.clone(),
            };
            tasks.spawn(lifecycle.run());
        }

        let mut shutdown_rx = self.state.subscribe_shutdown();
        let shutdown_requested = loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(joined) => collect(&mut report, joined),
                    None => break false,
                },
                _ = state::shutdown_requested(&mut shutdown_rx) => break true,
            }
        };

        if shutdown_requested {
            let summary = shutdown::stop_all(&self.state, self.stop_timeout).await;
            while let Some(joined) = tasks.join_next().await {
                collect(&mut report, joined);
            }
            info!(%summary, "shutdown complete");
            report.shutdown = Some(summary);
        } else {
            info!(
                remaining = self.state.active_units(),
                "all units finished"
            );
        }

        report
    }
}

fn collect(report: &mut RunReport, joined: Result<UnitReport, tokio::task::JoinError>) {
    match joined {
        Ok(unit) => report.units.push(unit),
        Err(e) => error!(error = %e, "unit lifecycle task failed"),
    }
}
