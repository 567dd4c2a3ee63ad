// src/supervisor/shutdown.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::exec::StopOutcome;

use super::state::SupervisorState;

/// Counts of how each live unit stopped during shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    pub graceful: usize,
    pub force_killed: usize,
    pub already_exited: usize,
}

impl ShutdownSummary {
    pub fn total(&self) -> usize {
        self.graceful + self.force_killed + self.already_exited
    }

    fn record(&mut self, outcome: StopOutcome) {
        match outcome {
            StopOutcome::Graceful => self.graceful += 1,
            StopOutcome::ForceKilled => self.force_killed += 1,
            StopOutcome::AlreadyExited => self.already_exited += 1,
        }
    }
}

impl fmt::Display for ShutdownSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stopped gracefully, {} force-killed, {} already exited",
            self.graceful, self.force_killed, self.already_exited
        )
    }
}

/// Cloneable trigger for the supervisor's shutdown path.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    pub(crate) state: Arc<SupervisorState>,
}

impl ShutdownHandle {
    /// Request shutdown. Returns `true` for the first request; later calls
    /// change nothing and return `false`.
    pub fn request_shutdown(&self) -> bool {
        self.state.request_shutdown()
    }

    pub fn is_requested(&self) -> bool {
        self.state.is_shutdown_requested()
    }
}

/// Stop every live process concurrently, each bounded by `timeout`.
///
/// The caller must have set the shutdown flag first, so that the snapshot
/// taken here cannot miss a unit launched afterwards.
pub(crate) async fn stop_all(state: &SupervisorState, timeout: Duration) -> ShutdownSummary {
    let targets = state.live_handles();
    info!(
        units = targets.len(),
        timeout_ms = timeout.as_millis() as u64,
        "stopping live units"
    );

    let mut stops = JoinSet::new();
    for handle in targets {
        stops.spawn(async move {
            let outcome = handle.request_graceful_stop(timeout).await;
            (handle.unit().to_string(), outcome)
        });
    }

    let mut summary = ShutdownSummary::default();
    while let Some(joined) = stops.join_next().await {
        match joined {
            Ok((unit, outcome)) => {
                info!(unit = %unit, ?outcome, "unit stopped");
                summary.record(outcome);
            }
            Err(e) => error!(error = %e, "stop task failed"),
        }
    }

    summary
}
