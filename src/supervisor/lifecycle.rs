// src/supervisor/lifecycle.rs

//! Per-unit lifecycle task.
//!
//! ```text
//! Launching -> Running -> Exited -> Restarting -> Launching ...
//!                            \-> Finished
//! ```
//!
//! A launch failure goes straight to `Exited` with
//! [`ExitOutcome::LaunchFailed`]. The backoff wait in `Restarting` is cut
//! short by a shutdown request, which moves the unit to `Finished`.
//!
//! `Exited` is reached once the leader is reaped and its output drained.
//! Background members of the unit's process group can keep the pipes open
//! after the leader is gone, so that drain is bounded: after
//! [`OUTPUT_DRAIN_GRACE`] (or the stop timeout, during shutdown) the rest of
//! the group is killed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::discovery::{UnitDescriptor, UnitName};
use crate::exec::{multiplex, ExitOutcome, OutputSink, ProcessHandle, StopHandle};
use crate::policy::RestartPolicy;

use super::state::{shutdown_requested, SupervisorState};

/// How long output may stay open after the leader exited before the rest of
/// the unit's process group is killed.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Launching,
    Running,
    Exited,
    Restarting,
    Finished,
}

/// Notifications emitted by lifecycle tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    Launched {
        unit: UnitName,
        pid: Option<u32>,
    },
    LaunchFailed {
        unit: UnitName,
        error: String,
    },
    /// Sent after the unit's output has been drained, or abandoned once the
    /// drain grace period ran out.
    Exited {
        unit: UnitName,
        outcome: ExitOutcome,
        lines: usize,
    },
    Restarting {
        unit: UnitName,
        delay: Duration,
    },
    Finished {
        unit: UnitName,
        launches: u32,
    },
}

/// What a lifecycle task reports when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub unit: UnitName,
    pub launches: u32,
    pub last_exit: Option<ExitOutcome>,
}

pub(crate) struct UnitLifecycle {
    pub(crate) descriptor: UnitDescriptor,
    pub(crate) state: Arc<SupervisorState>,
    pub(crate) policy: RestartPolicy,
    pub(crate) stop_timeout: Duration,
    pub(crate) sink: Arc<dyn OutputSink>,
    pub(crate) events: Option<mpsc::UnboundedSender<UnitEvent>>,
}

impl UnitLifecycle {
    pub(crate) async fn run(self) -> UnitReport {
        let unit = self.descriptor.name.clone();
        let mut shutdown_rx = self.state.subscribe_shutdown();
        let mut current = UnitState::Launching;
        let mut launches = 0u32;
        let mut last_exit = None;

        loop {
            self.transition(&mut current, UnitState::Launching);

            let exit = match self.state.launch(&self.descriptor) {
                Ok(Some(handle)) => {
                    launches += 1;
                    self.transition(&mut current, UnitState::Running);
                    self.emit(UnitEvent::Launched {
                        unit: unit.clone(),
                        pid: handle.pid(),
                    });
                    self.supervise(handle).await
                }
                Ok(None) => {
                    debug!(unit = %unit, "shutdown requested; not launching");
                    break;
                }
                Err(err) => {
                    error!(unit = %unit, error = %err, "unit failed to launch");
                    self.emit(UnitEvent::LaunchFailed {
                        unit: unit.clone(),
                        error: err.to_string(),
                    });
                    self.emit(UnitEvent::Exited {
                        unit: unit.clone(),
                        outcome: ExitOutcome::LaunchFailed,
                        lines: 0,
                    });
                    ExitOutcome::LaunchFailed
                }
            };

            self.transition(&mut current, UnitState::Exited);
            last_exit = Some(exit);

            let decision = self
                .policy
                .decide(exit, self.state.is_shutdown_requested());
            if !decision.should_restart {
                break;
            }

            self.transition(&mut current, UnitState::Restarting);
            warn!(
                unit = %unit,
                delay_ms = decision.delay.as_millis() as u64,
                "unit stopped; restarting after delay"
            );
            self.emit(UnitEvent::Restarting {
                unit: unit.clone(),
                delay: decision.delay,
            });

            tokio::select! {
                _ = tokio::time::sleep(decision.delay) => {}
                _ = shutdown_requested(&mut shutdown_rx) => {
                    info!(unit = %unit, "shutdown requested during restart delay; not relaunching");
                    break;
                }
            }
        }

        self.transition(&mut current, UnitState::Finished);
        let remaining = self.state.unit_finished();
        debug!(unit = %unit, launches, remaining, "unit finished");
        self.emit(UnitEvent::Finished {
            unit: unit.clone(),
            launches,
        });

        UnitReport {
            unit,
            launches,
            last_exit,
        }
    }

    /// Stream output until the process exits and its pipes are drained,
    /// then drop the unit from the live set.
    async fn supervise(&self, mut handle: ProcessHandle) -> ExitOutcome {
        let unit = self.descriptor.name.as_str();
        let drain = multiplex(unit, handle.take_output(), &*self.sink);
        tokio::pin!(drain);

        let mut drained = None;
        let outcome = tokio::select! {
            outcome = handle.wait() => outcome,
            lines = &mut drain => {
                drained = Some(lines);
                handle.wait().await
            }
        };

        match outcome {
            ExitOutcome::Success => info!(unit, "unit exited successfully"),
            other => warn!(unit, exit_code = other.code(), "unit exited with failure"),
        }

        let lines = match drained {
            Some(lines) => lines,
            None => self.finish_drain(&handle.stop_handle(), drain.as_mut()).await,
        };
        self.state.release(unit);

        self.emit(UnitEvent::Exited {
            unit: unit.to_string(),
            outcome,
            lines,
        });
        outcome
    }

    /// Wait for output still open after the leader exited, killing the rest
    /// of the process group if it does not close in time.
    async fn finish_drain<F>(&self, stop: &StopHandle, mut drain: Pin<&mut F>) -> usize
    where
        F: Future<Output = usize>,
    {
        let unit = self.descriptor.name.as_str();
        let mut shutdown_rx = self.state.subscribe_shutdown();

        tokio::select! {
            lines = &mut drain => return lines,
            _ = tokio::time::sleep(OUTPUT_DRAIN_GRACE) => {}
            _ = shutdown_requested(&mut shutdown_rx) => {
                // The shutdown path sends SIGTERM to the group.
                if let Ok(lines) = tokio::time::timeout(self.stop_timeout, &mut drain).await {
                    return lines;
                }
            }
        }

        warn!(unit, "output still open after unit exited; killing leftover processes");
        stop.kill_leftovers();

        match tokio::time::timeout(OUTPUT_DRAIN_GRACE, drain).await {
            Ok(lines) => lines,
            Err(_) => {
                warn!(unit, "output held open outside the unit's process group; abandoning it");
                0
            }
        }
    }

    fn transition(&self, current: &mut UnitState, next: UnitState) {
        if *current != next {
            debug!(unit = %self.descriptor.name, from = ?*current, to = ?next, "unit state change");
            *current = next;
        }
    }

    fn emit(&self, event: UnitEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
