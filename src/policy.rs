// src/policy.rs

//! Restart policy.
//!
//! Fixed delay, no exponential growth, no jitter. A shutdown request
//! overrides every other rule.

use std::time::Duration;

use crate::exec::ExitOutcome;
use crate::types::RestartMode;

/// Outcome of consulting the policy after a unit exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartDecision {
    pub should_restart: bool,
    pub delay: Duration,
}

impl RestartDecision {
    pub fn finish() -> Self {
        Self {
            should_restart: false,
            delay: Duration::ZERO,
        }
    }

    pub fn restart_after(delay: Duration) -> Self {
        Self {
            should_restart: true,
            delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub mode: RestartMode,
    pub backoff: Duration,
}

impl RestartPolicy {
    pub fn new(mode: RestartMode, backoff: Duration) -> Self {
        Self { mode, backoff }
    }

    /// Never restart.
    pub fn disabled() -> Self {
        Self::new(RestartMode::Never, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != RestartMode::Never
    }

    pub fn decide(&self, exit: ExitOutcome, shutdown_requested: bool) -> RestartDecision {
        if shutdown_requested {
            return RestartDecision::finish();
        }

        match self.mode {
            RestartMode::Never => RestartDecision::finish(),
            RestartMode::AnyExit => RestartDecision::restart_after(self.backoff),
            RestartMode::NonZero if exit.is_success() => RestartDecision::finish(),
            RestartMode::NonZero => RestartDecision::restart_after(self.backoff),
        }
    }
}
