// src/exec/process.rs

//! Live child process wrapper.
//!
//! `ProcessHandle::launch` spawns the unit's command and hands the `Child`
//! to a small reaper task. The reaper is the only owner of the `Child`: it
//! waits for exit, performs forced kills on request, and publishes the exit
//! outcome on a `watch` channel. That lets any number of callers `wait` or
//! `request_graceful_stop` concurrently without sharing `&mut Child`.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

use crate::discovery::UnitDescriptor;
use crate::errors::{FleetError, Result};

/// Exit code reported for processes that never started or whose status
/// could not be collected.
pub const SYNTHETIC_FAILURE_CODE: i32 = -1;

/// How a unit's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    /// Non-zero exit code, or `SYNTHETIC_FAILURE_CODE` when killed by a signal.
    Failed(i32),
    /// The process could not be spawned at all.
    LaunchFailed,
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }

    pub fn code(&self) -> i32 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::Failed(code) => *code,
            ExitOutcome::LaunchFailed => SYNTHETIC_FAILURE_CODE,
        }
    }

    fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            ExitOutcome::Success
        } else {
            ExitOutcome::Failed(status.code().unwrap_or(SYNTHETIC_FAILURE_CODE))
        }
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process had already exited; nothing was sent.
    AlreadyExited,
    /// The process exited within the timeout after the graceful request.
    Graceful,
    /// The timeout elapsed and the process was killed.
    ForceKilled,
}

/// Output pipes of a freshly launched process.
#[derive(Debug, Default)]
pub struct ProcessOutput {
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
}

/// Cloneable control surface for a live process: wait, graceful stop,
/// forced kill. Holds no I/O.
#[derive(Debug, Clone)]
pub struct StopHandle {
    unit: Arc<str>,
    pid: Option<u32>,
    exit_rx: watch::Receiver<Option<ExitOutcome>>,
    force_kill: Arc<Notify>,
}

impl StopHandle {
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit outcome if the process has already terminated.
    pub fn try_exit(&self) -> Option<ExitOutcome> {
        *self.exit_rx.borrow()
    }

    /// Suspend until the process has exited.
    pub async fn wait(&self) -> ExitOutcome {
        let mut rx = self.exit_rx.clone();
        let published = rx
            .wait_for(|outcome| outcome.is_some())
            .await
            .map(|outcome| *outcome)
            .ok()
            .flatten();

        // `None` only if the reaper was dropped without publishing, which
        // happens when the runtime itself is shutting down.
        published
            .or_else(|| *rx.borrow())
            .unwrap_or(ExitOutcome::Failed(SYNTHETIC_FAILURE_CODE))
    }

    /// Ask the process to terminate, escalating to a kill after `timeout`.
    ///
    /// Returns once the process is confirmed dead. Calling this on a process
    /// that already exited returns `AlreadyExited` at once; the unit's process
    /// group is still asked to terminate, since background members can outlive
    /// the leader and keep its output open.
    pub async fn request_graceful_stop(&self, timeout: Duration) -> StopOutcome {
        if self.try_exit().is_some() {
            self.send_terminate();
            return StopOutcome::AlreadyExited;
        }

        debug!(unit = %self.unit, pid = ?self.pid, "sending graceful stop request");
        if !self.send_terminate() {
            // No graceful primitive available; go straight to the kill.
            self.force_kill.notify_one();
            self.wait().await;
            return StopOutcome::ForceKilled;
        }

        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(_) => StopOutcome::Graceful,
            Err(_) => {
                warn!(
                    unit = %self.unit,
                    pid = ?self.pid,
                    timeout_ms = timeout.as_millis() as u64,
                    "unit did not stop within timeout; force killing"
                );
                self.force_kill.notify_one();
                self.wait().await;
                StopOutcome::ForceKilled
            }
        }
    }

    /// SIGKILL whatever is left of the unit's process group. Safe to call
    /// after the leader was reaped.
    pub fn kill_leftovers(&self) {
        kill_group(self.pid);
    }

    /// Send SIGTERM to the unit's process group. Returns false when no
    /// graceful primitive exists on this platform.
    #[cfg(unix)]
    fn send_terminate(&self) -> bool {
        if let Some(pid) = self.pid {
            signal_group(pid, nix::sys::signal::Signal::SIGTERM);
        }
        true
    }

    #[cfg(not(unix))]
    fn send_terminate(&self) -> bool {
        false
    }
}

/// One live child process owned by a unit's lifecycle task.
#[derive(Debug)]
pub struct ProcessHandle {
    descriptor: Arc<UnitDescriptor>,
    control: StopHandle,
    output: Option<ProcessOutput>,
}

impl ProcessHandle {
    /// Spawn the unit's command in its working directory with stdout and
    /// stderr piped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch(descriptor: &UnitDescriptor) -> Result<ProcessHandle> {
        let mut cmd = Command::new(&descriptor.command);
        cmd.args(&descriptor.args)
            .current_dir(&descriptor.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group: terminal Ctrl-C reaches only the supervisor, and
        // stop signals reach the whole unit (e.g. `uv` and its interpreter).
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| FleetError::launch(&descriptor.name, &descriptor.command, e))?;

        let pid = child.id();
        let output = ProcessOutput {
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
        };

        let (exit_tx, exit_rx) = watch::channel(None);
        let force_kill = Arc::new(Notify::new());
        let unit: Arc<str> = Arc::from(descriptor.name.as_str());

        tokio::spawn(reap(
            child,
            Arc::clone(&unit),
            pid,
            Arc::clone(&force_kill),
            exit_tx,
        ));

        info!(
            unit = %descriptor.name,
            pid = ?pid,
            dir = ?descriptor.working_dir,
            cmd = %descriptor.command_line(),
            "unit process started"
        );

        Ok(ProcessHandle {
            descriptor: Arc::new(descriptor.clone()),
            control: StopHandle {
                unit,
                pid,
                exit_rx,
                force_kill,
            },
            output: Some(output),
        })
    }

    pub fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    /// Process id, present while the process is live.
    pub fn pid(&self) -> Option<u32> {
        match self.control.try_exit() {
            Some(_) => None,
            None => self.control.pid,
        }
    }

    /// Exit code, present once the process has terminated.
    pub fn exit_code(&self) -> Option<i32> {
        self.control.try_exit().map(|o| o.code())
    }

    /// Take the output pipes. Returns empty pipes on the second call.
    pub fn take_output(&mut self) -> ProcessOutput {
        self.output.take().unwrap_or_default()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.control.clone()
    }

    pub async fn wait(&self) -> ExitOutcome {
        self.control.wait().await
    }

    pub async fn request_graceful_stop(&self, timeout: Duration) -> StopOutcome {
        self.control.request_graceful_stop(timeout).await
    }
}

/// Own the child until it exits; publish the outcome exactly once.
async fn reap(
    mut child: Child,
    unit: Arc<str>,
    pid: Option<u32>,
    force_kill: Arc<Notify>,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = force_kill.notified() => {
                kill_group(pid);
                if let Err(e) = child.start_kill() {
                    debug!(unit = %unit, error = %e, "kill failed; process probably already exited");
                }
            }
        }
    };

    let outcome = match status {
        Ok(status) => ExitOutcome::from_status(status),
        Err(e) => {
            warn!(unit = %unit, pid = ?pid, error = %e, "failed to collect exit status");
            ExitOutcome::Failed(SYNTHETIC_FAILURE_CODE)
        }
    };

    debug!(unit = %unit, pid = ?pid, ?outcome, "unit process reaped");
    exit_tx.send_replace(Some(outcome));
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        signal_group(pid, nix::sys::signal::Signal::SIGKILL);
    }
}

// Only the direct child can be killed here.
#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!(pid, ?signal, error = %e, "signalling process group failed"),
    }
}
