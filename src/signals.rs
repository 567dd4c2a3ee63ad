// src/signals.rs

//! Operator termination signals.
//!
//! Unix: SIGINT (Ctrl-C) and SIGTERM. Elsewhere: Ctrl-C only.
//! Signals are delivered as a stream so repeated requests can be observed
//! (and ignored) while a shutdown is already in progress.

use std::io;

#[cfg(unix)]
pub struct TerminationSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    /// Install the handlers. From here on these signals no longer terminate
    /// the supervisor process directly.
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next signal and return its name.
    pub async fn recv(&mut self) -> Option<&'static str> {
        tokio::select! {
            s = self.sigint.recv() => s.map(|_| "SIGINT"),
            s = self.sigterm.recv() => s.map(|_| "SIGTERM"),
        }
    }
}

#[cfg(not(unix))]
pub struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> Option<&'static str> {
        tokio::signal::ctrl_c().await.ok().map(|_| "Ctrl-C")
    }
}
