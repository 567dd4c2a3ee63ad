// src/supervisor/state.rs

//! Shared supervisor state.
//!
//! The live-handle set and the shutdown flag sit behind one mutex. Launching
//! happens while holding it, so "check flag, spawn, insert" is atomic with
//! respect to "set flag, snapshot live set". Spawning is synchronous, so the
//! lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use tokio::sync::watch;

use crate::discovery::{UnitDescriptor, UnitName};
use crate::errors::{FleetError, Result};
use crate::exec::{ProcessHandle, StopHandle};

#[derive(Debug, Default)]
struct Inner {
    live: HashMap<UnitName, StopHandle>,
    shutdown_requested: bool,
    active_units: usize,
}

#[derive(Debug)]
pub(crate) struct SupervisorState {
    inner: Mutex<Inner>,
    shutdown_tx: watch::Sender<bool>,
}

impl SupervisorState {
    pub(crate) fn new(active_units: usize) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Mutex::new(Inner {
                active_units,
                ..Inner::default()
            }),
            shutdown_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Launch a process for `descriptor` and register it as live.
    ///
    /// Returns `Ok(None)` without spawning anything once shutdown has been
    /// requested.
    pub(crate) fn launch(&self, descriptor: &UnitDescriptor) -> Result<Option<ProcessHandle>> {
        let mut inner = self.lock();
        if inner.shutdown_requested {
            return Ok(None);
        }
        if inner.live.contains_key(&descriptor.name) {
            return Err(FleetError::Other(anyhow!(
                "unit '{}' already has a live process",
                descriptor.name
            )));
        }

        let handle = ProcessHandle::launch(descriptor)?;
        inner
            .live
            .insert(descriptor.name.clone(), handle.stop_handle());
        Ok(Some(handle))
    }

    /// Drop a unit's live entry once its exit is collected and output drained.
    pub(crate) fn release(&self, unit: &str) {
        self.lock().live.remove(unit);
    }

    pub(crate) fn unit_finished(&self) -> usize {
        let mut inner = self.lock();
        inner.active_units = inner.active_units.saturating_sub(1);
        inner.active_units
    }

    /// Set the shutdown flag. Returns `true` only for the first call.
    pub(crate) fn request_shutdown(&self) -> bool {
        let mut inner = self.lock();
        if inner.shutdown_requested {
            return false;
        }
        inner.shutdown_requested = true;
        self.shutdown_tx.send_replace(true);
        true
    }

    pub(crate) fn is_shutdown_requested(&self) -> bool {
        self.lock().shutdown_requested
    }

    pub(crate) fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Snapshot of every live process, sorted by unit name.
    pub(crate) fn live_handles(&self) -> Vec<StopHandle> {
        let inner = self.lock();
        let mut handles: Vec<StopHandle> = inner.live.values().cloned().collect();
        handles.sort_by(|a, b| a.unit().cmp(b.unit()));
        handles
    }

    pub(crate) fn active_units(&self) -> usize {
        self.lock().active_units
    }
}

/// Resolve once the shutdown flag is set (immediately if it already is).
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // Err means the state was dropped, which also ends supervision.
    let _ = rx.wait_for(|requested| *requested).await;
}
