//! Single-permit gate serializing every network call across all workflows.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("another request is already in flight")]
pub struct GateHeld;

/// At most one [`BusyPermit`] exists at a time. Acquisition never waits: a
/// held gate means the caller's action is swallowed, not queued.
#[derive(Clone)]
pub struct BusyGate {
    permits: Arc<Semaphore>,
    busy_tx: Arc<watch::Sender<bool>>,
}

impl BusyGate {
    pub fn new() -> Self {
        let (busy_tx, _) = watch::channel(false);
        Self {
            permits: Arc::new(Semaphore::new(1)),
            busy_tx: Arc::new(busy_tx),
        }
    }

    pub fn try_acquire(&self, operation: &'static str) -> Result<BusyPermit, GateHeld> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| GateHeld)?;
        publish(&self.permits, &self.busy_tx);
        debug!(operation, "busy gate acquired");
        Ok(BusyPermit {
            permit: Some(permit),
            permits: Arc::clone(&self.permits),
            busy_tx: Arc::clone(&self.busy_tx),
            operation,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.busy_tx.subscribe()
    }
}

impl Default for BusyGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped hold on the [`BusyGate`]; dropping it frees the gate on every exit
/// path, including cancellation of the owning future.
pub struct BusyPermit {
    permit: Option<OwnedSemaphorePermit>,
    permits: Arc<Semaphore>,
    busy_tx: Arc<watch::Sender<bool>>,
    operation: &'static str,
}

impl Drop for BusyPermit {
    fn drop(&mut self) {
        drop(self.permit.take());
        publish(&self.permits, &self.busy_tx);
        debug!(operation = self.operation, "busy gate released");
    }
}

/// Writes the semaphore's current state into the watch flag. Reading and
/// writing happen under the watch lock, so the last publisher always leaves
/// the flag matching the semaphore even when a release and an acquire race.
fn publish(permits: &Semaphore, busy_tx: &watch::Sender<bool>) {
    busy_tx.send_if_modified(|busy| {
        let held = permits.available_permits() == 0;
        let changed = *busy != held;
        *busy = held;
        changed
    });
}
