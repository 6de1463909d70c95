//! Admission gate: a fixed set of checkout permits

use std::sync::Arc;

use tarn_core::{Context, PoolError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps how many connections may be checked out at once
///
/// A permit is returned to the gate when it is dropped, so every path that
/// takes one gives it back exactly once.
pub(crate) struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a permit until one frees up, the context ends, or the gate closes
    pub(crate) async fn acquire(&self, ctx: &Context) -> Result<OwnedSemaphorePermit> {
        ctx.run(self.semaphore.clone().acquire_owned())
            .await?
            .map_err(|_| PoolError::PoolClosed)
    }

    pub(crate) fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fail every current and future waiter with `PoolClosed`
    pub(crate) fn close(&self) {
        self.semaphore.close();
    }
}
