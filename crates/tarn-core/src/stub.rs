//! In-memory connection with no real I/O
//!
//! Used by the demo driver and by tests that only care about pool behavior.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::{Connection, ConnectionFactory, Result};

/// A connection that only tracks whether it has been closed
#[derive(Debug)]
pub struct StubConnection {
    id: u64,
    closed: AtomicBool,
}

impl StubConnection {
    /// Create a new open stub connection
    pub fn new(id: u64) -> Self {
        Self {
            id,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Connection for StubConnection {
    fn id(&self) -> u64 {
        self.id
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::trace!(connection_id = self.id, "stub connection closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Factory for [`StubConnection`]s, optionally simulating connect latency
#[derive(Debug, Clone, Default)]
pub struct StubFactory {
    connect_delay: Duration,
}

impl StubFactory {
    /// Create a factory that connects instantly
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` on every create to mimic a handshake
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }
}

#[async_trait]
impl ConnectionFactory for StubFactory {
    async fn create(&self, id: u64) -> Result<Box<dyn Connection>> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        Ok(Box::new(StubConnection::new(id)))
    }
}
