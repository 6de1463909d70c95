//! Background sweep that closes connections idle past the timeout

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::accounting::UsageAccountant;
use super::idle::IdleRegistry;

/// Closes idle connections whose last use is older than `idle_timeout`
pub(crate) struct IdleReaper {
    registry: Arc<IdleRegistry>,
    usage: Arc<UsageAccountant>,
    idle_timeout: Duration,
    interval: Duration,
}

impl IdleReaper {
    pub(crate) fn new(
        registry: Arc<IdleRegistry>,
        usage: Arc<UsageAccountant>,
        idle_timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            usage,
            idle_timeout,
            interval,
        }
    }

    /// Run on `runtime` until `shutdown` is cancelled
    pub(crate) fn spawn(
        self,
        runtime: &tokio::runtime::Handle,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        runtime.spawn(async move { self.run(shutdown).await })
    }

    async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.sweep().await;
        }
        tracing::debug!("idle reaper stopped");
    }

    /// Close every expired idle connection, returning how many were removed
    pub(crate) async fn sweep(&self) -> usize {
        let expired = self.registry.reap_expired(self.idle_timeout, Instant::now());
        let count = expired.len();

        for entry in expired {
            let id = entry.id();
            match entry.close().await {
                Ok(()) => {
                    self.usage.record_closed();
                    tracing::debug!(connection_id = id, "closed idle connection");
                }
                Err(e) => {
                    self.usage.record_close_failure();
                    tracing::warn!(connection_id = id, error = %e, "failed to close idle connection");
                }
            }
        }

        if count > 0 {
            tracing::debug!(reaped = count, remaining = self.registry.len(), "idle sweep complete");
        }
        count
    }
}
