//! Connection pool implementation

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tarn_core::{Connection, ConnectionFactory, Context, PoolError, Result};
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::accounting::{PendingGuard, UsageAccountant};
use super::config::PoolConfig;
use super::gate::AdmissionGate;
use super::idle::{IdleConnection, IdleRegistry};
use super::reaper::IdleReaper;
use super::stats::PoolStats;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

struct PoolInner {
    /// Distinguishes pools so a connection cannot be released into the wrong one
    id: u64,
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    gate: AdmissionGate,
    idle: Arc<IdleRegistry>,
    usage: Arc<UsageAccountant>,
    next_connection_id: AtomicU64,
    closed: AtomicBool,
    /// Cancelled on close or drop; stops the reaper
    shutdown: CancellationToken,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl PoolInner {
    /// Book a returned connection and try to park it
    ///
    /// Returns the connection when it could not be parked and must be closed.
    fn check_in(&self, mut entry: IdleConnection) -> Option<IdleConnection> {
        self.usage.record_active(-1);
        self.usage.record_execution(entry.last_used.elapsed());
        entry.touch();

        if entry.connection.is_closed() {
            tracing::debug!(connection_id = entry.id(), "dropping connection closed by caller");
            self.usage.record_closed();
            return None;
        }

        match self.idle.try_put(entry) {
            Ok(()) => None,
            Err(entry) => {
                tracing::debug!(
                    connection_id = entry.id(),
                    idle_capacity = self.idle.capacity(),
                    "idle registry full, closing connection"
                );
                Some(entry)
            }
        }
    }

    async fn close_rejected(usage: &UsageAccountant, entry: IdleConnection) -> Result<()> {
        match entry.close().await {
            Ok(()) => {
                usage.record_closed();
                Ok(())
            }
            Err(e) => {
                usage.record_close_failure();
                tracing::warn!(error = %e, "failed to close released connection");
                Err(e)
            }
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// A connection pool that bounds, reuses, and reaps connections
///
/// Cloning is cheap; every clone refers to the same pool. At most
/// `max_size` connections are checked out at once. Up to `min_size` returned
/// connections are kept for reuse, and a background reaper closes those idle
/// for longer than the idle timeout.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a new connection pool and start its idle reaper
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PoolError::Configuration("connection pool must be created inside a Tokio runtime".into())
        })?;

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let idle = Arc::new(IdleRegistry::new(config.min_size()));
        let usage = Arc::new(UsageAccountant::new());
        let shutdown = CancellationToken::new();

        let reaper = IdleReaper::new(
            idle.clone(),
            usage.clone(),
            config.idle_timeout(),
            config.reap_interval(),
        )
        .spawn(&runtime, shutdown.child_token());

        tracing::info!(
            pool_id = id,
            min_size = config.min_size(),
            max_size = config.max_size(),
            idle_timeout_ms = config.idle_timeout().as_millis() as u64,
            connect_timeout_ms = config.connect_timeout().as_millis() as u64,
            "connection pool created"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                id,
                gate: AdmissionGate::new(config.max_size()),
                config,
                factory: Arc::new(factory),
                idle,
                usage,
                next_connection_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                shutdown,
                reaper: Mutex::new(Some(reaper)),
            }),
        })
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Wait for a checkout permit, bounded by `ctx`
    /// 2. Reuse an idle connection if one is resting in the registry
    /// 3. Otherwise create a new connection, bounded by the connect timeout
    ///
    /// Returns `Cancelled` or `DeadlineExceeded` when the context ends first,
    /// and `PoolClosed` after [`close`](Self::close). A permit taken before a
    /// failure is returned before the error is.
    #[tracing::instrument(skip(self, ctx), fields(pool_id = self.inner.id))]
    pub async fn acquire(&self, ctx: &Context) -> Result<PooledConnection> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Acquire) {
            return Err(PoolError::PoolClosed);
        }

        let pending = PendingGuard::enter(&inner.usage);
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let permit = inner.gate.acquire(ctx).await;
        drop(pending);
        let permit = permit.map_err(|e| {
            if e.is_context_error() {
                tracing::debug!(error = %e, "caller gave up waiting for a permit");
            }
            e
        })?;

        // The connect timeout starts once admitted; it bounds the idle wait and the create.
        let connect_ctx = ctx.child_with_timeout(inner.config.connect_timeout());

        if let Some(entry) = inner.idle.try_take() {
            tracing::debug!(connection_id = entry.id(), "reusing idle connection");
            return Ok(self.check_out(entry, permit));
        }

        // Not reached while check-in books the return before dropping its
        // permit; a permit holder then always sees active < max.
        if inner.usage.active_count() >= inner.config.max_size() {
            tracing::debug!("pool at capacity, waiting for an idle connection");
            let entry = inner.idle.take(&connect_ctx).await?;
            return Ok(self.check_out(entry, permit));
        }

        let connection_id = inner.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let connection = connect_ctx
            .run(inner.factory.create(connection_id))
            .await?
            .map_err(|e| {
                tracing::error!(connection_id, error = %e, "failed to create connection");
                e
            })?;
        inner.usage.record_created();
        tracing::debug!(connection_id, "created new connection");

        Ok(self.check_out(IdleConnection::new(connection), permit))
    }

    fn check_out(&self, mut entry: IdleConnection, permit: OwnedSemaphorePermit) -> PooledConnection {
        entry.touch();
        self.inner.usage.record_active(1);
        PooledConnection {
            id: entry.id(),
            pool_id: self.inner.id,
            connection: entry.connection.clone(),
            checked_out_at: entry.last_used,
            entry: Some(entry),
            permit: Some(permit),
            pool: Arc::downgrade(&self.inner),
        }
    }

    /// Return a connection to the pool
    ///
    /// The connection is parked for reuse if the idle registry has room and
    /// closed otherwise. The checkout permit is released either way, before
    /// any close is awaited. A connection from a different pool is rejected
    /// with `InvalidRelease` and goes back to the pool it came from.
    #[tracing::instrument(skip(self, conn), fields(pool_id = self.inner.id, connection_id = conn.id))]
    pub async fn release(&self, mut conn: PooledConnection) -> Result<()> {
        if conn.pool_id != self.inner.id {
            return Err(PoolError::InvalidRelease(format!(
                "connection {} belongs to pool {}, not pool {}",
                conn.id, conn.pool_id, self.inner.id
            )));
        }
        let (entry, permit) = conn.take_parts().ok_or_else(|| {
            PoolError::InvalidRelease(format!("connection {} was already released", conn.id))
        })?;

        let rejected = self.inner.check_in(entry);
        drop(permit);

        match rejected {
            Some(entry) => PoolInner::close_rejected(&self.inner.usage, entry).await,
            None => Ok(()),
        }
    }

    /// Shut the pool down
    ///
    /// Stops the reaper, fails current and future waiters with `PoolClosed`,
    /// and closes every idle connection. All idle connections are closed even
    /// if some fail; the first failure is returned. Connections still checked
    /// out are closed when they are released. Closing twice is a no-op.
    #[tracing::instrument(skip(self), fields(pool_id = self.inner.id))]
    pub async fn close(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        inner.shutdown.cancel();
        inner.gate.close();
        let resting = inner.idle.close();
        let resting_count = resting.len();

        let reaper = inner.reaper.lock().take();
        if let Some(reaper) = reaper {
            if let Err(e) = reaper.await {
                tracing::warn!(error = %e, "idle reaper task ended abnormally");
            }
        }

        let mut first_error = None;
        for entry in resting {
            let id = entry.id();
            match entry.close().await {
                Ok(()) => inner.usage.record_closed(),
                Err(e) => {
                    inner.usage.record_close_failure();
                    tracing::warn!(connection_id = id, error = %e, "failed to close idle connection during shutdown");
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::info!(
            closed_idle = resting_count,
            still_active = inner.usage.active_count(),
            "connection pool closed"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of connections currently checked out
    pub fn active_count(&self) -> usize {
        self.inner.usage.active_count()
    }

    /// Number of idle connections resting in the registry
    pub fn idle_count(&self) -> usize {
        self.inner.idle.len()
    }

    /// Number of callers waiting for a checkout permit
    pub fn pending_count(&self) -> usize {
        self.inner.usage.pending_count()
    }

    /// Mean time connections stayed checked out, zero before the first release
    pub fn average_execution_time(&self) -> Duration {
        self.inner.usage.average_execution_time()
    }

    /// Checkout permits not currently held
    pub fn available_permits(&self) -> usize {
        self.inner.gate.available()
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        self.inner.usage.snapshot(
            self.inner.idle.len(),
            self.inner.gate.available(),
            self.inner.gate.capacity(),
        )
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire) || self.inner.idle.is_closed()
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A connection borrowed from the pool
///
/// Holds one checkout permit for as long as it lives. Pass it back with
/// [`ConnectionPool::release`]; if it is dropped instead, it returns itself
/// to its pool and any close that becomes necessary runs in the background.
pub struct PooledConnection {
    id: u64,
    pool_id: u64,
    connection: Arc<dyn Connection>,
    checked_out_at: Instant,
    /// Present until the connection is handed back to the pool
    entry: Option<IdleConnection>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Weak<PoolInner>,
}

impl PooledConnection {
    /// Identity of the underlying connection
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the connection was checked out
    pub fn last_used(&self) -> Instant {
        self.checked_out_at
    }

    fn take_parts(&mut self) -> Option<(IdleConnection, OwnedSemaphorePermit)> {
        match (self.entry.take(), self.permit.take()) {
            (Some(entry), Some(permit)) => Some((entry, permit)),
            _ => None,
        }
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some((entry, permit)) = self.take_parts() else {
            return;
        };
        let Some(inner) = self.pool.upgrade() else {
            return;
        };

        tracing::debug!(connection_id = self.id, pool_id = self.pool_id, "connection dropped without release");
        let rejected = inner.check_in(entry);
        drop(permit);

        if let Some(entry) = rejected {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let usage = inner.usage.clone();
                    runtime.spawn(async move {
                        let _ = PoolInner::close_rejected(&usage, entry).await;
                    });
                }
                Err(_) => {
                    inner.usage.record_closed();
                    tracing::warn!(connection_id = self.id, "no runtime to close dropped connection, discarding it");
                }
            }
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("pool_id", &self.pool_id)
            .field("released", &self.entry.is_none())
            .finish()
    }
}
