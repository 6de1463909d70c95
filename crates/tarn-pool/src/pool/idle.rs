//! Idle registry: bounded cache of connections ready for reuse

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tarn_core::{Connection, Context, PoolError, Result};
use tokio::sync::Notify;
use tokio::time::Instant;

/// A connection together with the last time it was in use
pub(crate) struct IdleConnection {
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) last_used: Instant,
}

impl IdleConnection {
    pub(crate) fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection: Arc::from(connection),
            last_used: Instant::now(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.connection.id()
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    fn is_expired(&self, idle_timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_used) > idle_timeout
    }

    /// Close the underlying connection, tagging any failure with its id
    pub(crate) async fn close(self) -> Result<()> {
        let id = self.id();
        self.connection
            .close()
            .await
            .map_err(|e| PoolError::CloseFailed {
                id,
                reason: e.to_string(),
            })
    }
}

struct IdleState {
    entries: VecDeque<IdleConnection>,
    closed: bool,
}

/// Holds at most `capacity` idle connections
///
/// Every operation on the contents happens under one short lock, so a
/// reaper sweep can never interleave with a take or a put.
pub(crate) struct IdleRegistry {
    capacity: usize,
    state: Mutex<IdleState>,
    available: Notify,
}

impl IdleRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(IdleState {
                entries: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
        }
    }

    /// Take the oldest idle connection, if any
    pub(crate) fn try_take(&self) -> Option<IdleConnection> {
        self.state.lock().entries.pop_front()
    }

    /// Park a connection for reuse
    ///
    /// Hands the connection back when the registry is full or closed; the
    /// caller is then responsible for closing it.
    pub(crate) fn try_put(&self, entry: IdleConnection) -> std::result::Result<(), IdleConnection> {
        {
            let mut state = self.state.lock();
            if state.closed || state.entries.len() >= self.capacity {
                return Err(entry);
            }
            state.entries.push_back(entry);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Wait for an idle connection until one is put, the context ends, or the registry closes
    pub(crate) async fn take(&self, ctx: &Context) -> Result<IdleConnection> {
        loop {
            // Register interest before checking so a put between the check
            // and the await still wakes us.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(entry) = state.entries.pop_front() {
                    return Ok(entry);
                }
                if state.closed {
                    return Err(PoolError::PoolClosed);
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                err = ctx.done() => return Err(err),
            }
        }
    }

    /// Remove and return every entry idle for longer than `idle_timeout`
    ///
    /// Survivors are reinserted in their original order before the lock is
    /// released.
    pub(crate) fn reap_expired(&self, idle_timeout: Duration, now: Instant) -> Vec<IdleConnection> {
        let mut state = self.state.lock();
        let mut expired = Vec::new();
        for entry in std::mem::take(&mut state.entries) {
            if entry.is_expired(idle_timeout, now) {
                expired.push(entry);
            } else {
                state.entries.push_back(entry);
            }
        }
        expired
    }

    /// Refuse further puts, wake every waiter, and hand back what was resting
    pub(crate) fn close(&self) -> Vec<IdleConnection> {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.entries.drain(..).collect()
        };
        self.available.notify_waiters();
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
