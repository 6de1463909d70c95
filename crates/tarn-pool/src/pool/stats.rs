//! Pool statistics types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a connection pool
///
/// Provides insight into pool utilization and connection churn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Configured checkout capacity
    pub(super) max_size: usize,
    /// Number of connections currently checked out
    pub(super) active: usize,
    /// Number of idle connections resting in the registry
    pub(super) idle: usize,
    /// Number of callers waiting for a permit
    pub(super) pending: usize,
    /// Checkout permits not currently held
    pub(super) available_permits: usize,
    /// Number of completed checkouts
    pub(super) exec_count: u64,
    /// Mean checkout duration
    pub(super) average_execution: Duration,
    /// Total connections created by the factory
    pub(super) created: u64,
    /// Total connections closed (reaped, overflowed, or shut down)
    pub(super) closed: u64,
    /// Closes that reported an error
    pub(super) close_failures: u64,
}

impl PoolStats {
    /// Get the configured maximum number of checked-out connections
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the number of active (checked-out) connections
    pub fn active(&self) -> usize {
        self.active
    }

    /// Get the number of idle connections
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Get the number of callers waiting for admission
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Get the number of free checkout permits
    pub fn available_permits(&self) -> usize {
        self.available_permits
    }

    /// Get the number of completed checkouts
    pub fn exec_count(&self) -> u64 {
        self.exec_count
    }

    /// Get the mean time a connection stayed checked out
    pub fn average_execution(&self) -> Duration {
        self.average_execution
    }

    /// Get the number of connections the factory has created
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Get the number of connections closed so far
    pub fn closed(&self) -> u64 {
        self.closed
    }

    /// Get the number of closes that failed
    pub fn close_failures(&self) -> u64 {
        self.close_failures
    }

    /// Connections that currently exist: checked out plus idle
    pub fn open(&self) -> usize {
        self.active + self.idle
    }

    /// Calculate checkout utilization as a fraction of capacity (0.0 to 1.0)
    ///
    /// Returns 0.0 if max_size is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.active as f64 / self.max_size as f64
        }
    }

    /// Check if every permit is taken, so the next acquire will wait
    pub fn is_exhausted(&self) -> bool {
        self.max_size > 0 && self.available_permits == 0
    }
}
