//! Usage accounting shared by every caller of a pool

use std::time::Duration;

use parking_lot::Mutex;

use super::stats::PoolStats;

#[derive(Debug, Default)]
struct Counters {
    active: usize,
    pending: usize,
    exec_count: u64,
    exec_total: Duration,
    created: u64,
    closed: u64,
    close_failures: u64,
}

/// Counters for checkouts, waiters, and execution time
///
/// All reads and writes go through a single lock. Critical sections never
/// block or await.
#[derive(Debug, Default)]
pub(crate) struct UsageAccountant {
    counters: Mutex<Counters>,
}

impl UsageAccountant {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_active(&self, delta: isize) {
        let mut counters = self.counters.lock();
        counters.active = counters.active.saturating_add_signed(delta);
    }

    pub(crate) fn record_pending(&self, delta: isize) {
        let mut counters = self.counters.lock();
        counters.pending = counters.pending.saturating_add_signed(delta);
    }

    pub(crate) fn record_execution(&self, elapsed: Duration) {
        let mut counters = self.counters.lock();
        counters.exec_count += 1;
        counters.exec_total += elapsed;
    }

    pub(crate) fn record_created(&self) {
        self.counters.lock().created += 1;
    }

    pub(crate) fn record_closed(&self) {
        self.counters.lock().closed += 1;
    }

    /// A close was attempted and failed; the connection is gone either way
    pub(crate) fn record_close_failure(&self) {
        let mut counters = self.counters.lock();
        counters.closed += 1;
        counters.close_failures += 1;
    }

    pub(crate) fn active_count(&self) -> usize {
        self.counters.lock().active
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.counters.lock().pending
    }

    /// Mean time a connection stayed checked out, zero before the first release
    pub(crate) fn average_execution_time(&self) -> Duration {
        let counters = self.counters.lock();
        average(counters.exec_total, counters.exec_count)
    }

    pub(crate) fn snapshot(&self, idle: usize, available_permits: usize, max_size: usize) -> PoolStats {
        let counters = self.counters.lock();
        PoolStats {
            max_size,
            active: counters.active,
            idle,
            pending: counters.pending,
            available_permits,
            exec_count: counters.exec_count,
            average_execution: average(counters.exec_total, counters.exec_count),
            created: counters.created,
            closed: counters.closed,
            close_failures: counters.close_failures,
        }
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    // Duration only divides by u32; go through nanoseconds for larger counts.
    match u32::try_from(count) {
        Ok(count) => total / count,
        Err(_) => Duration::from_nanos((total.as_nanos() / u128::from(count)) as u64),
    }
}

/// Counts a caller as pending until the guard is dropped
///
/// Dropping covers every exit, including the acquire future itself being
/// dropped mid-wait, so the count is decremented exactly once.
pub(crate) struct PendingGuard<'a> {
    usage: &'a UsageAccountant,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn enter(usage: &'a UsageAccountant) -> Self {
        usage.record_pending(1);
        Self { usage }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.usage.record_pending(-1);
    }
}
