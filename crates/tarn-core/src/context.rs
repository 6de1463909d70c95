//! Cancellation and deadline propagation for blocking pool calls
//!
//! A [`Context`] travels with every call that may suspend. It carries a
//! cancellation token and an optional deadline, and reports which of the two
//! ended the wait.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{PoolError, Result};

/// Caller-supplied cancellation and deadline scope
///
/// Cloning a context shares the same token; cancelling any clone cancels all
/// of them. Use [`Context::child_with_timeout`] to derive a narrower scope
/// that is cancelled with its parent but can expire on its own.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Replace the cancellation token, e.g. to tie the context to a shutdown signal
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Derive a child scope bounded by `timeout`
    ///
    /// The child is cancelled when the parent is. Its deadline is the earlier
    /// of the parent's deadline and `now + timeout`. Cancelling the child
    /// does not affect the parent.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let local = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => parent.min(local),
            None => local,
        };
        Self {
            cancellation: self.cancellation.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and every child derived from it
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// The underlying cancellation token
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The deadline, if one was set
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Why the context is done, or `None` while it is still live
    ///
    /// Cancellation takes precedence over an elapsed deadline.
    pub fn err(&self) -> Option<PoolError> {
        if self.cancellation.is_cancelled() {
            return Some(PoolError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(PoolError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the context is cancelled or its deadline passes
    pub async fn done(&self) -> PoolError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancellation.cancelled() => PoolError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => self.err().unwrap_or(PoolError::DeadlineExceeded),
            },
            None => {
                self.cancellation.cancelled().await;
                PoolError::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the context ends first
    ///
    /// A future that is ready on its first poll wins over a context that
    /// ends at the same instant, but a context that is already done never
    /// polls `fut` at all.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            output = fut => Ok(output),
            err = self.done() => Err(err),
        }
    }
}
