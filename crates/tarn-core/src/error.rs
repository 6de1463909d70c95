//! Error types for tarn

use thiserror::Error;

/// Core error type for pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Failed to close connection {id}: {reason}")]
    CloseFailed { id: u64, reason: String },

    #[error("Invalid release: {0}")]
    InvalidRelease(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PoolError {
    /// Whether the error came from the caller's context rather than the pool
    pub fn is_context_error(&self) -> bool {
        matches!(self, PoolError::Cancelled | PoolError::DeadlineExceeded)
    }
}

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;
