//! Pool configuration types

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tarn_core::{PoolError, Result};
use tokio::sync::Semaphore;

const DEFAULT_IDLE_TIMEOUT_MS: u64 = 600_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

fn default_idle_timeout_ms() -> u64 {
    DEFAULT_IDLE_TIMEOUT_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Configuration for a connection pool
///
/// Controls pool sizing and timeouts. Immutable once the pool is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Capacity of the idle registry (connections kept around for reuse)
    min_size: usize,
    /// Maximum number of connections checked out at the same time
    max_size: usize,
    /// Timeout in milliseconds before an idle connection is closed
    #[serde(default = "default_idle_timeout_ms")]
    idle_timeout_ms: u64,
    /// Timeout in milliseconds for creating a connection or waiting for an idle one
    #[serde(default = "default_connect_timeout_ms")]
    connect_timeout_ms: u64,
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// # Panics
    ///
    /// Panics if `min_size > max_size` or if `max_size` is 0.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );
        assert!(
            min_size <= max_size,
            "min_size ({}) cannot exceed max_size ({})",
            min_size,
            max_size
        );

        Self {
            min_size,
            max_size,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }

    /// Parse a configuration from TOML
    ///
    /// ```toml
    /// min_size = 5
    /// max_size = 10
    /// idle_timeout_ms = 20000
    /// connect_timeout_ms = 5000
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| PoolError::Configuration(format!("invalid pool config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            PoolError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    /// Check the invariants `new` asserts, plus non-zero timeouts and a
    /// `max_size` the admission gate can represent
    ///
    /// Deserialized configs bypass `new`, so the pool re-checks them here.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(PoolError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        if self.max_size > Semaphore::MAX_PERMITS {
            return Err(PoolError::Configuration(format!(
                "max_size ({}) cannot exceed {}",
                self.max_size,
                Semaphore::MAX_PERMITS
            )));
        }
        if self.min_size > self.max_size {
            return Err(PoolError::Configuration(format!(
                "min_size ({}) cannot exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.idle_timeout_ms == 0 {
            return Err(PoolError::Configuration(
                "idle_timeout must be greater than 0".into(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(PoolError::Configuration(
                "connect_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the connect timeout in milliseconds
    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    /// Get the minimum pool size (idle registry capacity)
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the idle timeout as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Get the connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// How often the reaper sweeps the idle registry: half the idle timeout
    pub fn reap_interval(&self) -> Duration {
        (self.idle_timeout() / 2).max(Duration::from_millis(1))
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - min_size: 1
    /// - max_size: 10
    /// - idle_timeout: 10 minutes
    /// - connect_timeout: 30 seconds
    fn default() -> Self {
        Self::new(1, 10)
    }
}
