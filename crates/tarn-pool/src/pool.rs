//! Connection pooling
//!
//! This module provides a connection pool with a fixed checkout capacity, a
//! bounded cache of idle connections, a background reaper for stale idle
//! connections, and usage accounting.
//!
//! # Example
//!
//! ```ignore
//! use tarn_core::{Context, StubFactory};
//! use tarn_pool::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(5, 20)
//!     .with_connect_timeout_ms(5000)
//!     .with_idle_timeout_ms(300000);
//!
//! let pool = ConnectionPool::new(config, StubFactory::new())?;
//! let conn = pool.acquire(&Context::background()).await?;
//! // Use connection...
//! pool.release(conn).await?;
//! pool.close().await?;
//! ```

mod accounting;
mod config;
mod gate;
mod idle;
mod pool;
mod reaper;
mod stats;


pub use config::PoolConfig;
pub use pool::{ConnectionPool, PooledConnection};
pub use stats::PoolStats;
