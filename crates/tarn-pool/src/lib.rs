//! Tarn Pool - Bounded connection pooling with admission control and idle reaping
//!
//! This crate hands out reusable connections to many concurrent callers while
//! capping how many are checked out at once, reusing idle ones, and closing
//! those that sit idle past a timeout.

pub mod pool;

pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use tarn_core::{Connection, ConnectionFactory, Context, PoolError, Result};
