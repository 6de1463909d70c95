//! Tarn Core - Core abstractions shared by the pool and its consumers
//!
//! This crate defines:
//!
//! - `Connection` / `ConnectionFactory` - the capability interface a pooled resource implements
//! - `Context` - cancellation and deadline scope for blocking calls
//! - `PoolError` - the error taxonomy returned by every pool operation
//! - `StubConnection` / `StubFactory` - an I/O-free connection for demos and tests

mod connection;
mod context;
mod error;
pub mod stub;

pub use connection::*;
pub use context::*;
pub use error::*;
pub use stub::{StubConnection, StubFactory};
