//! Connection and factory traits
//!
//! The pool treats a connection as opaque. It only needs to create one,
//! identify it, and close it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

/// A reusable, expensive-to-create connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Stable identity assigned when the connection was created
    fn id(&self) -> u64;

    /// Close the connection, releasing whatever it holds
    ///
    /// Closing twice must be harmless; the second call returns `Ok(())`.
    async fn close(&self) -> Result<()>;

    /// Check if the connection has been closed
    fn is_closed(&self) -> bool;
}

/// Factory trait for creating new connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection with the given identity
    async fn create(&self, id: u64) -> Result<Box<dyn Connection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self, id: u64) -> Result<Box<dyn Connection>> {
        (**self).create(id).await
    }
}
