//! Backend store collaborators.
//!
//! # Data Flow
//! ```text
//! MultiQueue picks a backend
//!     → ConnectionSource::acquire (pool.rs: idle reuse or dial)
//!     → Lease (RAII guard, returned to the pool on drop)
//!     → QueueConnection ops (resp.rs: RPUSH / BLPOP / LLEN / PING)
//! ```
//!
//! # Design Decisions
//! - The queue core only sees the two traits below, never sockets
//! - A lease that saw an error is discarded instead of reused
//! - Probing a source reconnects before pinging so stale sockets are not trusted

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod address;
#[cfg(test)]
pub(crate) mod fake;
pub mod pool;
pub mod resp;

pub use address::BackendAddress;
pub use pool::RedisPool;

/// Errors produced by a store connection or its pool.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Socket-level failure (refused, reset, EOF).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend did not answer within the deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The backend answered with an error reply.
    #[error("server error: {0}")]
    Server(String),

    /// A backend address could not be parsed.
    #[error("invalid backend address '{0}'")]
    InvalidAddress(String),

    /// The pool was closed by `disconnect`.
    #[error("connection pool is closed")]
    PoolClosed,
}

/// A borrowed connection; dropping it releases it back to its source.
pub type Lease = Box<dyn QueueConnection>;

/// List operations the queue needs from one backend connection.
#[async_trait]
pub trait QueueConnection: Send {
    /// Append `value` to the tail of the list at `key`.
    async fn append(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove from the head of the list, waiting up to `timeout_secs`.
    ///
    /// Returns `Ok(None)` when the wait elapsed with no data. A timeout of
    /// zero waits indefinitely, as the store defines it.
    async fn blocking_remove(
        &mut self,
        key: &str,
        timeout_secs: u64,
    ) -> Result<Option<String>, StoreError>;

    /// Current length of the list at `key`.
    async fn count(&mut self, key: &str) -> Result<usize, StoreError>;

    /// Lightweight liveness check.
    async fn ping(&mut self) -> Result<(), StoreError>;
}

/// Hands out connections to a single backend.
#[async_trait]
pub trait ConnectionSource: Send + Sync + fmt::Debug {
    /// Stable identifier of the backend (its address).
    fn id(&self) -> &str;

    /// Borrow a connection.
    async fn acquire(&self) -> Result<Lease, StoreError>;

    /// Liveness probe used before trusting a recovering backend.
    async fn probe(&self) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        conn.ping().await
    }

    /// Release every connection held by this source.
    async fn close(&self) -> Result<(), StoreError>;
}
