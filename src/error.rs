//! Queue-level error taxonomy.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::store::StoreError;

/// Errors surfaced by queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backend set has no members.
    #[error("no backends configured")]
    NoBackendsConfigured,

    /// Every backend failed its initial liveness probe.
    #[error("all {attempted} backends are unreachable: {source}")]
    AllBackendsUnreachable {
        attempted: usize,
        #[source]
        source: StoreError,
    },

    /// A pooled connection to the backend could not be obtained.
    #[error("connection to backend {backend} failed: {source}")]
    Connection {
        backend: String,
        #[source]
        source: StoreError,
    },

    /// A store operation failed after a connection was obtained.
    #[error("operation on backend {backend} failed: {source}")]
    Transport {
        backend: String,
        #[source]
        source: StoreError,
    },

    /// The configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl QueueError {
    /// Name of the backend that produced the error, if any.
    pub fn backend(&self) -> Option<&str> {
        match self {
            QueueError::Connection { backend, .. } | QueueError::Transport { backend, .. } => {
                Some(backend)
            }
            _ => None,
        }
    }

    /// Whether re-issuing the same logical call may succeed on another backend.
    pub fn is_retryable(&self) -> bool {
        match self {
            QueueError::Connection { source, .. } => !matches!(source, StoreError::PoolClosed),
            QueueError::Transport { .. } => true,
            _ => false,
        }
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;
