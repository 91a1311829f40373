//! A queue on exactly one backend, with no health tracking.

use std::sync::Arc;

use crate::error::{QueueError, QueueResult};
use crate::store::{ConnectionSource, StoreError};

/// FIFO queue over a single connection source.
///
/// Errors are returned as-is; nothing is scored or retried.
#[derive(Debug, Clone)]
pub struct Queue {
    source: Arc<dyn ConnectionSource>,
    key: String,
}

impl Queue {
    pub fn new(source: Arc<dyn ConnectionSource>, key: impl Into<String>) -> Self {
        Self {
            source,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> &Arc<dyn ConnectionSource> {
        &self.source
    }

    pub async fn push(&self, value: &str) -> QueueResult<()> {
        let mut conn = self.source.acquire().await.map_err(|e| self.connection(e))?;
        conn.append(&self.key, value)
            .await
            .map_err(|e| self.transport(e))
    }

    /// Blocking pop; `Ok(None)` when `timeout_secs` elapses with no data.
    pub async fn pop(&self, timeout_secs: u64) -> QueueResult<Option<String>> {
        let mut conn = self.source.acquire().await.map_err(|e| self.connection(e))?;
        conn.blocking_remove(&self.key, timeout_secs)
            .await
            .map_err(|e| self.transport(e))
    }

    pub async fn length(&self) -> QueueResult<usize> {
        let mut conn = self.source.acquire().await.map_err(|e| self.connection(e))?;
        conn.count(&self.key).await.map_err(|e| self.transport(e))
    }

    fn connection(&self, source: StoreError) -> QueueError {
        QueueError::Connection {
            backend: self.source.id().to_string(),
            source,
        }
    }

    fn transport(&self, source: StoreError) -> QueueError {
        QueueError::Transport {
            backend: self.source.id().to_string(),
            source,
        }
    }
}
