//! One logical FIFO queue spread over several equivalent backends.
//!
//! # Ordering
//! Successive calls may land on different backends, so ordering is FIFO per
//! backend only. There is no global FIFO guarantee across the logical queue.
//!
//! # Failure handling
//! A failed operation penalizes the backend that produced it and is returned
//! to the caller. Nothing is retried internally: issuing the call again lets
//! the selector route around the penalized backend.

use std::sync::Arc;

use tokio::time::timeout;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, HealthConfig, QueueConfig};
use crate::error::{QueueError, QueueResult};
use crate::health::HealthTracker;
use crate::load_balancer::{BackendSet, BackendStatus, Picker, RandomPicker, Selection};
use crate::observability::metrics;
use crate::store::{BackendAddress, ConnectionSource, RedisPool, StoreError};

/// A queue backed by a fixed set of list servers with client-side failover.
///
/// Cheap to share across tasks behind an `Arc`; health bookkeeping is
/// serialized internally and store operations run concurrently.
///
/// Items are FIFO per backend, not across the whole queue.
#[derive(Debug)]
pub struct MultiQueue {
    backends: BackendSet,
}

impl MultiQueue {
    /// Build a queue over existing connection sources. Nothing is dialed.
    pub fn new(
        sources: Vec<Arc<dyn ConnectionSource>>,
        queue_key: impl Into<String>,
        health: &HealthConfig,
    ) -> QueueResult<Self> {
        Self::with_picker(sources, queue_key, health, Box::new(RandomPicker::new()))
    }

    /// Like [`new`](Self::new) with an explicit selection strategy.
    pub fn with_picker(
        sources: Vec<Arc<dyn ConnectionSource>>,
        queue_key: impl Into<String>,
        health: &HealthConfig,
        picker: Box<dyn Picker>,
    ) -> QueueResult<Self> {
        if sources.is_empty() {
            return Err(QueueError::NoBackendsConfigured);
        }
        let backends = BackendSet::new(queue_key, sources, HealthTracker::new(health), picker);
        Ok(Self { backends })
    }

    /// Build a Redis pool per configured backend and probe each one.
    ///
    /// Unreachable backends stay in the set with one failure penalty, so
    /// they must pass a recovery probe before receiving traffic. Fails only
    /// when every backend is unreachable.
    pub async fn connect(config: &QueueConfig) -> QueueResult<Self> {
        validate_config(config).map_err(|e| QueueError::Config(ConfigError::Validation(e)))?;
        if config.backends.is_empty() {
            return Err(QueueError::NoBackendsConfigured);
        }

        let mut sources: Vec<Arc<dyn ConnectionSource>> = Vec::with_capacity(config.backends.len());
        for backend in &config.backends {
            let address: BackendAddress =
                backend
                    .address
                    .parse()
                    .map_err(|source| QueueError::Connection {
                        backend: backend.address.clone(),
                        source,
                    })?;
            sources.push(Arc::new(RedisPool::new(address, config.pool.clone())));
        }

        let queue = Self::new(sources, config.queue_key.clone(), &config.health)?;
        let probe_timeout = config.health.probe_timeout();
        let mut unreachable = 0;
        let mut last_error = None;

        for (index, source) in queue.backends.sources().iter().enumerate() {
            tracing::info!(backend = %source.id(), "Connecting to backend");
            let outcome = match timeout(probe_timeout, source.probe()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(probe_timeout)),
            };
            if let Err(e) = outcome {
                let score = queue.backends.record_failure(index).await;
                tracing::warn!(
                    backend = %source.id(),
                    error = %e,
                    error_score = score,
                    "Backend unreachable at startup, starting it unhealthy"
                );
                unreachable += 1;
                last_error = Some(e);
            }
        }

        if let Some(source) = last_error.filter(|_| unreachable == queue.backends.len()) {
            // Best-effort cleanup; the construction error is what matters.
            let _ = queue.disconnect().await;
            return Err(QueueError::AllBackendsUnreachable {
                attempted: unreachable,
                source,
            });
        }

        tracing::info!(
            queue_key = %queue.queue_key(),
            backends = queue.backends.len(),
            unreachable,
            "Queue connected"
        );
        Ok(queue)
    }

    pub fn queue_key(&self) -> &str {
        self.backends.queue_key()
    }

    /// Append `value` to the queue on one selected backend.
    pub async fn push(&self, value: &str) -> QueueResult<()> {
        let selected = self.backends.select().await?;
        let mut conn = match selected.source.acquire().await {
            Ok(conn) => conn,
            Err(e) => return Err(self.connection_failure(&selected, "push", e).await),
        };

        match conn.append(self.queue_key(), value).await {
            Ok(()) => {
                metrics::record_operation("push", "ok");
                Ok(())
            }
            Err(e) => {
                drop(conn);
                Err(self.transport_failure(&selected, "push", e).await)
            }
        }
    }

    /// Remove the head of the queue on one selected backend, waiting up to
    /// `timeout_secs` for data.
    ///
    /// `Ok(None)` means the wait elapsed with nothing to dequeue; that is not
    /// held against the backend.
    pub async fn pop(&self, timeout_secs: u64) -> QueueResult<Option<String>> {
        let selected = self.backends.select().await?;
        let mut conn = match selected.source.acquire().await {
            Ok(conn) => conn,
            Err(e) => return Err(self.connection_failure(&selected, "pop", e).await),
        };

        match conn.blocking_remove(self.queue_key(), timeout_secs).await {
            Ok(Some(value)) => {
                metrics::record_operation("pop", "ok");
                Ok(Some(value))
            }
            Ok(None) => {
                metrics::record_operation("pop", "empty");
                Ok(None)
            }
            Err(e) => {
                drop(conn);
                Err(self.transport_failure(&selected, "pop", e).await)
            }
        }
    }

    /// Sum of list lengths over the currently healthy backends.
    ///
    /// If any backend fails to answer, that backend is penalized and the
    /// whole call fails; the partial sum is discarded.
    pub async fn length(&self) -> QueueResult<usize> {
        let healthy = self.backends.healthy_backends().await?;
        let mut total = 0;

        for selected in &healthy {
            let mut conn = match selected.source.acquire().await {
                Ok(conn) => conn,
                Err(e) => return Err(self.connection_failure(selected, "length", e).await),
            };
            match conn.count(self.queue_key()).await {
                Ok(count) => total += count,
                Err(e) => {
                    drop(conn);
                    return Err(self.transport_failure(selected, "length", e).await);
                }
            }
        }

        metrics::record_operation("length", "ok");
        Ok(total)
    }

    /// Close every backend's connections.
    ///
    /// Keeps going past failures and returns the last one.
    pub async fn disconnect(&self) -> QueueResult<()> {
        let mut last_error = None;
        for source in self.backends.sources() {
            if let Err(e) = source.close().await {
                tracing::warn!(backend = %source.id(), error = %e, "Failed to close backend");
                last_error = Some(QueueError::Connection {
                    backend: source.id().to_string(),
                    source: e,
                });
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Every backend's error score, decayed to now.
    pub async fn status(&self) -> Vec<BackendStatus> {
        self.backends.snapshot().await
    }

    async fn connection_failure(
        &self,
        selected: &Selection,
        operation: &'static str,
        error: StoreError,
    ) -> QueueError {
        // A closed pool is the caller's doing, not the backend's.
        if !matches!(error, StoreError::PoolClosed) {
            self.penalize(selected, operation, &error).await;
        }
        QueueError::Connection {
            backend: selected.id.clone(),
            source: error,
        }
    }

    async fn transport_failure(
        &self,
        selected: &Selection,
        operation: &'static str,
        error: StoreError,
    ) -> QueueError {
        self.penalize(selected, operation, &error).await;
        QueueError::Transport {
            backend: selected.id.clone(),
            source: error,
        }
    }

    async fn penalize(&self, selected: &Selection, operation: &'static str, error: &StoreError) {
        let score = self.backends.record_failure(selected.index).await;
        metrics::record_operation(operation, "error");
        tracing::warn!(
            backend = %selected.id,
            operation,
            error = %error,
            error_score = score,
            fallback = selected.fallback,
            "Backend operation failed"
        );
    }
}
