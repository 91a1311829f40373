//! Per-backend Redis connection pool.
//!
//! # Responsibilities
//! - Reuse idle connections, dial when none are available
//! - Bound concurrent connections (`max_active`); acquirers wait for a slot
//! - Drop idle connections past `idle_timeout`, optionally PING on borrow
//! - Hand out RAII leases that return themselves on drop

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::store::resp::RespConnection;
use crate::store::{BackendAddress, ConnectionSource, Lease, QueueConnection, StoreError};

struct IdleConnection {
    conn: RespConnection,
    since: Instant,
}

struct PoolShared {
    address: BackendAddress,
    config: PoolConfig,
    idle: Mutex<VecDeque<IdleConnection>>,
    closed: AtomicBool,
}

impl PoolShared {
    fn park(&self, conn: RespConnection) {
        // `close` flips the flag under this lock, so nothing parks after its drain.
        let mut idle = self.idle.lock();
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if idle.len() < self.config.max_idle {
            idle.push_back(IdleConnection {
                conn,
                since: Instant::now(),
            });
        }
    }
}

/// Connection pool for one Redis backend.
pub struct RedisPool {
    shared: Arc<PoolShared>,
    permits: Arc<Semaphore>,
}

impl RedisPool {
    /// Create a pool. No connection is made until first use.
    pub fn new(address: BackendAddress, config: PoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_active.max(1)));
        Self {
            shared: Arc::new(PoolShared {
                address,
                config,
                idle: Mutex::new(VecDeque::new()),
                closed: AtomicBool::new(false),
            }),
            permits,
        }
    }

    /// The backend this pool dials.
    pub fn address(&self) -> &BackendAddress {
        &self.shared.address
    }

    /// Number of parked connections.
    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().len()
    }

    async fn dial(&self) -> Result<RespConnection, StoreError> {
        let config = &self.shared.config;
        let conn = RespConnection::connect(
            &self.shared.address,
            config.connect_timeout(),
            config.io_timeout(),
        )
        .await?;
        tracing::debug!(backend = %self.shared.address, "Dialed new backend connection");
        Ok(conn)
    }

    async fn checkout_idle(&self) -> Option<RespConnection> {
        let idle_timeout = self.shared.config.idle_timeout();
        loop {
            let mut candidate = self.shared.idle.lock().pop_back()?;
            if candidate.since.elapsed() > idle_timeout {
                continue;
            }
            if self.shared.config.test_on_borrow {
                if let Err(e) = candidate.conn.ping().await {
                    tracing::debug!(
                        backend = %self.shared.address,
                        error = %e,
                        "Discarding idle connection that failed PING"
                    );
                    continue;
                }
            }
            return Some(candidate.conn);
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("address", &self.shared.address.as_str())
            .field("max_active", &self.shared.config.max_active)
            .field("max_idle", &self.shared.config.max_idle)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl ConnectionSource for RedisPool {
    fn id(&self) -> &str {
        self.shared.address.as_str()
    }

    async fn acquire(&self) -> Result<Lease, StoreError> {
        if self.is_closed() {
            return Err(StoreError::PoolClosed);
        }
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolClosed)?;

        let conn = match self.checkout_idle().await {
            Some(conn) => conn,
            None => self.dial().await?,
        };

        Ok(Box::new(PooledConnection {
            conn: Some(conn),
            shared: self.shared.clone(),
            broken: false,
            _permit: permit,
        }))
    }

    /// Reconnect-and-ping: idle sockets may predate the outage, so they are
    /// dropped and a fresh connection is dialed.
    ///
    /// The probe connection does not take a `max_active` slot, so a probe
    /// may briefly hold one socket beyond the limit. Probes run under the
    /// backend set lock and must not queue behind long BLPOP leases.
    async fn probe(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::PoolClosed);
        }
        let stale: Vec<IdleConnection> = self.shared.idle.lock().drain(..).collect();
        drop(stale);

        let mut conn = self.dial().await?;
        conn.ping().await?;
        self.shared.park(conn);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let drained: Vec<IdleConnection> = {
            let mut idle = self.shared.idle.lock();
            self.shared.closed.store(true, Ordering::Release);
            idle.drain(..).collect()
        };
        self.permits.close();

        let mut last_error = None;
        for idle in drained {
            if let Err(e) = idle.conn.shutdown().await {
                last_error = Some(e);
            }
        }
        tracing::debug!(backend = %self.shared.address, "Connection pool closed");

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// A connection borrowed from a [`RedisPool`].
///
/// Returned to the idle list on drop unless an operation on it failed or was
/// cancelled mid-flight, either of which can leave a reply unread.
pub struct PooledConnection {
    conn: Option<RespConnection>,
    shared: Arc<PoolShared>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    fn conn_mut(&mut self) -> Result<&mut RespConnection, StoreError> {
        self.conn.as_mut().ok_or(StoreError::PoolClosed)
    }

    fn track<T>(&mut self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        self.broken = result.is_err();
        result
    }
}

#[async_trait]
impl QueueConnection for PooledConnection {
    async fn append(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.broken = true;
        let result = self.conn_mut()?.rpush(key, value).await;
        self.track(result)
    }

    async fn blocking_remove(
        &mut self,
        key: &str,
        timeout_secs: u64,
    ) -> Result<Option<String>, StoreError> {
        self.broken = true;
        let result = self.conn_mut()?.blpop(key, timeout_secs).await;
        self.track(result)
    }

    async fn count(&mut self, key: &str) -> Result<usize, StoreError> {
        self.broken = true;
        let result = self.conn_mut()?.llen(key).await;
        self.track(result)
    }

    async fn ping(&mut self) -> Result<(), StoreError> {
        self.broken = true;
        let result = self.conn_mut()?.ping().await;
        self.track(result)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.broken {
            return;
        }
        if let Some(conn) = self.conn.take() {
            self.shared.park(conn);
        }
    }
}
