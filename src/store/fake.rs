//! In-memory connection source for unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::store::{ConnectionSource, Lease, QueueConnection, StoreError};

#[derive(Debug, Default)]
struct FakeState {
    list: Mutex<VecDeque<String>>,
    fail_ops: AtomicBool,
    fail_acquire: AtomicBool,
    fail_probe: AtomicBool,
    fail_close: AtomicBool,
    probes: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
    closed: AtomicBool,
}

fn refused() -> StoreError {
    StoreError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "backend down"))
}

#[derive(Debug)]
pub(crate) struct FakeSource {
    id: String,
    state: Arc<FakeState>,
}

impl FakeSource {
    pub(crate) fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            state: Arc::new(FakeState::default()),
        })
    }

    pub(crate) fn as_source(self: &Arc<Self>) -> Arc<dyn ConnectionSource> {
        self.clone()
    }

    /// Store operations fail with an I/O error.
    pub(crate) fn fail_ops(&self, fail: bool) {
        self.state.fail_ops.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_acquire(&self, fail: bool) {
        self.state.fail_acquire.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_probe(&self, fail: bool) {
        self.state.fail_probe.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_close(&self, fail: bool) {
        self.state.fail_close.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn probe_count(&self) -> usize {
        self.state.probes.load(Ordering::SeqCst)
    }

    pub(crate) fn outstanding_leases(&self) -> usize {
        self.state.acquired.load(Ordering::SeqCst) - self.state.released.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn items(&self) -> Vec<String> {
        self.state.list.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl ConnectionSource for FakeSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn acquire(&self) -> Result<Lease, StoreError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(StoreError::PoolClosed);
        }
        if self.state.fail_acquire.load(Ordering::SeqCst) {
            return Err(refused());
        }
        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
        }))
    }

    async fn probe(&self) -> Result<(), StoreError> {
        self.state.probes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_probe.load(Ordering::SeqCst) {
            return Err(refused());
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.state.closed.store(true, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(refused());
        }
        Ok(())
    }
}

struct FakeConnection {
    state: Arc<FakeState>,
}

impl FakeConnection {
    fn check(&self) -> Result<(), StoreError> {
        if self.state.fail_ops.load(Ordering::SeqCst) {
            Err(refused())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueConnection for FakeConnection {
    async fn append(&mut self, _key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.state.list.lock().push_back(value.to_string());
        Ok(())
    }

    async fn blocking_remove(
        &mut self,
        _key: &str,
        _timeout_secs: u64,
    ) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.state.list.lock().pop_front())
    }

    async fn count(&mut self, _key: &str) -> Result<usize, StoreError> {
        self.check()?;
        Ok(self.state.list.lock().len())
    }

    async fn ping(&mut self) -> Result<(), StoreError> {
        self.check()
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}
