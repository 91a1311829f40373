//! Client-side FIFO queue spread over several independent Redis servers.
//!
//! Each backend carries a time-decaying error score. Operations go to a
//! randomly chosen healthy backend; backends recovering from failures must
//! answer a liveness probe before taking traffic again, and when nothing is
//! healthy any backend is used.

pub mod config;
pub mod error;
pub mod health;
pub mod load_balancer;
pub mod observability;
pub mod queue;
pub mod resilience;
pub mod store;

pub use config::schema::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use queue::{MultiQueue, Queue};
pub use store::{BackendAddress, ConnectionSource, QueueConnection, RedisPool, StoreError};
