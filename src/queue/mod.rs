//! Queue facades.
//!
//! # Data Flow
//! ```text
//! push / pop
//!     → BackendSet::select (refresh scores, probe recovering backends, pick one)
//!     → ConnectionSource::acquire → QueueConnection op
//!     → on failure: BackendSet::record_failure, error returned to caller
//!
//! length
//!     → BackendSet::healthy_backends → sum of counts
//! ```
//!
//! # Design Decisions
//! - Health bookkeeping is one lock; store I/O never happens while holding it,
//!   except recovery probes
//! - Callers retry, not the queue (see `resilience::retry`)

pub mod multi;
pub mod single;

pub use multi::MultiQueue;
pub use single::Queue;
