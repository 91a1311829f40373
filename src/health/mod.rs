//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Every selection pass (under the BackendSet lock):
//!     → tracker.rs decays each backend's error score to "now"
//!     → recovering backends are probed before being trusted
//!
//! Operation failure observed by the queue:
//!     → tracker.rs adds the failure penalty to that backend
//! ```
//!
//! # Design Decisions
//! - No background checker; health is recomputed lazily on each call
//! - Scores decay exponentially, so old failures fade without bookkeeping
//! - Health state is per-backend, owned by the BackendSet

pub mod tracker;

pub use tracker::{Assessment, HealthTracker};
