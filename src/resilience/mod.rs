//! Caller-side resilience helpers.
//!
//! # Data Flow
//! ```text
//! Logical queue call fails with a retryable error:
//!     → backoff.rs (exponential delay with jitter)
//!     → retry.rs (re-issue the whole call; selection routes around the
//!       backend that was just penalized)
//! ```
//!
//! # Design Decisions
//! - The queue itself never retries; these helpers are opt-in for callers
//! - Configuration and empty-set errors are never retried

pub mod backoff;
pub mod retry;

pub use backoff::Backoff;
pub use retry::{retry_with_backoff, RetryPolicy};
