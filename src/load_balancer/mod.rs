//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Queue operation
//!     → selector.rs (lock BackendSet, refresh every backend's health)
//!     → healthy candidates, or every backend when none is healthy
//!     → Picker (random.rs: uniform choice)
//!     → Selection handed back to the queue, lock released
//! ```
//!
//! # Design Decisions
//! - Selection is stateless apart from the health scores themselves
//! - The picker is injected so tests can force exact outcomes
//! - Falling back to an unhealthy backend beats failing the request

pub mod backend;
pub mod random;
pub mod selector;

pub use backend::{BackendHandle, BackendStatus};
pub use random::RandomPicker;
pub use selector::{BackendSet, Selection};

/// Chooses one candidate index out of `len`.
///
/// `len` is always at least 1. Results outside `0..len` are reduced modulo
/// `len` by the caller.
pub trait Picker: Send {
    fn pick(&mut self, len: usize) -> usize;
}
