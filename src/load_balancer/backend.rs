//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Carry its time-decayed error score
//! - Lend out the connection source used for store operations
//!
//! The score fields are only touched by `health::tracker`, always under the
//! owning `BackendSet` lock.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::store::ConnectionSource;

/// A single backend server and its health state.
#[derive(Debug)]
pub struct BackendHandle {
    id: String,
    source: Arc<dyn ConnectionSource>,
    /// Accumulated failure signal, valid as of `last_update`.
    pub(crate) error_score: f64,
    pub(crate) last_update: Instant,
}

impl BackendHandle {
    /// A fresh backend: score 0.0, healthy without a probe.
    pub fn new(source: Arc<dyn ConnectionSource>, now: Instant) -> Self {
        Self {
            id: source.id().to_string(),
            source,
            error_score: 0.0,
            last_update: now,
        }
    }

    /// Backend identifier (its address).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shared connection source for this backend.
    pub fn source(&self) -> &Arc<dyn ConnectionSource> {
        &self.source
    }

    /// Score as of [`last_update`](Self::last_update); not decayed.
    pub fn error_score(&self) -> f64 {
        self.error_score
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    #[cfg(test)]
    pub(crate) fn with_score(source: Arc<dyn ConnectionSource>, score: f64, at: Instant) -> Self {
        let mut handle = Self::new(source, at);
        handle.error_score = score;
        handle
    }
}

/// Point-in-time view of one backend, decayed to the moment it was taken.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BackendStatus {
    pub id: String,
    pub error_score: f64,
    pub healthy: bool,
}
