//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that every
//! backend address parses. All problems are reported at once.
//!
//! An empty backend list is not a validation error: constructing a queue
//! from it fails with `QueueError::NoBackendsConfigured` instead.

use std::fmt;

use crate::config::schema::QueueConfig;
use crate::store::BackendAddress;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every error.
pub fn validate_config(config: &QueueConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.queue_key.trim().is_empty() {
        errors.push(ValidationError::new("queue_key", "must not be empty"));
    }

    let health = &config.health;
    if !(health.half_life_secs.is_finite() && health.half_life_secs > 0.0) {
        errors.push(ValidationError::new("health.half_life_secs", "must be a positive number"));
    }
    if !(health.error_threshold.is_finite() && health.error_threshold > 0.0) {
        errors.push(ValidationError::new("health.error_threshold", "must be a positive number"));
    }
    if !(health.failure_penalty.is_finite() && health.failure_penalty > 0.0) {
        errors.push(ValidationError::new("health.failure_penalty", "must be a positive number"));
    }
    if health.probe_timeout_ms == 0 {
        errors.push(ValidationError::new("health.probe_timeout_ms", "must be greater than 0"));
    }

    let pool = &config.pool;
    if pool.max_active == 0 {
        errors.push(ValidationError::new("pool.max_active", "must be at least 1"));
    }
    if pool.max_idle > pool.max_active {
        errors.push(ValidationError::new("pool.max_idle", "must not exceed pool.max_active"));
    }
    if pool.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("pool.connect_timeout_ms", "must be greater than 0"));
    }
    if pool.io_timeout_ms == 0 {
        errors.push(ValidationError::new("pool.io_timeout_ms", "must be greater than 0"));
    }

    for (i, backend) in config.backends.iter().enumerate() {
        if let Err(e) = backend.address.parse::<BackendAddress>() {
            errors.push(ValidationError::new(format!("backends[{}].address", i), e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
