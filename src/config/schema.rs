//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files. Every
//! tunable that governs health scoring lives in [`HealthConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a multi-backend queue.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name of the list shared by every backend.
    pub queue_key: String,

    /// Backend servers participating in the queue.
    pub backends: Vec<BackendConfig>,

    /// Error-score tuning.
    pub health: HealthConfig,

    /// Per-backend connection pool settings.
    pub pool: PoolConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_key: "queue".to_string(),
            backends: Vec::new(),
            health: HealthConfig::default(),
            pool: PoolConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// One backend server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// `host:port[/db]` or `redis://host:port[/db]`.
    pub address: String,
}

impl BackendConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Error-score tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Seconds for an undisturbed error score to halve.
    pub half_life_secs: f64,

    /// Backends at or above this score are unhealthy.
    pub error_threshold: f64,

    /// Added to a backend's score on every attributable failure.
    pub failure_penalty: f64,

    /// Upper bound on a recovery probe, in milliseconds.
    pub probe_timeout_ms: u64,
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            half_life_secs: 10.0,
            error_threshold: 0.1,
            failure_penalty: 0.1,
            probe_timeout_ms: 1000,
        }
    }
}

/// Connection pool configuration, applied to each backend separately.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle connections kept for reuse.
    pub max_idle: usize,

    /// Connections that may be lent out at once; further callers wait.
    pub max_active: usize,

    /// Idle connections older than this are discarded instead of reused.
    pub idle_timeout_secs: u64,

    /// TCP connect deadline in milliseconds.
    pub connect_timeout_ms: u64,

    /// Per-command reply deadline in milliseconds (BLPOP adds its own wait).
    pub io_timeout_ms: u64,

    /// PING idle connections before lending them out.
    pub test_on_borrow: bool,
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 4,
            max_active: 16,
            idle_timeout_secs: 240,
            connect_timeout_ms: 2000,
            io_timeout_ms: 5000,
            test_on_borrow: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
