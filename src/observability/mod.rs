//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Queue operations, selection passes, probes:
//!     → logging.rs (structured tracing events with backend fields)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stderr log stream
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; installing subscribers/exporters is the binary's job
//! - Every event about a backend carries its address as a field
//! - Metric updates are cheap no-ops when no recorder is installed

pub mod logging;
pub mod metrics;
