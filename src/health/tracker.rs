//! Time-decayed error scoring with probe-gated recovery.
//!
//! # Scoring
//! ```text
//! decayed = score * exp(ln(0.5) / half_life * Δt)
//! healthy  ⇔ decayed < threshold
//! failure  ⇒ score = decayed + penalty
//! ```
//!
//! # Recovery
//! A backend whose previous score was at or above the threshold and whose
//! decayed score has now fallen below it is not trusted on arithmetic alone:
//! it must answer a liveness probe first. The decayed score is written back
//! whatever the probe says, so the next pass starts from it.

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::config::HealthConfig;
use crate::load_balancer::backend::BackendHandle;
use crate::observability::metrics;

/// Outcome of decaying one handle to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    /// Below threshold and was already below it.
    Healthy,
    /// At or above threshold.
    Unhealthy,
    /// Just crossed below threshold; needs a probe before taking traffic.
    Recovering,
}

/// Applies the decay law, the threshold, and the failure penalty.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    half_life_secs: f64,
    threshold: f64,
    penalty: f64,
    probe_timeout: Duration,
}

impl HealthTracker {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            half_life_secs: config.half_life_secs,
            threshold: config.error_threshold,
            penalty: config.failure_penalty,
            probe_timeout: config.probe_timeout(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decay `score` over `elapsed` without touching any handle.
    pub fn decay(&self, score: f64, elapsed: Duration) -> f64 {
        score * ((0.5f64).ln() / self.half_life_secs * elapsed.as_secs_f64()).exp()
    }

    pub fn is_healthy_score(&self, score: f64) -> bool {
        score < self.threshold
    }

    /// Score of `handle` as of `now`, read-only.
    pub fn current_score(&self, handle: &BackendHandle, now: Instant) -> f64 {
        self.decay(
            handle.error_score,
            now.saturating_duration_since(handle.last_update),
        )
    }

    /// Decay the handle to `now`, write it back, and classify it.
    pub fn assess(&self, handle: &mut BackendHandle, now: Instant) -> Assessment {
        let previous = handle.error_score;
        let decayed = self.current_score(handle, now);
        handle.error_score = decayed;
        handle.last_update = handle.last_update.max(now);

        if !self.is_healthy_score(decayed) {
            Assessment::Unhealthy
        } else if !self.is_healthy_score(previous) {
            Assessment::Recovering
        } else {
            Assessment::Healthy
        }
    }

    /// Assess the handle and, when it is recovering, probe it.
    ///
    /// Returns whether the handle may receive traffic in this pass.
    pub async fn refresh(&self, handle: &mut BackendHandle, now: Instant) -> bool {
        match self.assess(handle, now) {
            Assessment::Healthy => true,
            Assessment::Unhealthy => false,
            Assessment::Recovering => self.probe(handle).await,
        }
    }

    async fn probe(&self, handle: &BackendHandle) -> bool {
        let outcome = timeout(self.probe_timeout, handle.source().probe()).await;
        let passed = match outcome {
            Ok(Ok(())) => {
                tracing::info!(
                    backend = %handle.id(),
                    error_score = handle.error_score,
                    "Backend passed recovery probe, returning to rotation"
                );
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = %handle.id(), error = %e, "Recovery probe failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    backend = %handle.id(),
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Recovery probe timed out"
                );
                false
            }
        };
        metrics::record_probe(handle.id(), passed);
        passed
    }

    /// Decay the handle to `now` and add the failure penalty.
    ///
    /// Returns the new score.
    pub fn record_failure(&self, handle: &mut BackendHandle, now: Instant) -> f64 {
        let decayed = self.current_score(handle, now);
        handle.error_score = decayed + self.penalty;
        handle.last_update = handle.last_update.max(now);
        metrics::record_error_score(handle.id(), handle.error_score);
        handle.error_score
    }
}
