//! Backend set and per-request selection.
//!
//! # Responsibilities
//! - Own every backend handle and the picker behind one lock
//! - Refresh all handles on every pass so health never goes stale
//! - Pick uniformly among healthy backends, or among all when none is healthy
//! - Apply failure penalties reported by the queue

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::error::QueueError;
use crate::health::HealthTracker;
use crate::load_balancer::backend::{BackendHandle, BackendStatus};
use crate::load_balancer::Picker;
use crate::observability::metrics;
use crate::store::ConnectionSource;

/// The backend chosen for one operation.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Position in the backend set, used to report failures back.
    pub index: usize,
    pub id: String,
    pub source: Arc<dyn ConnectionSource>,
    /// True when no backend was healthy and this one was picked anyway.
    pub fallback: bool,
}

struct SetState {
    handles: Vec<BackendHandle>,
    picker: Box<dyn Picker>,
}

/// Fixed group of equivalent backends serving one logical queue.
pub struct BackendSet {
    queue_key: String,
    tracker: HealthTracker,
    sources: Vec<Arc<dyn ConnectionSource>>,
    state: Mutex<SetState>,
}

impl BackendSet {
    /// Build a set. Membership is fixed from here on.
    pub fn new(
        queue_key: impl Into<String>,
        sources: Vec<Arc<dyn ConnectionSource>>,
        tracker: HealthTracker,
        picker: Box<dyn Picker>,
    ) -> Self {
        let now = Instant::now();
        let handles = sources
            .iter()
            .map(|source| BackendHandle::new(source.clone(), now))
            .collect();

        Self {
            queue_key: queue_key.into(),
            tracker,
            sources,
            state: Mutex::new(SetState { handles, picker }),
        }
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Every connection source, in set order.
    pub fn sources(&self) -> &[Arc<dyn ConnectionSource>] {
        &self.sources
    }

    /// Choose exactly one backend for an operation.
    pub async fn select(&self) -> Result<Selection, QueueError> {
        let mut state = self.state.lock().await;
        let SetState { handles, picker } = &mut *state;

        let healthy = refresh_all(&self.tracker, handles, Instant::now()).await;
        if handles.is_empty() {
            return Err(QueueError::NoBackendsConfigured);
        }

        let (index, fallback) = if healthy.is_empty() {
            (picker.pick(handles.len()) % handles.len(), true)
        } else {
            (healthy[picker.pick(healthy.len()) % healthy.len()], false)
        };

        let handle = &handles[index];
        if fallback {
            tracing::debug!(
                backend = %handle.id(),
                backends = handles.len(),
                "No healthy backends, falling back to any backend"
            );
            metrics::record_fallback_selection();
        }

        Ok(Selection {
            index,
            id: handle.id().to_string(),
            source: handle.source().clone(),
            fallback,
        })
    }

    /// Refresh every backend and return the healthy ones, in set order.
    pub async fn healthy_backends(&self) -> Result<Vec<Selection>, QueueError> {
        let mut state = self.state.lock().await;
        let handles = &mut state.handles;

        if handles.is_empty() {
            return Err(QueueError::NoBackendsConfigured);
        }
        let healthy = refresh_all(&self.tracker, handles, Instant::now()).await;

        Ok(healthy
            .into_iter()
            .map(|index| Selection {
                index,
                id: handles[index].id().to_string(),
                source: handles[index].source().clone(),
                fallback: false,
            })
            .collect())
    }

    /// Penalize the backend at `index`. Returns its new score.
    pub async fn record_failure(&self, index: usize) -> f64 {
        let mut state = self.state.lock().await;
        match state.handles.get_mut(index) {
            Some(handle) => self.tracker.record_failure(handle, Instant::now()),
            None => 0.0,
        }
    }

    /// Scores decayed to now, without probing or writing anything back.
    pub async fn snapshot(&self) -> Vec<BackendStatus> {
        let state = self.state.lock().await;
        let now = Instant::now();
        state
            .handles
            .iter()
            .map(|handle| {
                let error_score = self.tracker.current_score(handle, now);
                BackendStatus {
                    id: handle.id().to_string(),
                    error_score,
                    healthy: self.tracker.is_healthy_score(error_score),
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSet")
            .field("queue_key", &self.queue_key)
            .field("backends", &self.sources.iter().map(|s| s.id()).collect::<Vec<_>>())
            .finish()
    }
}

async fn refresh_all(
    tracker: &HealthTracker,
    handles: &mut [BackendHandle],
    now: Instant,
) -> Vec<usize> {
    let mut healthy = Vec::with_capacity(handles.len());
    for (index, handle) in handles.iter_mut().enumerate() {
        if tracker.refresh(handle, now).await {
            healthy.push(index);
        }
    }
    healthy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;
    use crate::load_balancer::random::{RandomPicker, SequencePicker};
    use crate::store::fake::FakeSource;

    fn set_of(fakes: &[Arc<FakeSource>], picker: Box<dyn Picker>) -> BackendSet {
        BackendSet::new(
            "jobs",
            fakes.iter().map(|f| f.as_source()).collect(),
            HealthTracker::new(&HealthConfig::default()),
            picker,
        )
    }

    #[tokio::test]
    async fn test_empty_set_fails() {
        let set = set_of(&[], Box::new(RandomPicker::new()));
        assert!(matches!(set.select().await, Err(QueueError::NoBackendsConfigured)));
        assert!(matches!(
            set.healthy_backends().await,
            Err(QueueError::NoBackendsConfigured)
        ));
    }

    #[tokio::test]
    async fn test_picks_among_healthy_only() {
        let fakes = [FakeSource::new("a"), FakeSource::new("b"), FakeSource::new("c")];
        // Pick index 1 of the healthy list every time.
        let set = set_of(&fakes, Box::new(SequencePicker::new(vec![1])));

        let selected = set.select().await.unwrap();
        assert_eq!(selected.id, "b");
        assert!(!selected.fallback);

        // With "b" unhealthy, healthy is [a, c] and index 1 is "c".
        // A single penalty sits right at the threshold and would be probed
        // back in as soon as it decays, so apply two.
        set.record_failure(1).await;
        set.record_failure(1).await;
        let selected = set.select().await.unwrap();
        assert_eq!(selected.id, "c");
        assert!(!selected.fallback);
    }

    #[tokio::test]
    async fn test_fallback_when_nothing_is_healthy() {
        let fakes = [FakeSource::new("a"), FakeSource::new("b")];
        let set = set_of(&fakes, Box::new(SequencePicker::new(vec![0, 1])));
        for i in 0..2 {
            set.record_failure(i).await;
            set.record_failure(i).await;
        }

        let first = set.select().await.unwrap();
        let second = set.select().await.unwrap();
        assert!(first.fallback && second.fallback);
        assert_eq!(first.id, "a");
        assert_eq!(second.id, "b");
    }

    #[tokio::test]
    async fn test_failed_probes_force_fallback_for_one_pass() {
        let fakes = [FakeSource::new("a"), FakeSource::new("b")];
        for fake in &fakes {
            fake.fail_probe(true);
        }
        let set = set_of(&fakes, Box::new(SequencePicker::new(vec![1])));
        set.record_failure(0).await;
        set.record_failure(1).await;

        // Both have decayed just below the threshold and both probes fail.
        let selected = set.select().await.unwrap();
        assert!(selected.fallback);
        assert_eq!(selected.id, "b");
        assert_eq!(fakes[0].probe_count(), 1);
        assert_eq!(fakes[1].probe_count(), 1);

        // The decayed scores were kept, so the next pass starts below the
        // threshold and no longer probes.
        let selected = set.select().await.unwrap();
        assert!(!selected.fallback);
        assert_eq!(fakes[0].probe_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_covers_whole_set() {
        let fakes = [FakeSource::new("a"), FakeSource::new("b"), FakeSource::new("c")];
        let set = set_of(&fakes, Box::new(RandomPicker::seeded(3)));
        for i in 0..3 {
            for _ in 0..5 {
                set.record_failure(i).await;
            }
        }

        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let selected = set.select().await.unwrap();
            assert!(selected.fallback);
            seen.insert(selected.id);
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_healthy_backends_excludes_penalized() {
        let fakes = [FakeSource::new("a"), FakeSource::new("b")];
        let set = set_of(&fakes, Box::new(RandomPicker::new()));
        set.record_failure(0).await;
        set.record_failure(0).await;

        let healthy = set.healthy_backends().await.unwrap();
        let ids: Vec<&str> = healthy.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn test_single_penalty_is_probed_back_in() {
        let fakes = [FakeSource::new("a")];
        let set = set_of(&fakes, Box::new(RandomPicker::new()));
        set.record_failure(0).await;

        let selected = set.select().await.unwrap();
        assert!(!selected.fallback);
        assert_eq!(fakes[0].probe_count(), 1);

        // Recovered: later passes no longer probe.
        set.select().await.unwrap();
        assert_eq!(fakes[0].probe_count(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_reports_scores() {
        let fakes = [FakeSource::new("a"), FakeSource::new("b")];
        let set = set_of(&fakes, Box::new(RandomPicker::new()));
        set.record_failure(1).await;
        set.record_failure(1).await;

        let snapshot = set.snapshot().await;
        assert_eq!(snapshot[0].error_score, 0.0);
        assert!(snapshot[0].healthy);
        assert!((snapshot[1].error_score - 0.2).abs() < 1e-3);
        assert!(!snapshot[1].healthy);
    }
}
