//! Runner that decides when ExerciseSets are reconciled.
//!
//! The controller:
//! - reconciles every ExerciseSet once at start-up
//! - reacts to store events, mapping TaskDefinition events to their owning
//!   ExerciseSet through owner references
//! - requeues each ExerciseSet after the interval returned by the reconciler
//! - retries failed passes with exponential backoff
//!
//! Passes run one at a time on a single worker and scheduled keys are
//! deduplicated, so a given ExerciseSet is never reconciled concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use kubeteach_core::events::{EventBroadcaster, ObjectEvent, ObjectEventType};
use kubeteach_core::{ExerciseSet, NamespacedName, Resource};
use kubeteach_storage::ObjectStore;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::time::{DelayQueue, delay_queue};

use crate::config::ControllerConfig;
use crate::context::ReconcileContext;
use crate::reconcile::{ReconcileError, Reconciler};

/// Timing settings of the runner.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Deadline of a single pass; `None` disables it.
    pub reconcile_timeout: Option<Duration>,
    /// First retry delay after a failed pass.
    pub error_backoff_base: Duration,
    /// Retry delays stop doubling here.
    pub error_backoff_max: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

impl From<&ControllerConfig> for ControllerSettings {
    fn from(cfg: &ControllerConfig) -> Self {
        Self {
            reconcile_timeout: cfg.reconcile_timeout(),
            error_backoff_base: cfg.error_backoff_base(),
            error_backoff_max: cfg.error_backoff_max(),
        }
    }
}

/// Counters exposed for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub reconciles: u64,
    pub failures: u64,
    pub events_received: u64,
    pub resyncs: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    reconciles: AtomicU64,
    failures: AtomicU64,
    events_received: AtomicU64,
    resyncs: AtomicU64,
}

/// Delay queue of ExerciseSet keys with at most one entry per key.
struct WorkQueue {
    queue: DelayQueue<NamespacedName>,
    keys: HashMap<NamespacedName, delay_queue::Key>,
}

impl WorkQueue {
    fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
            keys: HashMap::new(),
        }
    }

    /// Schedules `key` after `delay`. An already scheduled key keeps the
    /// earlier of the two deadlines.
    fn schedule(&mut self, key: NamespacedName, delay: Duration) {
        let at = Instant::now() + delay;
        match self.keys.get(&key) {
            Some(entry) => {
                if at < self.queue.deadline(entry) {
                    self.queue.reset_at(entry, at);
                }
            }
            None => {
                let entry = self.queue.insert_at(key.clone(), at);
                self.keys.insert(key, entry);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    async fn next(&mut self) -> Option<NamespacedName> {
        let expired = self.queue.next().await?;
        let key = expired.into_inner();
        self.keys.remove(&key);
        Some(key)
    }
}

pub struct Controller {
    reconciler: Reconciler,
    broadcaster: Arc<EventBroadcaster>,
    settings: ControllerSettings,
    stats: Arc<StatsCounters>,
}

/// Read-only view of a running controller's counters.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    stats: Arc<StatsCounters>,
}

impl ControllerHandle {
    pub fn stats(&self) -> ControllerStats {
        snapshot(&self.stats)
    }
}

fn snapshot(stats: &StatsCounters) -> ControllerStats {
    ControllerStats {
        reconciles: stats.reconciles.load(Ordering::Relaxed),
        failures: stats.failures.load(Ordering::Relaxed),
        events_received: stats.events_received.load(Ordering::Relaxed),
        resyncs: stats.resyncs.load(Ordering::Relaxed),
    }
}

impl Controller {
    pub fn new(
        reconciler: Reconciler,
        broadcaster: Arc<EventBroadcaster>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            reconciler,
            broadcaster,
            settings,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            stats: self.stats.clone(),
        }
    }

    pub fn stats(&self) -> ControllerStats {
        snapshot(&self.stats)
    }

    /// Runs until `shutdown` is cancelled or the event channel closes.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut events = self.broadcaster.subscribe();
        let mut queue = WorkQueue::new();
        let mut failures: HashMap<NamespacedName, u32> = HashMap::new();

        tracing::info!(
            backend = self.reconciler.store().backend_name(),
            requeue_after = ?self.reconciler.config().requeue_after,
            strategy = ?self.reconciler.config().update_strategy,
            "ExerciseSet controller started"
        );
        self.resync(&mut queue).await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("ExerciseSet controller shutting down");
                    break;
                }

                result = events.recv() => {
                    match result {
                        Ok(event) => {
                            self.stats.events_received.fetch_add(1, Ordering::Relaxed);
                            for key in affected_exercise_sets(&event) {
                                tracing::trace!(%key, event = %event.event_type, object = %event.key, "enqueue");
                                queue.schedule(key, Duration::ZERO);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(missed = n, "Missed store events, resyncing");
                            self.resync(&mut queue).await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Store event channel closed");
                            break;
                        }
                    }
                }

                Some(key) = queue.next(), if !queue.is_empty() => {
                    self.process(key, &mut queue, &mut failures, &shutdown).await;
                }
            }
        }
    }

    /// Schedules every stored ExerciseSet for an immediate pass.
    async fn resync(&self, queue: &mut WorkQueue) {
        self.stats.resyncs.fetch_add(1, Ordering::Relaxed);
        match self.reconciler.store().list(ExerciseSet::KIND, None).await {
            Ok(objects) => {
                tracing::debug!(count = objects.len(), "resync");
                for stored in objects {
                    queue.schedule(stored.key.namespaced_name(), Duration::ZERO);
                }
            }
            Err(e) => {
                // Keys already queued keep being served; the next lag or
                // restart retries the listing.
                tracing::error!(error = %e, "Failed to list ExerciseSets for resync");
            }
        }
    }

    async fn process(
        &self,
        key: NamespacedName,
        queue: &mut WorkQueue,
        failures: &mut HashMap<NamespacedName, u32>,
        shutdown: &CancellationToken,
    ) {
        self.stats.reconciles.fetch_add(1, Ordering::Relaxed);
        let ctx = ReconcileContext::with_timeout(
            shutdown.child_token(),
            self.settings.reconcile_timeout,
        );

        match self.reconciler.reconcile(&key, &ctx).await {
            Ok(action) => {
                failures.remove(&key);
                if let Some(after) = action.requeue_after() {
                    queue.schedule(key, after);
                }
            }
            Err(ReconcileError::Cancelled) if shutdown.is_cancelled() => {}
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                let attempt = failures.entry(key.clone()).or_insert(0);
                *attempt += 1;
                let delay = backoff_delay(
                    self.settings.error_backoff_base,
                    self.settings.error_backoff_max,
                    *attempt,
                );
                tracing::warn!(
                    %key,
                    error = %e,
                    retryable = e.is_retryable(),
                    attempt = *attempt,
                    backoff_ms = delay.as_millis() as u64,
                    "Reconcile failed, retrying"
                );
                queue.schedule(key, delay);
            }
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("reconciler", &self.reconciler)
            .field("settings", &self.settings)
            .field("stats", &self.stats())
            .finish()
    }
}

/// ExerciseSets that must be reconciled because of `event`.
///
/// Status patches on ExerciseSets are the controller's own writes and do not
/// change the desired state, so they are skipped.
pub fn affected_exercise_sets(event: &ObjectEvent) -> Vec<NamespacedName> {
    if event.matches_kind(ExerciseSet::KIND) {
        if event.event_type == ObjectEventType::StatusPatched {
            return Vec::new();
        }
        return vec![event.key.namespaced_name()];
    }

    event
        .owner_references()
        .into_iter()
        .filter(|owner| owner.kind == ExerciseSet::KIND)
        .map(|owner| NamespacedName::new(&event.key.namespace, owner.name))
        .collect()
}

/// `base * 2^(attempt - 1)`, capped at `max`.
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeteach_core::ObjectKey;
    use serde_json::json;

    #[test]
    fn test_backoff_delay() {
        let base = Duration::from_millis(500);
        let max = Duration::from_secs(60);
        assert_eq!(backoff_delay(base, max, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, max, 2), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, max, 4), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, max, 10), max);
        assert_eq!(backoff_delay(base, max, 200), max);
    }

    #[test]
    fn test_exercise_set_events_map_to_themselves() {
        let key = ObjectKey::new("ExerciseSet", "default", "intro");
        let event = ObjectEvent::updated(key.clone(), json!({}));
        assert_eq!(
            affected_exercise_sets(&event),
            vec![NamespacedName::new("default", "intro")]
        );

        let deleted = ObjectEvent::deleted(key.clone(), None);
        assert_eq!(affected_exercise_sets(&deleted).len(), 1);

        let own_status = ObjectEvent::status_patched(key, json!({}));
        assert!(affected_exercise_sets(&own_status).is_empty());
    }

    #[test]
    fn test_task_events_map_to_owner() {
        let key = ObjectKey::new("TaskDefinition", "default", "a");
        let object = json!({
            "metadata": {
                "name": "a",
                "ownerReferences": [
                    {"apiVersion": "kubeteach.geberl.io/v1alpha1", "kind": "ExerciseSet", "name": "intro", "uid": "u-1"},
                    {"apiVersion": "v1", "kind": "ConfigMap", "name": "other", "uid": "u-2"}
                ]
            }
        });
        let event = ObjectEvent::status_patched(key.clone(), object);
        assert_eq!(
            affected_exercise_sets(&event),
            vec![NamespacedName::new("default", "intro")]
        );

        let orphan = ObjectEvent::created(key, json!({"metadata": {"name": "a"}}));
        assert!(affected_exercise_sets(&orphan).is_empty());
    }

    #[tokio::test]
    async fn test_work_queue_deduplicates() {
        let mut queue = WorkQueue::new();
        let key = NamespacedName::new("default", "intro");
        queue.schedule(key.clone(), Duration::from_secs(60));
        queue.schedule(key.clone(), Duration::ZERO);
        queue.schedule(NamespacedName::new("default", "other"), Duration::from_secs(60));

        assert_eq!(queue.next().await, Some(key.clone()));
        assert_eq!(queue.keys.len(), 1);

        // Rescheduling later does not postpone an earlier deadline
        queue.schedule(key.clone(), Duration::ZERO);
        queue.schedule(key.clone(), Duration::from_secs(60));
        assert_eq!(queue.next().await, Some(key));
    }
}
