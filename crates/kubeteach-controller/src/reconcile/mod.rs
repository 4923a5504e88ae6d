//! Reconciliation of ExerciseSets.
//!
//! One pass, for one ExerciseSet:
//! - every declared TaskDefinition is created, or repaired when its spec or
//!   owner references drifted
//! - the aggregate status is recomputed from the declared points and the
//!   observed task states, and merge-patched only when it changed
//!
//! Passes carry no state between invocations and may run any number of times.

mod children;
mod status;

use std::time::Duration;

use kubeteach_core::{ExerciseSet, NamespacedName, Resource};
use kubeteach_storage::{DynStore, ObjectStore, StorageError, TypedStoreExt};
use tracing::Instrument;

use crate::config::{ControllerConfig, UpdateStrategy};
use crate::context::ReconcileContext;

pub use children::{ChildObservation, SyncOutcome, owned_solely_by, spec_in_sync, sync_child};
pub use status::{StatusAggregator, status_patch};

/// What the caller should do after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    requeue_after: Option<Duration>,
}

impl Action {
    pub fn requeue(after: Duration) -> Self {
        Self {
            requeue_after: Some(after),
        }
    }

    /// Nothing to do until the object changes again.
    pub fn await_change() -> Self {
        Self {
            requeue_after: None,
        }
    }

    pub fn requeue_after(&self) -> Option<Duration> {
        self.requeue_after
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Storage(#[from] StorageError),

    #[error("reconcile cancelled")]
    Cancelled,

    #[error("reconcile deadline exceeded")]
    DeadlineExceeded,
}

impl ReconcileError {
    /// Whether running the pass again may succeed without outside changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_retryable(),
            Self::Cancelled => false,
            Self::DeadlineExceeded => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub requeue_after: Duration,
    pub update_strategy: UpdateStrategy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

impl From<&ControllerConfig> for ReconcilerConfig {
    fn from(cfg: &ControllerConfig) -> Self {
        Self {
            requeue_after: cfg.requeue_interval(),
            update_strategy: cfg.update_strategy,
        }
    }
}

/// Reconciles ExerciseSets against their TaskDefinitions.
#[derive(Clone)]
pub struct Reconciler {
    store: DynStore,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(store: DynStore, config: ReconcilerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &DynStore {
        &self.store
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Runs one pass for the ExerciseSet `key`.
    ///
    /// Returns `Action::await_change()` when the ExerciseSet does not exist.
    /// A set declaring one name twice is rejected before anything is written.
    /// Any other store failure aborts the pass before the status is patched;
    /// TaskDefinitions already created or repaired stay as written.
    pub async fn reconcile(
        &self,
        key: &NamespacedName,
        ctx: &ReconcileContext,
    ) -> Result<Action, ReconcileError> {
        let span = tracing::debug_span!(
            "reconcile",
            namespace = %key.namespace,
            name = %key.name
        );
        self.reconcile_pass(key, ctx).instrument(span).await
    }

    async fn reconcile_pass(
        &self,
        key: &NamespacedName,
        ctx: &ReconcileContext,
    ) -> Result<Action, ReconcileError> {
        let Some(parent) = ctx
            .guard(
                self.store
                    .get_typed::<ExerciseSet>(&key.namespace, &key.name),
            )
            .await?
        else {
            tracing::debug!("ExerciseSet not found, skipping");
            return Ok(Action::await_change());
        };

        // Two declarations sharing a name would rewrite one child back and forth
        if let Some(name) = parent.duplicate_declaration() {
            return Err(StorageError::invalid_object(format!(
                "{} declares TaskDefinition {name} more than once",
                parent.object_key()
            ))
            .into());
        }

        let owner = parent.owner_reference().map_err(StorageError::from)?;
        let mut aggregator = StatusAggregator::new();

        for declaration in parent.declarations() {
            let observed = sync_child(
                self.store.as_ref(),
                &key.namespace,
                &owner,
                declaration,
                self.config.update_strategy,
                ctx,
            )
            .await?;
            aggregator.observe(
                &observed.name,
                declaration.task_definition_spec.points,
                &observed.status,
            );
        }

        let status = aggregator.finish();
        if status == parent.status {
            tracing::debug!(tasks = status.number_of_tasks, "status unchanged");
        } else {
            ctx.guard(self.store.patch_status(
                ExerciseSet::KIND,
                &key.namespace,
                &key.name,
                &status_patch(&status),
            ))
            .await?;
            tracing::info!(
                tasks = status.number_of_tasks,
                successful = status.number_of_successful_tasks,
                points_achieved = status.points_achieved,
                points_total = status.points_total,
                "status updated"
            );
        }

        Ok(Action::requeue(self.config.requeue_after))
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}
