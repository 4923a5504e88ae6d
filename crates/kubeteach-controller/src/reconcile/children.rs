//! Adopt-or-create-or-repair for a single declared TaskDefinition.

use kubeteach_core::{
    OwnerReference, TaskDefinition, TaskDefinitionDeclaration, TaskDefinitionSpec,
    TaskDefinitionStatus,
};
use kubeteach_storage::{ObjectStore, TypedStoreExt};

use super::ReconcileError;
use crate::config::UpdateStrategy;
use crate::context::ReconcileContext;

/// What [`sync_child`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The TaskDefinition did not exist and was created.
    Created,
    /// Creation raced with another writer; adoption is left to the next pass.
    AlreadyExists,
    /// Spec and ownership already matched.
    InSync,
    /// Drift was corrected with this many update calls.
    Repaired { updates: u32 },
}

/// Observation fed into the status aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildObservation {
    pub name: String,
    /// Status as fetched; empty when not observed
    pub status: TaskDefinitionStatus,
    pub outcome: SyncOutcome,
}

/// Field-wise comparison of the declared spec against the stored one.
pub fn spec_in_sync(observed: &TaskDefinitionSpec, declared: &TaskDefinitionSpec) -> bool {
    observed.points == declared.points
        && observed.required_task_name == declared.required_task_name
        && observed.task_spec == declared.task_spec
        && observed.task_conditions == declared.task_conditions
        && observed.extra == declared.extra
}

/// True when `owner` is the one and only owner reference.
pub fn owned_solely_by(observed: &[OwnerReference], owner: &OwnerReference) -> bool {
    match observed {
        [only] => {
            only.api_version == owner.api_version
                && only.kind == owner.kind
                && only.name == owner.name
                && only.uid == owner.uid
        }
        _ => false,
    }
}

/// Brings the TaskDefinition named by `declaration` in `namespace` in line
/// with the declaration and with `owner`.
pub async fn sync_child(
    store: &dyn ObjectStore,
    namespace: &str,
    owner: &OwnerReference,
    declaration: &TaskDefinitionDeclaration,
    strategy: UpdateStrategy,
    ctx: &ReconcileContext,
) -> Result<ChildObservation, ReconcileError> {
    let name = declaration.name.as_str();
    let declared = &declaration.task_definition_spec;

    let existing = ctx
        .guard(store.get_typed::<TaskDefinition>(namespace, name))
        .await?;

    let Some(mut child) = existing else {
        let desired = TaskDefinition::owned(namespace, name, declared.clone(), owner.clone());
        return match ctx.guard(store.create_typed(&desired)).await {
            Ok(created) => {
                tracing::info!(task = %name, points = declared.points, "created TaskDefinition");
                Ok(ChildObservation {
                    name: name.to_string(),
                    status: created.status,
                    outcome: SyncOutcome::Created,
                })
            }
            Err(ReconcileError::Storage(err)) if err.is_already_exists() => {
                tracing::info!(
                    task = %name,
                    "TaskDefinition created concurrently, adopting on next pass"
                );
                Ok(ChildObservation {
                    name: name.to_string(),
                    status: TaskDefinitionStatus::default(),
                    outcome: SyncOutcome::AlreadyExists,
                })
            }
            Err(err) => Err(err),
        };
    };

    let spec_drift = !spec_in_sync(&child.spec, declared);
    let owner_drift = !owned_solely_by(&child.metadata.owner_references, owner);
    let mut updates = 0;

    match strategy {
        UpdateStrategy::Combined => {
            if spec_drift || owner_drift {
                child.spec = declared.clone();
                child.metadata.owner_references = vec![owner.clone()];
                child = ctx.guard(store.update_typed(&child)).await?;
                updates += 1;
            }
        }
        UpdateStrategy::Separate => {
            if spec_drift {
                child.spec = declared.clone();
                child = ctx.guard(store.update_typed(&child)).await?;
                updates += 1;
            }
            if owner_drift {
                child.metadata.owner_references = vec![owner.clone()];
                child = ctx.guard(store.update_typed(&child)).await?;
                updates += 1;
            }
        }
    }

    let outcome = if updates == 0 {
        SyncOutcome::InSync
    } else {
        tracing::info!(
            task = %name,
            spec_drift,
            owner_drift,
            updates,
            "repaired TaskDefinition"
        );
        SyncOutcome::Repaired { updates }
    };

    Ok(ChildObservation {
        name: name.to_string(),
        status: child.status,
        outcome,
    })
}
