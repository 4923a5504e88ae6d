//! `ExerciseSet`: the parent kind declaring a set of TaskDefinitions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::resource::{ObjectMeta, Resource, TypeMeta};
use crate::task_definition::TaskDefinitionSpec;

/// One declared TaskDefinition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinitionDeclaration {
    pub name: String,
    #[serde(default)]
    pub task_definition_spec: TaskDefinitionSpec,
}

impl TaskDefinitionDeclaration {
    pub fn new(name: impl Into<String>, spec: TaskDefinitionSpec) -> Self {
        Self {
            name: name.into(),
            task_definition_spec: spec,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSetSpec {
    #[serde(default)]
    pub task_definitions: Vec<TaskDefinitionDeclaration>,
}

/// Aggregate counters derived from the declared TaskDefinitions.
///
/// Always serialized in full so it can be used directly as the body of a
/// status merge patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExerciseSetStatus {
    pub number_of_tasks: u32,
    pub number_of_active_tasks: u32,
    pub number_of_pending_tasks: u32,
    pub number_of_successful_tasks: u32,
    pub number_of_unknown_tasks: u32,
    pub number_of_tasks_without_points: u32,
    pub points_total: u64,
    pub points_achieved: u64,
}

impl ExerciseSetStatus {
    /// Sum of the four state buckets.
    pub fn classified_tasks(&self) -> u32 {
        self.number_of_active_tasks
            + self.number_of_pending_tasks
            + self.number_of_successful_tasks
            + self.number_of_unknown_tasks
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ExerciseSetSpec,
    #[serde(default)]
    pub status: ExerciseSetStatus,
}

impl ExerciseSet {
    pub fn new(metadata: ObjectMeta, spec: ExerciseSetSpec) -> Self {
        Self {
            type_meta: TypeMeta::of::<Self>(),
            metadata,
            spec,
            status: ExerciseSetStatus::default(),
        }
    }

    pub fn declarations(&self) -> &[TaskDefinitionDeclaration] {
        &self.spec.task_definitions
    }

    /// First declaration name that appears more than once.
    pub fn duplicate_declaration(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.declarations()
            .iter()
            .map(|d| d.name.as_str())
            .find(|name| !seen.insert(*name))
    }
}

impl Resource for ExerciseSet {
    const KIND: &'static str = "ExerciseSet";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
