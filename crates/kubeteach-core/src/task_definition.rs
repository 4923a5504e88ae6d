//! `TaskDefinition`: the child kind created and repaired by the ExerciseSet controller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};
use crate::resource::{ObjectMeta, OwnerReference, Resource, TypeMeta};

/// Progress of a task as reported by the task checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Active,
    Successful,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Active => "active",
            TaskState::Successful => "successful",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskState::Pending),
            "active" => Ok(TaskState::Active),
            "successful" => Ok(TaskState::Successful),
            other => Err(CoreError::invalid_task_state(other)),
        }
    }
}

/// Human readable description of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long_description: String,
}

/// A single field check against a cluster object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCondition {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: String,
}

/// Objects of one kind that must satisfy every listed condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCondition {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_group: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_condition: Vec<ResourceCondition>,
}

/// Desired state of a TaskDefinition. Also embedded verbatim in every
/// ExerciseSet declaration; keys not modelled here travel in `extra` so a
/// declaration is copied to its TaskDefinition without loss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinitionSpec {
    #[serde(default)]
    pub task_spec: TaskSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_conditions: Vec<TaskCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_task_name: Option<String>,
    #[serde(default)]
    pub points: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskDefinitionSpec {
    pub fn with_points(points: u32) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }
}

/// Observed state, written by the task checker only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinitionStatus {
    /// Kept as the raw string so that an unrecognised value does not make
    /// the whole object undecodable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl TaskDefinitionStatus {
    /// `None` when no state is reported, `Some(Err)` for an unrecognised value.
    pub fn task_state(&self) -> Option<Result<TaskState>> {
        self.state.as_deref().map(TaskState::from_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TaskDefinitionSpec,
    #[serde(default)]
    pub status: TaskDefinitionStatus,
}

impl TaskDefinition {
    pub fn new(metadata: ObjectMeta, spec: TaskDefinitionSpec) -> Self {
        Self {
            type_meta: TypeMeta::of::<Self>(),
            metadata,
            spec,
            status: TaskDefinitionStatus::default(),
        }
    }

    /// A TaskDefinition owned by exactly `owner`.
    pub fn owned(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: TaskDefinitionSpec,
        owner: OwnerReference,
    ) -> Self {
        Self::new(ObjectMeta::new(namespace, name).with_owner(owner), spec)
    }
}

impl Resource for TaskDefinition {
    const KIND: &'static str = "TaskDefinition";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
