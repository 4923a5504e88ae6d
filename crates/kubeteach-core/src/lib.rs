pub mod error;
pub mod events;
pub mod exercise_set;
pub mod resource;
pub mod task_definition;

pub use error::{CoreError, Result};
pub use exercise_set::{ExerciseSet, ExerciseSetSpec, ExerciseSetStatus, TaskDefinitionDeclaration};
pub use resource::{
    API_GROUP, API_VERSION, NamespacedName, ObjectKey, ObjectMeta, OwnerReference, Resource,
    TypeMeta,
};
pub use task_definition::{
    ResourceCondition, TaskCondition, TaskDefinition, TaskDefinitionSpec, TaskDefinitionStatus,
    TaskSpec, TaskState,
};
