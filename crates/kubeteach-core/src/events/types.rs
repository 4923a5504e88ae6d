//! Event types for object change notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::resource::{ObjectKey, OwnerReference};

/// Type of object change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectEventType {
    /// Object was created
    Created,
    /// Object spec or metadata was updated
    Updated,
    /// Object status was patched
    StatusPatched,
    /// Object was deleted
    Deleted,
}

impl ObjectEventType {
    /// Returns the string representation of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectEventType::Created => "created",
            ObjectEventType::Updated => "updated",
            ObjectEventType::StatusPatched => "statuspatched",
            ObjectEventType::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ObjectEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event representing a change to a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEvent {
    /// Type of change
    pub event_type: ObjectEventType,
    /// Identity of the changed object
    pub key: ObjectKey,
    /// Resource version after the change, if any
    pub resource_version: Option<String>,
    /// The object after the change; the last known state for deletions
    pub object: Option<Value>,
    /// Timestamp of the event
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ObjectEvent {
    /// Create a new object event.
    pub fn new(event_type: ObjectEventType, key: ObjectKey, object: Option<Value>) -> Self {
        let resource_version = object
            .as_ref()
            .and_then(|o| o.pointer("/metadata/resourceVersion"))
            .and_then(Value::as_str)
            .map(String::from);
        Self {
            event_type,
            key,
            resource_version,
            object,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Create a "created" event.
    pub fn created(key: ObjectKey, object: Value) -> Self {
        Self::new(ObjectEventType::Created, key, Some(object))
    }

    /// Create an "updated" event.
    pub fn updated(key: ObjectKey, object: Value) -> Self {
        Self::new(ObjectEventType::Updated, key, Some(object))
    }

    /// Create a "status patched" event.
    pub fn status_patched(key: ObjectKey, object: Value) -> Self {
        Self::new(ObjectEventType::StatusPatched, key, Some(object))
    }

    /// Create a "deleted" event.
    pub fn deleted(key: ObjectKey, last_state: Option<Value>) -> Self {
        Self::new(ObjectEventType::Deleted, key, last_state)
    }

    /// Check if this event is about the given kind.
    pub fn matches_kind(&self, kind: &str) -> bool {
        self.key.kind == kind
    }

    /// Owner references carried by the object, empty when unknown.
    pub fn owner_references(&self) -> Vec<OwnerReference> {
        self.object
            .as_ref()
            .and_then(|o| o.pointer("/metadata/ownerReferences"))
            .and_then(|refs| serde_json::from_value(refs.clone()).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_display() {
        assert_eq!(ObjectEventType::Created.to_string(), "created");
        assert_eq!(ObjectEventType::StatusPatched.to_string(), "statuspatched");
        assert_eq!(ObjectEventType::Deleted.as_str(), "deleted");
    }

    #[test]
    fn test_event_reads_resource_version() {
        let key = ObjectKey::new("ExerciseSet", "default", "intro");
        let event = ObjectEvent::created(
            key.clone(),
            json!({"metadata": {"name": "intro", "resourceVersion": "7"}}),
        );
        assert_eq!(event.event_type, ObjectEventType::Created);
        assert_eq!(event.resource_version.as_deref(), Some("7"));
        assert!(event.matches_kind("ExerciseSet"));
        assert!(!event.matches_kind("TaskDefinition"));

        let deleted = ObjectEvent::deleted(key, None);
        assert!(deleted.resource_version.is_none());
        assert!(deleted.owner_references().is_empty());
    }

    #[test]
    fn test_event_owner_references() {
        let event = ObjectEvent::updated(
            ObjectKey::new("TaskDefinition", "default", "a"),
            json!({
                "metadata": {
                    "name": "a",
                    "ownerReferences": [{
                        "apiVersion": "kubeteach.geberl.io/v1alpha1",
                        "kind": "ExerciseSet",
                        "name": "intro",
                        "uid": "u-1"
                    }]
                }
            }),
        );
        let owners = event.owner_references();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].name, "intro");
        assert_eq!(owners[0].kind, "ExerciseSet");
    }
}
