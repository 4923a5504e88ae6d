//! Storage types for the object store abstraction.

use kubeteach_core::{ObjectKey, Resource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StorageError;

/// An object as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    /// Kind, namespace and name.
    pub key: ObjectKey,
    /// Store-assigned unique identity, stable for the object's lifetime.
    pub uid: String,
    /// Version token of this revision.
    pub resource_version: String,
    /// The full object as JSON, store-managed metadata included.
    pub object: Value,
    /// When the object was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When this revision was written.
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl StoredObject {
    /// Creates a new `StoredObject`.
    #[must_use]
    pub fn new(
        key: ObjectKey,
        uid: impl Into<String>,
        resource_version: impl Into<String>,
        object: Value,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            key,
            uid: uid.into(),
            resource_version: resource_version.into(),
            object,
            created_at: now,
            last_updated: now,
        }
    }

    /// Creates the next revision of this object with updated content.
    #[must_use]
    pub fn new_revision(&self, resource_version: impl Into<String>, object: Value) -> Self {
        Self {
            key: self.key.clone(),
            uid: self.uid.clone(),
            resource_version: resource_version.into(),
            object,
            created_at: self.created_at,
            last_updated: OffsetDateTime::now_utc(),
        }
    }

    /// Decodes the object into a typed resource.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidObject` when the kind does not match or
    /// the JSON does not decode.
    pub fn decode<R: Resource>(&self) -> Result<R, StorageError> {
        if self.key.kind != R::KIND {
            return Err(StorageError::invalid_object(format!(
                "expected kind {}, found {}",
                R::KIND,
                self.key.kind
            )));
        }
        R::from_value(self.object.clone())
            .map_err(|e| StorageError::invalid_object(format!("{}: {e}", self.key)))
    }

}

/// What a delete removed.
#[derive(Debug, Clone)]
pub struct Deleted {
    /// Last state of the object named in the call.
    pub object: StoredObject,
    /// Objects removed with it through owner references, owners before
    /// the objects they own.
    pub dependents: Vec<StoredObject>,
}
