//! Store traits for the object store abstraction.
//!
//! [`ObjectStore`] is the contract every backend implements. [`TypedStoreExt`]
//! layers typed access on top of it for any store, trait objects included.

use async_trait::async_trait;
use kubeteach_core::Resource;
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{Deleted, StoredObject};

/// The versioned object store the controller reads and writes.
///
/// Objects are JSON documents with `kind`, `metadata.namespace` and
/// `metadata.name`. Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use kubeteach_storage::{ObjectStore, StorageError, StoredObject};
///
/// async fn get_task(store: &dyn ObjectStore, name: &str) -> Result<StoredObject, StorageError> {
///     store
///         .get("TaskDefinition", "default", name)
///         .await?
///         .ok_or_else(|| StorageError::not_found("TaskDefinition", "default", name))
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads an object by kind, namespace and name.
    ///
    /// Returns `None` if the object does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing objects.
    async fn get(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StoredObject>, StorageError>;

    /// Lists objects of a kind, optionally restricted to one namespace.
    async fn list(
        &self,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<StoredObject>, StorageError>;

    /// Creates a new object.
    ///
    /// The store assigns `metadata.uid`, `metadata.resourceVersion` and
    /// `metadata.creationTimestamp`; values sent by the caller are replaced.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if an object with the same key exists.
    /// Returns `StorageError::InvalidObject` if the object is malformed.
    async fn create(&self, object: &Value) -> Result<StoredObject, StorageError>;

    /// Replaces the spec and metadata of an existing object.
    ///
    /// When `metadata.resourceVersion` is set it must match the stored
    /// version. The stored `status` is kept; use [`ObjectStore::patch_status`]
    /// to change it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    /// Returns `StorageError::VersionConflict` if the version token doesn't match.
    async fn update(&self, object: &Value) -> Result<StoredObject, StorageError>;

    /// Applies a JSON merge patch (RFC 7396) to the object's `status`.
    ///
    /// Only the `status` member of `patch` is considered; everything else in
    /// the object is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    async fn patch_status(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<StoredObject, StorageError>;

    /// Deletes an object and returns its last state.
    ///
    /// Backends that implement owner garbage collection also remove every
    /// object whose owner references carry the deleted object's uid, and
    /// report those in [`Deleted::dependents`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    async fn delete(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Deleted, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Typed access to any [`ObjectStore`].
#[async_trait]
pub trait TypedStoreExt: ObjectStore {
    /// Reads and decodes an object of kind `R::KIND`.
    async fn get_typed<R: Resource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<R>, StorageError> {
        match self.get(R::KIND, namespace, name).await? {
            Some(stored) => stored.decode().map(Some),
            None => Ok(None),
        }
    }

    /// Creates `resource` and returns it as stored.
    async fn create_typed<R: Resource>(&self, resource: &R) -> Result<R, StorageError> {
        let value = resource.to_value()?;
        self.create(&value).await?.decode()
    }

    /// Updates `resource` and returns it as stored.
    async fn update_typed<R: Resource>(&self, resource: &R) -> Result<R, StorageError> {
        let value = resource.to_value()?;
        self.update(&value).await?.decode()
    }
}

impl<S: ObjectStore + ?Sized> TypedStoreExt for S {}
