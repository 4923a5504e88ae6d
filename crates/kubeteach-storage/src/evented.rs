//! EventedStore - A store wrapper that emits events after writes.
//!
//! This wrapper delegates all operations to an inner store while emitting
//! events to a broadcaster after successful writes.
//!
//! # Example
//!
//! ```ignore
//! use kubeteach_storage::EventedStore;
//! use kubeteach_core::events::EventBroadcaster;
//!
//! let broadcaster = EventBroadcaster::new_shared();
//! let store = EventedStore::new(InMemoryStore::new(), broadcaster);
//!
//! // After this, an event will be emitted to the broadcaster
//! store.create(&exercise_set_json).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use kubeteach_core::events::EventBroadcaster;
use serde_json::Value;
use tracing::debug;

use crate::error::StorageError;
use crate::traits::ObjectStore;
use crate::types::{Deleted, StoredObject};

/// A store wrapper that emits events after successful writes.
///
/// Events are emitted **after** the write succeeds, so every event
/// corresponds to an actual change in the store.
pub struct EventedStore<S: ObjectStore> {
    /// The inner store implementation.
    inner: S,
    /// The event broadcaster.
    broadcaster: Arc<EventBroadcaster>,
}

impl<S: ObjectStore> EventedStore<S> {
    /// Create a new evented store wrapper.
    pub fn new(inner: S, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { inner, broadcaster }
    }

    /// Get a reference to the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn emit(&self, op: &'static str, stored: &StoredObject, send: impl FnOnce() -> usize) {
        if self.broadcaster.subscriber_count() == 0 {
            return;
        }
        let count = send();
        debug!(
            key = %stored.key,
            resource_version = %stored.resource_version,
            subscribers = count,
            op,
            "Emitted object event"
        );
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for EventedStore<S> {
    async fn get(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StoredObject>, StorageError> {
        // Read operations don't emit events
        self.inner.get(kind, namespace, name).await
    }

    async fn list(
        &self,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<StoredObject>, StorageError> {
        self.inner.list(kind, namespace).await
    }

    async fn create(&self, object: &Value) -> Result<StoredObject, StorageError> {
        let stored = self.inner.create(object).await?;
        self.emit("created", &stored, || {
            self.broadcaster
                .send_created(stored.key.clone(), stored.object.clone())
        });
        Ok(stored)
    }

    async fn update(&self, object: &Value) -> Result<StoredObject, StorageError> {
        let stored = self.inner.update(object).await?;
        self.emit("updated", &stored, || {
            self.broadcaster
                .send_updated(stored.key.clone(), stored.object.clone())
        });
        Ok(stored)
    }

    async fn patch_status(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<StoredObject, StorageError> {
        let stored = self
            .inner
            .patch_status(kind, namespace, name, patch)
            .await?;
        self.emit("status_patched", &stored, || {
            self.broadcaster
                .send_status_patched(stored.key.clone(), stored.object.clone())
        });
        Ok(stored)
    }

    async fn delete(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Deleted, StorageError> {
        let deleted = self.inner.delete(kind, namespace, name).await?;
        // Owners first, so watchers never see a child outlive its parent
        for stored in std::iter::once(&deleted.object).chain(&deleted.dependents) {
            self.emit("deleted", stored, || {
                self.broadcaster
                    .send_deleted(stored.key.clone(), Some(stored.object.clone()))
            });
        }
        Ok(deleted)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

impl<S: ObjectStore> std::fmt::Debug for EventedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventedStore")
            .field("backend", &self.inner.backend_name())
            .field("subscriber_count", &self.broadcaster.subscriber_count())
            .finish()
    }
}
