//! Implementation of the ObjectStore trait for InMemoryStore.

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;

use kubeteach_core::ObjectKey;
use kubeteach_storage::{Deleted, ObjectStore, StorageError, StoredObject};

use crate::storage::{
    InMemoryStore, format_timestamp, make_storage_key, make_storage_key_str, requested_version,
    set_metadata_field,
};

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StoredObject>, StorageError> {
        let key = make_storage_key_str(kind, namespace, name);
        let guard = self.data.pin();
        Ok(guard.get(&key).cloned())
    }

    async fn list(
        &self,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<StoredObject>, StorageError> {
        let guard = self.data.pin();
        let mut objects: Vec<StoredObject> = guard
            .values()
            .filter(|stored| stored.key.kind == kind)
            .filter(|stored| namespace.is_none_or(|ns| stored.key.namespace == ns))
            .cloned()
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn create(&self, object: &Value) -> Result<StoredObject, StorageError> {
        let key = ObjectKey::from_object(object)?;
        let storage_key = make_storage_key(&key);

        let _write = self.write_lock.lock().await;
        let guard = self.data.pin();

        if guard.get(&storage_key).is_some() {
            return Err(StorageError::already_exists(
                &key.kind,
                &key.namespace,
                &key.name,
            ));
        }

        let uid = uuid::Uuid::new_v4().to_string();
        let resource_version = self.next_version();
        let now = OffsetDateTime::now_utc();

        let mut stored_object = object.clone();
        set_metadata_field(&mut stored_object, "namespace", Value::String(key.namespace.clone()));
        set_metadata_field(&mut stored_object, "uid", Value::String(uid.clone()));
        set_metadata_field(
            &mut stored_object,
            "resourceVersion",
            Value::String(resource_version.clone()),
        );
        set_metadata_field(
            &mut stored_object,
            "creationTimestamp",
            Value::String(format_timestamp(now)),
        );

        let stored = StoredObject {
            key,
            uid,
            resource_version,
            object: stored_object,
            created_at: now,
            last_updated: now,
        };
        guard.insert(storage_key, stored.clone());

        tracing::trace!(key = %stored.key, version = %stored.resource_version, "created");
        Ok(stored)
    }

    async fn update(&self, object: &Value) -> Result<StoredObject, StorageError> {
        let key = ObjectKey::from_object(object)?;
        let storage_key = make_storage_key(&key);

        let _write = self.write_lock.lock().await;
        let guard = self.data.pin();

        let existing = guard
            .get(&storage_key)
            .ok_or_else(|| StorageError::not_found(&key.kind, &key.namespace, &key.name))?;

        if let Some(expected) = requested_version(object) {
            if expected != existing.resource_version {
                return Err(StorageError::version_conflict(
                    expected,
                    &existing.resource_version,
                ));
            }
        }

        let resource_version = self.next_version();
        let mut updated = object.clone();
        for field in ["uid", "creationTimestamp", "namespace"] {
            let current = existing
                .object
                .pointer(&format!("/metadata/{field}"))
                .cloned()
                .unwrap_or(Value::Null);
            set_metadata_field(&mut updated, field, current);
        }
        set_metadata_field(
            &mut updated,
            "resourceVersion",
            Value::String(resource_version.clone()),
        );

        // Status is owned by patch_status
        if let Some(obj) = updated.as_object_mut() {
            match existing.object.get("status") {
                Some(status) => {
                    obj.insert("status".to_string(), status.clone());
                }
                None => {
                    obj.remove("status");
                }
            }
        }

        let stored = existing.new_revision(resource_version, updated);
        guard.insert(storage_key, stored.clone());

        tracing::trace!(key = %stored.key, version = %stored.resource_version, "updated");
        Ok(stored)
    }

    async fn patch_status(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<StoredObject, StorageError> {
        let status_patch = patch
            .get("status")
            .ok_or_else(|| StorageError::invalid_object("status patch must contain a status member"))?;
        let storage_key = make_storage_key_str(kind, namespace, name);

        let _write = self.write_lock.lock().await;
        let guard = self.data.pin();

        let existing = guard
            .get(&storage_key)
            .ok_or_else(|| StorageError::not_found(kind, namespace, name))?;

        let resource_version = self.next_version();
        let mut patched = existing.object.clone();
        json_patch::merge(
            &mut patched,
            &serde_json::json!({ "status": status_patch }),
        );
        set_metadata_field(
            &mut patched,
            "resourceVersion",
            Value::String(resource_version.clone()),
        );

        let stored = existing.new_revision(resource_version, patched);
        guard.insert(storage_key, stored.clone());

        tracing::trace!(key = %stored.key, version = %stored.resource_version, "status patched");
        Ok(stored)
    }

    async fn delete(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Deleted, StorageError> {
        let storage_key = make_storage_key_str(kind, namespace, name);

        let _write = self.write_lock.lock().await;

        let removed = self
            .data
            .pin()
            .remove(&storage_key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(kind, namespace, name))?;

        let guard = self.data.pin();
        let dependents: Vec<StoredObject> = self
            .collect_dependents(&removed.uid)
            .iter()
            .filter_map(|key| guard.remove(key).cloned())
            .collect();

        tracing::debug!(
            key = %removed.key,
            cascaded = dependents.len(),
            "deleted"
        );
        Ok(Deleted {
            object: removed,
            dependents,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exercise_set(name: &str) -> Value {
        json!({
            "apiVersion": "kubeteach.geberl.io/v1alpha1",
            "kind": "ExerciseSet",
            "metadata": {"name": name, "namespace": "default"},
            "spec": {"taskDefinitions": [{"name": "a", "taskDefinitionSpec": {"points": 1}}]}
        })
    }

    fn task(name: &str, owner_uid: &str) -> Value {
        json!({
            "apiVersion": "kubeteach.geberl.io/v1alpha1",
            "kind": "TaskDefinition",
            "metadata": {
                "name": name,
                "namespace": "default",
                "ownerReferences": [{
                    "apiVersion": "kubeteach.geberl.io/v1alpha1",
                    "kind": "ExerciseSet",
                    "name": "intro",
                    "uid": owner_uid
                }]
            },
            "spec": {"points": 1}
        })
    }

    #[tokio::test]
    async fn test_create_assigns_metadata() {
        let store = InMemoryStore::new();
        let created = store.create(&exercise_set("intro")).await.unwrap();

        assert!(!created.uid.is_empty());
        assert_eq!(created.object["metadata"]["uid"], created.uid.as_str());
        assert_eq!(
            created.object["metadata"]["resourceVersion"],
            created.resource_version.as_str()
        );
        assert!(created.object["metadata"]["creationTimestamp"].is_string());

        let fetched = store
            .get("ExerciseSet", "default", "intro")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.object, created.object);
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let store = InMemoryStore::new();
        store.create(&exercise_set("intro")).await.unwrap();
        let err = store.create(&exercise_set("intro")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let store = InMemoryStore::new();
        let err = store
            .create(&json!({"kind": "ExerciseSet", "metadata": {}}))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidObject { .. }));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.get("ExerciseSet", "default", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_checks_version() {
        let store = InMemoryStore::new();
        let created = store.create(&exercise_set("intro")).await.unwrap();

        let mut stale = created.object.clone();
        stale["spec"]["taskDefinitions"] = json!([]);
        let updated = store.update(&stale).await.unwrap();
        assert_ne!(updated.resource_version, created.resource_version);
        assert_eq!(updated.uid, created.uid);

        // Same base version again: someone else wrote in between
        let err = store.update(&stale).await.unwrap_err();
        assert!(err.is_version_conflict());
    }

    #[tokio::test]
    async fn test_update_without_version_is_unconditional() {
        let store = InMemoryStore::new();
        store.create(&exercise_set("intro")).await.unwrap();
        let updated = store.update(&exercise_set("intro")).await.unwrap();
        assert_eq!(updated.object["metadata"]["resourceVersion"], updated.resource_version.as_str());
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let store = InMemoryStore::new();
        let err = store.update(&exercise_set("intro")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_preserves_status_and_identity() {
        let store = InMemoryStore::new();
        let created = store.create(&exercise_set("intro")).await.unwrap();
        store
            .patch_status(
                "ExerciseSet",
                "default",
                "intro",
                &json!({"status": {"numberOfTasks": 1}}),
            )
            .await
            .unwrap();

        let mut rewrite = exercise_set("intro");
        rewrite["status"] = json!({"numberOfTasks": 99});
        rewrite["metadata"]["uid"] = json!("forged");
        let updated = store.update(&rewrite).await.unwrap();

        assert_eq!(updated.object["status"]["numberOfTasks"], 1);
        assert_eq!(updated.object["metadata"]["uid"], created.uid.as_str());
        assert_eq!(
            updated.object["metadata"]["creationTimestamp"],
            created.object["metadata"]["creationTimestamp"]
        );
    }

    #[tokio::test]
    async fn test_patch_status_merges() {
        let store = InMemoryStore::new();
        let created = store.create(&exercise_set("intro")).await.unwrap();

        store
            .patch_status(
                "ExerciseSet",
                "default",
                "intro",
                &json!({"status": {"numberOfTasks": 2, "pointsTotal": 10}}),
            )
            .await
            .unwrap();
        let patched = store
            .patch_status(
                "ExerciseSet",
                "default",
                "intro",
                &json!({"status": {"pointsTotal": 12}, "spec": {"ignored": true}}),
            )
            .await
            .unwrap();

        assert_eq!(patched.object["status"]["numberOfTasks"], 2);
        assert_eq!(patched.object["status"]["pointsTotal"], 12);
        assert_eq!(patched.object["spec"], created.object["spec"]);
        assert_ne!(patched.resource_version, created.resource_version);
    }

    #[tokio::test]
    async fn test_patch_status_requires_status_member() {
        let store = InMemoryStore::new();
        store.create(&exercise_set("intro")).await.unwrap();
        let err = store
            .patch_status("ExerciseSet", "default", "intro", &json!({"spec": {}}))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidObject { .. }));

        let err = store
            .patch_status("ExerciseSet", "default", "nope", &json!({"status": {}}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_filters_kind_and_namespace() {
        let store = InMemoryStore::new();
        let set = store.create(&exercise_set("intro")).await.unwrap();
        store.create(&task("b", &set.uid)).await.unwrap();
        store.create(&task("a", &set.uid)).await.unwrap();

        let mut other_ns = exercise_set("intro");
        other_ns["metadata"]["namespace"] = json!("other");
        store.create(&other_ns).await.unwrap();

        let tasks = store.list("TaskDefinition", Some("default")).await.unwrap();
        let names: Vec<&str> = tasks.iter().map(|t| t.key.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        assert_eq!(store.list("ExerciseSet", None).await.unwrap().len(), 2);
        assert_eq!(store.list("ExerciseSet", Some("other")).await.unwrap().len(), 1);
        assert!(store.list("TaskDefinition", Some("other")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_owned_objects() {
        let store = InMemoryStore::new();
        let set = store.create(&exercise_set("intro")).await.unwrap();
        let owned = store.create(&task("a", &set.uid)).await.unwrap();
        store.create(&task("grandchild", &owned.uid)).await.unwrap();
        store.create(&task("unrelated", "someone-else")).await.unwrap();
        assert_eq!(store.len(), 4);

        let deleted = store.delete("ExerciseSet", "default", "intro").await.unwrap();
        assert_eq!(deleted.object.uid, set.uid);
        let cascaded: Vec<&str> = deleted
            .dependents
            .iter()
            .map(|d| d.key.name.as_str())
            .collect();
        assert_eq!(cascaded, vec!["a", "grandchild"]);

        let remaining = store.list("TaskDefinition", None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key.name, "unrelated");

        let err = store.delete("ExerciseSet", "default", "intro").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
