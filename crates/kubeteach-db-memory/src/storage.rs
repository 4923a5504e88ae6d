use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kubeteach_core::ObjectKey;
use kubeteach_storage::StoredObject;
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;

pub type StorageKey = String; // Format: "Kind/namespace/name"

pub(crate) fn make_storage_key(key: &ObjectKey) -> StorageKey {
    key.to_string()
}

pub(crate) fn make_storage_key_str(kind: &str, namespace: &str, name: &str) -> StorageKey {
    format!("{kind}/{namespace}/{name}")
}

/// In-memory object store using papaya lock-free HashMap.
///
/// This store provides:
/// - Lock-free concurrent reads via papaya::HashMap
/// - Writes serialized by a single async mutex, so version checks and
///   existence checks are atomic with the write that follows them
/// - Monotonic resource versions shared by all objects
/// - Status-subresource semantics: `update` never touches `status`
/// - Cascading deletion of owned objects
#[derive(Debug)]
pub struct InMemoryStore {
    /// Main storage using papaya for lock-free concurrent access
    pub(crate) data: Arc<PapayaHashMap<StorageKey, StoredObject>>,
    /// Atomic counter for generating resource versions
    pub(crate) version_counter: AtomicU64,
    /// Serializes writers
    pub(crate) write_lock: Mutex<()>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            version_counter: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Generates the next resource version.
    pub(crate) fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    /// Number of objects currently stored, all kinds included.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of every object transitively owned by `uid`.
    ///
    /// Must be called with the write lock held.
    pub(crate) fn collect_dependents(&self, uid: &str) -> Vec<StorageKey> {
        let guard = self.data.pin();
        let mut pending = VecDeque::from([uid.to_string()]);
        let mut dependents = Vec::new();

        while let Some(owner_uid) = pending.pop_front() {
            for (key, stored) in guard.iter() {
                if dependents.contains(key) {
                    continue;
                }
                if owner_uids(&stored.object).any(|u| u == owner_uid) {
                    dependents.push(key.clone());
                    pending.push_back(stored.uid.clone());
                }
            }
        }

        dependents
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn owner_uids(object: &Value) -> impl Iterator<Item = &str> {
    object
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|r| r.get("uid").and_then(Value::as_str))
}

/// Current time formatted the way `metadata.creationTimestamp` is written.
pub(crate) fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

/// Sets `metadata.<field>`, creating `metadata` when missing.
pub(crate) fn set_metadata_field(object: &mut Value, field: &str, value: Value) {
    let Some(obj) = object.as_object_mut() else {
        return;
    };
    let metadata = obj
        .entry("metadata")
        .or_insert_with(|| Value::Object(Default::default()));
    if let Some(meta) = metadata.as_object_mut() {
        meta.insert(field.to_string(), value);
    }
}

/// The version token the writer based its change on, if it sent one.
pub(crate) fn requested_version(object: &Value) -> Option<&str> {
    object
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_storage_keys() {
        let key = ObjectKey::new("TaskDefinition", "default", "a");
        assert_eq!(make_storage_key(&key), "TaskDefinition/default/a");
        assert_eq!(
            make_storage_key_str("TaskDefinition", "default", "a"),
            make_storage_key(&key)
        );
    }

    #[test]
    fn test_versions_are_monotonic() {
        let store = InMemoryStore::new();
        let v1: u64 = store.next_version().parse().unwrap();
        let v2: u64 = store.next_version().parse().unwrap();
        assert!(v2 > v1);
    }

    #[test]
    fn test_set_metadata_field() {
        let mut object = json!({"kind": "ExerciseSet"});
        set_metadata_field(&mut object, "uid", json!("u-1"));
        assert_eq!(object["metadata"]["uid"], "u-1");

        set_metadata_field(&mut object, "resourceVersion", json!("3"));
        assert_eq!(object["metadata"]["uid"], "u-1");
        assert_eq!(requested_version(&object), Some("3"));
    }

    #[test]
    fn test_requested_version_ignores_empty() {
        let object = json!({"metadata": {"resourceVersion": ""}});
        assert_eq!(requested_version(&object), None);
    }

    #[test]
    fn test_owner_uids() {
        let object = json!({
            "metadata": {"ownerReferences": [{"uid": "a"}, {"uid": "b"}, {"name": "no-uid"}]}
        });
        let uids: Vec<&str> = owner_uids(&object).collect();
        assert_eq!(uids, vec!["a", "b"]);
        assert_eq!(owner_uids(&json!({})).count(), 0);
    }
}
