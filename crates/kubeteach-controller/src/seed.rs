//! Loading of JSON manifests into the store at start-up.

use std::path::{Path, PathBuf};

use kubeteach_core::ObjectKey;
use kubeteach_storage::{ObjectStore, StorageError};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Creates every object found in the `*.json` files of `dir`.
///
/// A file holds either one object or an array of objects. Files are read in
/// name order. Objects that already exist are left untouched.
/// Returns the number of objects created.
pub async fn load_manifests(store: &dyn ObjectStore, dir: &Path) -> Result<usize, SeedError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|source| SeedError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    while let Some(entry) = entries.next_entry().await.map_err(|source| SeedError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut created = 0;
    for path in paths {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SeedError::Io {
                path: path.clone(),
                source,
            })?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|source| SeedError::Json {
            path: path.clone(),
            source,
        })?;
        let objects = match parsed {
            Value::Array(items) => items,
            single => vec![single],
        };

        for object in &objects {
            match store.create(object).await {
                Ok(stored) => {
                    tracing::info!(key = %stored.key, file = %path.display(), "seeded object");
                    created += 1;
                }
                Err(e) if e.is_already_exists() => {
                    let key = ObjectKey::from_object(object).map(|k| k.to_string());
                    tracing::warn!(key = ?key.ok(), file = %path.display(), "object already exists, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeteach_db_memory::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let set = json!({
            "apiVersion": "kubeteach.geberl.io/v1alpha1",
            "kind": "ExerciseSet",
            "metadata": {"name": "intro", "namespace": "default"},
            "spec": {"taskDefinitions": [{"name": "a", "taskDefinitionSpec": {"points": 10}}]}
        });
        let mut other = set.clone();
        other["metadata"]["name"] = json!("advanced");

        std::fs::write(dir.path().join("01-intro.json"), set.to_string()).unwrap();
        std::fs::write(
            dir.path().join("02-more.json"),
            json!([other, set]).to_string(),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = InMemoryStore::new();
        let created = load_manifests(&store, dir.path()).await.unwrap();
        assert_eq!(created, 2);
        assert_eq!(store.list("ExerciseSet", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_manifests_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let store = InMemoryStore::new();
        let err = load_manifests(&store, dir.path()).await.unwrap_err();
        assert!(matches!(err, SeedError::Json { .. }));
    }

    #[tokio::test]
    async fn test_load_manifests_missing_dir() {
        let store = InMemoryStore::new();
        let err = load_manifests(&store, Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Io { .. }));
    }
}
