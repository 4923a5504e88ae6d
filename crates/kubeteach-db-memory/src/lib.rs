//! In-memory object store backend for the kubeteach controller.
//!
//! This crate provides an in-memory implementation of the `ObjectStore`
//! trait from `kubeteach-storage`, using papaya lock-free HashMap for reads.
//!
//! # Example
//!
//! ```ignore
//! use kubeteach_db_memory::InMemoryStore;
//! use kubeteach_storage::ObjectStore;
//!
//! let store = InMemoryStore::new();
//!
//! let set = serde_json::json!({
//!     "apiVersion": "kubeteach.geberl.io/v1alpha1",
//!     "kind": "ExerciseSet",
//!     "metadata": {"name": "intro", "namespace": "default"},
//!     "spec": {"taskDefinitions": []}
//! });
//! let created = store.create(&set).await?;
//! assert!(!created.uid.is_empty());
//! ```

mod store_impl;
pub mod storage;

pub use storage::{InMemoryStore, StorageKey};
