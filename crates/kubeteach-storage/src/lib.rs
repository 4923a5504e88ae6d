//! # kubeteach-storage
//!
//! Object store abstraction for the kubeteach controller.
//!
//! This crate defines the contract every store backend implements. It does
//! not contain a backend - see `kubeteach-db-memory` for one.
//!
//! ## Overview
//!
//! The main trait is [`ObjectStore`]: get, list, create, update,
//! status merge-patch and delete on JSON objects addressed by kind,
//! namespace and name. Writes are versioned; an update carrying a stale
//! `metadata.resourceVersion` fails with [`StorageError::VersionConflict`].
//!
//! [`TypedStoreExt`] adds typed access for any [`kubeteach_core::Resource`],
//! and [`EventedStore`] publishes every successful write on an event bus.
//!
//! ## Example
//!
//! ```ignore
//! use kubeteach_core::ExerciseSet;
//! use kubeteach_storage::{DynStore, TypedStoreExt};
//!
//! async fn load(store: &DynStore) -> Result<Option<ExerciseSet>, StorageError> {
//!     store.get_typed::<ExerciseSet>("default", "intro").await
//! }
//! ```

mod error;
pub mod evented;
mod traits;
mod types;

pub use error::StorageError;
pub use evented::EventedStore;
pub use traits::{ObjectStore, TypedStoreExt};
pub use types::{Deleted, StoredObject};

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn ObjectStore>;
