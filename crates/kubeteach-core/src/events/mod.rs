//! Object change events.
//!
//! Every successful write to the store is published as an [`ObjectEvent`]
//! on an [`EventBroadcaster`]. The controller subscribes to it to decide
//! which ExerciseSet to reconcile next.
//!
//! ```text
//!   store write ──► EventBroadcaster (tokio broadcast) ──► controller watch
//! ```

pub mod broadcaster;
pub mod types;

pub use broadcaster::EventBroadcaster;
pub use types::{ObjectEvent, ObjectEventType};
