//! ExerciseSet controller for kubeteach.
//!
//! [`reconcile::Reconciler`] keeps the TaskDefinitions declared by an
//! ExerciseSet in place and derives the ExerciseSet's aggregate status from
//! them. [`controller::Controller`] drives it from store events and a
//! requeue interval.

pub mod config;
pub mod context;
pub mod controller;
pub mod observability;
pub mod reconcile;
pub mod seed;

pub use config::{AppConfig, ConfigError, ControllerConfig, UpdateStrategy};
pub use context::ReconcileContext;
pub use controller::{Controller, ControllerHandle, ControllerSettings, ControllerStats};
pub use reconcile::{Action, ReconcileError, Reconciler, ReconcilerConfig};
