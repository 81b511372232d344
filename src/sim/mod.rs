//! Simulation core: object model, physics and the universe registry

pub mod object;
pub mod physics;
pub mod ship;
pub mod universe;

use std::sync::{Arc, RwLock};

pub use object::{Object, ObjectKind};
pub use universe::{Universe, UniverseEvent, VisualEffect};

/// The universe behind its single reader/writer lock; mutators take the
/// write side, snapshots and lookups the read side. Never held across await.
pub type SharedUniverse = Arc<RwLock<Universe>>;
