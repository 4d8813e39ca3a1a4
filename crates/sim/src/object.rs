//! Host object capability.
//!
//! The simulation never owns the objects it moves. Hosts wrap their scene
//! objects in [`WorldObject`] and hand out shared references; the registry
//! reads the initial transform at registration and writes results back only
//! from closures the owning thread executes.

use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tessera_physics::ObjectId;

use crate::components::Rotator;

/// Tag marking an object as driven by the simulation.
pub const SIM_TAG: &str = "DOD";

/// Identity of the host world (level, scene, match) an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub u64);

/// Shared reference to a host object.
pub type ObjectRef = Arc<dyn WorldObject>;

/// A live object in the host world.
///
/// Setters take `&self`: implementations provide their own interior
/// mutability. The simulation only calls them from the owning thread.
pub trait WorldObject: Send + Sync {
    /// Stable identity used for deduplication.
    fn id(&self) -> ObjectId;

    /// Current world position.
    fn world_position(&self) -> Vec3;

    /// Move the object.
    fn set_world_position(&self, position: Vec3);

    /// Current world orientation.
    fn world_rotation(&self) -> Rotator;

    /// Rotate the object.
    fn set_world_rotation(&self, rotation: Rotator);

    /// Whether the object carries `tag`.
    fn has_tag(&self, tag: &str) -> bool;

    /// Attach `tag` to the object.
    fn add_tag(&self, tag: &str);

    /// World the object belongs to, if the host tracks one.
    fn owning_context(&self) -> Option<ContextId> {
        None
    }
}

/// Mark `object` as simulated. Safe to call repeatedly.
pub(crate) fn ensure_tagged(object: &dyn WorldObject) {
    if !object.has_tag(SIM_TAG) {
        object.add_tag(SIM_TAG);
    }
}
