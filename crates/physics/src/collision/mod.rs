//! Spatial probes against static world geometry.
//!
//! The simulation only ever asks two questions of the world:
//!
//! - Sweep a sphere from `A` to `B`: which surfaces does it run into, in order?
//! - Trace a line from `A` to `B`: what is the nearest surface?
//!
//! [`SpatialQuery`] captures exactly that, so a host can plug in its own
//! scene representation. [`CollisionWorld`] is the built-in implementation
//! backed by parry3d shapes.

mod trace;
mod world;

use serde::{Deserialize, Serialize};

pub use trace::SweepHit;
pub use world::{CollisionBrush, CollisionWorld};

use glam::Vec3;

/// Stable identity of a host object.
///
/// Hosts hand these out; the simulation never interprets the value beyond
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Read-only spatial queries against static geometry.
///
/// Implementations must be safe to call from the simulation thread while the
/// owning thread keeps running.
pub trait SpatialQuery: Send + Sync {
    /// Sweep a sphere of `radius` from `start` to `end`.
    ///
    /// Returns every blocking hit ordered by ascending travel fraction.
    /// Geometry owned by `ignore` is skipped.
    fn sweep_sphere(
        &self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        ignore: Option<ObjectId>,
    ) -> Vec<SweepHit>;

    /// Trace a line from `start` to `end` and return the nearest hit.
    fn line_trace(&self, start: Vec3, end: Vec3, ignore: Option<ObjectId>) -> Option<SweepHit>;
}
