//! Tessera Physics
//!
//! Collision queries and movement integration for the tessera background
//! simulation. Nothing in this crate touches live host objects; it works on
//! plain values so the simulation thread can call it without synchronization.
//!
//! # Architecture
//!
//! - **Collision**: Spatial probe interface ([`SpatialQuery`]) and a static
//!   geometry world ([`CollisionWorld`]) that answers sphere sweeps and line traces
//! - **Movement**: Velocity integration and the sweep-and-slide resolver that
//!   decides where a moving probe is allowed to end up
//!
//! # Conventions
//!
//! +Z is up. Gravity pulls along `-Z`. Distances are in world units and times
//! in seconds.

use glam::Vec3;

pub mod collision;
pub mod movement;

pub use collision::{CollisionWorld, ObjectId, SpatialQuery, SweepHit};
pub use movement::{
    check_collision, integrate, slide_vector, slope_angle, CollisionProbe, Integration, Movement,
    Resolution,
};

/// World up axis.
pub const UP: Vec3 = Vec3::Z;
