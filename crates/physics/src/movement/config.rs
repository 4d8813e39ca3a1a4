//! Per-object movement and collision tuning.
//!
//! Defaults use centimetre-scale world units (a probe radius of 50 is a
//! half-metre sphere).

use serde::{Deserialize, Serialize};

/// Movement tuning for one object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Acceleration applied along the input direction (units/second²).
    pub acceleration: f32,

    /// Braking acceleration opposing the current velocity (units/second²).
    ///
    /// Zero disables braking.
    pub deceleration: f32,

    /// Hard cap on velocity magnitude (units/second).
    pub max_speed: f32,

    /// Downward acceleration (units/second²).
    pub gravity: f32,

    /// Whether moves are swept against the world.
    pub collision_enabled: bool,
}

impl Default for Movement {
    fn default() -> Self {
        Self {
            acceleration: 10.0,
            deceleration: 0.1,
            max_speed: 1000.0,
            gravity: 9.8,
            collision_enabled: true,
        }
    }
}

impl Movement {
    /// Free-flying movement: no gravity, no collision.
    pub fn free(acceleration: f32, max_speed: f32) -> Self {
        Self {
            acceleration,
            deceleration: 0.0,
            max_speed,
            gravity: 0.0,
            collision_enabled: false,
        }
    }
}

/// Sweep probe used when collision is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionProbe {
    /// Radius of the swept sphere.
    pub radius: f32,

    /// Tallest ledge the object may step onto when blocked. Zero disables stepping.
    pub step_height: f32,

    /// Steepest surface still treated as walkable (degrees from flat).
    pub acceptable_slope_degrees: f32,

    /// Furthest a slide may pull the target away from the intended position.
    pub acceptable_distance: f32,

    /// Re-sweeps allowed while sliding before giving up.
    pub max_slope_iterations: u8,
}

impl Default for CollisionProbe {
    fn default() -> Self {
        Self {
            radius: 50.0,
            step_height: 0.0,
            acceptable_slope_degrees: 45.0,
            acceptable_distance: 50.0,
            max_slope_iterations: 3,
        }
    }
}

impl CollisionProbe {
    /// Walkable slope limit in radians.
    #[inline]
    pub fn acceptable_slope(&self) -> f32 {
        self.acceptable_slope_degrees.to_radians()
    }
}
