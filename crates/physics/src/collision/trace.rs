//! Hit records returned by spatial probes.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::ObjectId;
use crate::UP;

/// One surface contact found by a sweep or line trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepHit {
    /// How far along the probe path the contact happened.
    ///
    /// - `0.0` = already touching at the start
    /// - `0.5` = hit halfway through
    pub fraction: f32,

    /// Probe origin at the moment of contact.
    ///
    /// For a sphere sweep this is the sphere centre, for a line trace it is
    /// the same as `impact_point`.
    pub position: Vec3,

    /// Point on the surface that was touched.
    pub impact_point: Vec3,

    /// Surface normal at the impact point, pointing away from the surface.
    pub impact_normal: Vec3,

    /// Host object owning the geometry, `None` for plain world geometry.
    pub object: Option<ObjectId>,
}

impl SweepHit {
    /// Create a hit against unowned world geometry.
    pub fn world(fraction: f32, position: Vec3, impact_point: Vec3, impact_normal: Vec3) -> Self {
        Self {
            fraction,
            position,
            impact_point,
            impact_normal,
            object: None,
        }
    }

    /// Angle between the impact normal and up, in radians.
    ///
    /// `0` is a flat floor, `π/2` a vertical wall.
    #[inline]
    pub fn slope(&self) -> f32 {
        crate::movement::slope_angle(self.impact_normal)
    }

    /// Whether the surface faces upwards at all.
    #[inline]
    pub fn faces_up(&self) -> bool {
        self.impact_normal.dot(UP) > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_floor_hit_has_zero_slope() {
        let hit = SweepHit::world(0.5, Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO, Vec3::Z);
        assert!(hit.slope().abs() < 1e-5);
        assert!(hit.faces_up());
    }

    #[test]
    fn test_wall_hit_is_vertical() {
        let hit = SweepHit::world(0.5, Vec3::ZERO, Vec3::X, -Vec3::X);
        assert!((hit.slope() - FRAC_PI_2).abs() < 1e-5);
        assert!(!hit.faces_up());
        assert!(hit.object.is_none());
    }
}
