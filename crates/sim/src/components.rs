//! Per-object rows stored by the registry.
//!
//! Each type here is one column of the struct-of-arrays layout. Movement and
//! collision tuning live in `tessera_physics` and are re-exported.

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use tessera_physics::{CollisionProbe, Movement};

/// Position and velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Orientation as pitch/yaw/roll in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Largest per-axis difference to `other`, in degrees.
    pub fn max_difference(&self, other: &Rotator) -> f32 {
        (self.pitch - other.pitch)
            .abs()
            .max((self.yaw - other.yaw).abs())
            .max((self.roll - other.roll).abs())
    }
}

/// Orientation plus how fast rotation input turns it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub value: Rotator,
    /// Degrees of yaw per tick at full rotation input.
    pub rotation_speed: f32,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            value: Rotator::ZERO,
            rotation_speed: 1.0,
        }
    }
}

/// Intent set by the host or its AI. The simulation only reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementInput {
    /// Desired movement direction. Not normalized.
    pub direction: Vec3,
    /// Rotation input; only `y` (yaw) is consumed.
    pub rotation: Vec3,
}

impl MovementInput {
    pub fn moving(direction: Vec3) -> Self {
        Self {
            direction,
            rotation: Vec3::ZERO,
        }
    }

    pub fn turning(yaw: f32) -> Self {
        Self {
            direction: Vec3::ZERO,
            rotation: Vec3::new(0.0, yaw, 0.0),
        }
    }
}
