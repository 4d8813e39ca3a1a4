//! Velocity and position integration.

use glam::Vec3;

use super::config::Movement;
use crate::UP;

/// Result of one integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integration {
    /// Velocity after acceleration, braking and the speed clamp.
    pub velocity: Vec3,
    /// Where the object would end up if nothing is in the way.
    pub position: Vec3,
}

/// Integrate one object for `delta_time` seconds.
///
/// Acceleration is `direction * acceleration` plus gravity along `-UP`.
/// Braking opposes the current velocity with strength
/// `min(|velocity|, deceleration)` and never removes more speed than the
/// object has, so it can't flip the direction of travel within one step.
/// The resulting velocity is clamped to `max_speed` before it moves the
/// object.
pub fn integrate(
    position: Vec3,
    velocity: Vec3,
    direction: Vec3,
    movement: &Movement,
    delta_time: f32,
) -> Integration {
    let mut acceleration = direction * movement.acceleration;
    acceleration -= UP * movement.gravity;

    let mut new_velocity = velocity + acceleration * delta_time;

    if movement.deceleration > 0.0 {
        let speed = velocity.length();
        let braking_direction = (-velocity).normalize_or_zero();
        let braking = (speed.min(movement.deceleration) * delta_time).min(speed);
        new_velocity += braking_direction * braking;
    }

    let new_velocity = new_velocity.clamp_length_max(movement.max_speed);

    Integration {
        velocity: new_velocity,
        position: position + new_velocity * delta_time,
    }
}
