//! Simulation configuration.
//!
//! Everything is plain serde data with defaults tuned for centimetre-scale
//! worlds at 30 Hz. Hosts construct these directly.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::components::{CollisionProbe, Movement, Rotator};

/// What an enqueue does when another thread holds the queue lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockPolicy {
    /// Wait for the lock, then insert.
    Block,
    /// Give up and drop the command.
    Drop,
}

/// Sizing and locking behaviour of one command queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum pending commands. Further enqueues are dropped.
    pub capacity: usize,
    pub lock_policy: LockPolicy,
}

impl QueueConfig {
    /// Large blocking queue for general owning-thread work.
    pub const GENERAL: Self = Self {
        capacity: 50_000,
        lock_policy: LockPolicy::Block,
    };

    /// Small fire-and-forget queue carrying one object's transform updates.
    pub const PER_OBJECT: Self = Self {
        capacity: 4,
        lock_policy: LockPolicy::Drop,
    };
}

/// How the registry decides whether a row changed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ChangeDetection {
    /// Any bit-level difference counts, floating-point noise included.
    Exact,
    /// Differences at or below the tolerance are ignored.
    Tolerance(f32),
}

impl ChangeDetection {
    pub fn position_changed(self, before: Vec3, after: Vec3) -> bool {
        match self {
            Self::Exact => before != after,
            Self::Tolerance(tolerance) => before.distance(after) > tolerance,
        }
    }

    pub fn rotation_changed(self, before: Rotator, after: Rotator) -> bool {
        match self {
            Self::Exact => before != after,
            Self::Tolerance(tolerance) => before.max_difference(&after) > tolerance,
        }
    }
}

/// Initial values for a freshly registered row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowDefaults {
    pub movement: Movement,
    pub collision: CollisionProbe,
    pub rotation_speed: f32,
}

impl Default for RowDefaults {
    fn default() -> Self {
        Self {
            movement: Movement::default(),
            collision: CollisionProbe::default(),
            rotation_speed: 1.0,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Background ticks per second.
    pub target_rate: f64,

    /// Upper bound (exclusive) of the random frame delay given to per-object
    /// updates. Spreads owning-thread work over neighbouring frames.
    pub max_frame_delay: u64,

    /// Commands executed per queue per owning-thread tick.
    pub commands_per_frame: usize,

    pub general_queue: QueueConfig,
    pub object_queue: QueueConfig,
    pub change_detection: ChangeDetection,
    pub defaults: RowDefaults,

    /// Seed for the frame-delay generator. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target_rate: 30.0,
            max_frame_delay: 10,
            commands_per_frame: 5,
            general_queue: QueueConfig::GENERAL,
            object_queue: QueueConfig::PER_OBJECT,
            change_detection: ChangeDetection::Exact,
            defaults: RowDefaults::default(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Time budget of one background tick in seconds.
    pub fn frame_time(&self) -> f64 {
        1.0 / self.target_rate
    }

    /// Check the values the driver relies on.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.target_rate.is_finite() && self.target_rate > 0.0) {
            return Err("target_rate must be positive");
        }
        if self.commands_per_frame == 0 {
            return Err("commands_per_frame must be at least 1");
        }
        if self.general_queue.capacity == 0 || self.object_queue.capacity == 0 {
            return Err("queue capacity must be at least 1");
        }
        if let ChangeDetection::Tolerance(tolerance) = self.change_detection {
            if !(tolerance >= 0.0) {
                return Err("change tolerance must be non-negative");
            }
        }
        Ok(())
    }
}
