//! Object movement physics.
//!
//! This module implements the per-object movement step used by the
//! simulation thread:
//!
//! - Acceleration from input direction, constant gravity and braking
//! - Hard clamp to the object's max speed
//! - Sweep-and-slide collision resolution against static geometry
//!
//! # Design
//!
//! Everything here is a pure function of its inputs. Callers own the state
//! (struct-of-arrays rows in the simulation registry) and feed one row at a
//! time through [`integrate`] and [`check_collision`].

mod config;
mod integrate;
mod resolver;

pub use config::{CollisionProbe, Movement};
pub use integrate::{integrate, Integration};
pub use resolver::{check_collision, slide_vector, slope_angle, Resolution};
