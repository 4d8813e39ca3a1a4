//! Sweep-and-slide collision resolution.
//!
//! A cheap approximation of sliding along slopes: sweep the probe towards the
//! target, classify the steepest surface it runs into, and either walk over
//! it, nudge the target sideways along it, or give up and stay put. At most
//! `max_slope_iterations + 1` sweeps are issued per call, plus three probes
//! for the optional step-up.

use glam::Vec3;

use super::config::CollisionProbe;
use crate::collision::{ObjectId, SpatialQuery, SweepHit};
use crate::UP;

/// Outcome of [`check_collision`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Whether the object may move this step.
    pub accepted: bool,
    /// Where the object ends up. Equals the start position when blocked.
    pub position: Vec3,
}

impl Resolution {
    /// Movement accepted at `position`.
    pub fn moved(position: Vec3) -> Self {
        Self {
            accepted: true,
            position,
        }
    }

    /// Movement rejected; the object keeps `position`.
    pub fn blocked(position: Vec3) -> Self {
        Self {
            accepted: false,
            position,
        }
    }
}

/// Angle between a surface normal and up, in radians.
#[inline]
pub fn slope_angle(normal: Vec3) -> f32 {
    normal.normalize_or_zero().dot(UP).clamp(-1.0, 1.0).acos()
}

/// Sideways nudge applied to the target after hitting a steep surface.
///
/// Perpendicular to both the surface normal and up, so it runs along the
/// surface and parallel to the floor. Its length is
/// `radius * cos(acceptable_slope)`.
pub fn slide_vector(normal: Vec3, probe: &CollisionProbe) -> Vec3 {
    normal.cross(UP).normalize_or_zero() * probe.radius * probe.acceptable_slope().cos()
}

fn steepest(hits: &[SweepHit]) -> Option<&SweepHit> {
    hits.iter().max_by(|a, b| a.slope().total_cmp(&b.slope()))
}

/// Resolve a move from `current` towards `target`.
///
/// - No hit: the move is accepted as is.
/// - Steepest hit walkable: the move is accepted as is.
/// - Otherwise the target is slid along the surface and re-swept, as long as
///   the slid target stays within `acceptable_distance` of the original one.
///
/// If sliding runs out of iterations or stalls, a step onto a low ledge is
/// tried before reporting the move as blocked.
pub fn check_collision<Q: SpatialQuery + ?Sized>(
    query: &Q,
    current: Vec3,
    target: Vec3,
    probe: &CollisionProbe,
    ignore: Option<ObjectId>,
) -> Resolution {
    let walkable = probe.acceptable_slope();
    let mut candidate = target;

    for _ in 0..=probe.max_slope_iterations {
        let hits = query.sweep_sphere(current, candidate, probe.radius, ignore);

        let Some(worst) = steepest(&hits) else {
            return Resolution::moved(candidate);
        };

        if worst.slope() <= walkable {
            return Resolution::moved(candidate);
        }

        let slid = candidate - slide_vector(worst.impact_normal, probe);
        if slid == candidate || slid.distance(target) > probe.acceptable_distance {
            break;
        }
        candidate = slid;
    }

    step_up(query, current, target, probe, ignore).unwrap_or_else(|| {
        tracing::trace!(?current, ?target, "move blocked");
        Resolution::blocked(current)
    })
}

/// Try to climb onto a ledge no taller than `step_height`.
///
/// Lift the probe, carry it across at the raised height, then drop a line
/// trace to find the ledge surface underneath.
fn step_up<Q: SpatialQuery + ?Sized>(
    query: &Q,
    current: Vec3,
    target: Vec3,
    probe: &CollisionProbe,
    ignore: Option<ObjectId>,
) -> Option<Resolution> {
    if probe.step_height <= 0.0 {
        return None;
    }

    let walkable = probe.acceptable_slope();
    let lift = UP * probe.step_height;
    let raised_start = current + lift;
    let raised_target = target + lift;

    let obstructed = |from: Vec3, to: Vec3| {
        query
            .sweep_sphere(from, to, probe.radius, ignore)
            .iter()
            .any(|hit| hit.slope() > walkable)
    };

    if obstructed(current, raised_start) || obstructed(raised_start, raised_target) {
        return None;
    }

    let ground = query.line_trace(raised_target, raised_target - lift - UP * probe.radius, ignore)?;
    if ground.slope() > walkable {
        return None;
    }

    let landing_z = (ground.impact_point.z + probe.radius).min(raised_target.z);
    Some(Resolution::moved(Vec3::new(raised_target.x, raised_target.y, landing_z)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionWorld;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Infinite vertical wall at `x = wall_x` facing -X, limited to `y >= min_y`.
    struct WallQuery {
        wall_x: f32,
        min_y: f32,
    }

    impl SpatialQuery for WallQuery {
        fn sweep_sphere(&self, start: Vec3, end: Vec3, radius: f32, _: Option<ObjectId>) -> Vec<SweepHit> {
            if end.x + radius < self.wall_x || end.y < self.min_y {
                return Vec::new();
            }
            let fraction = ((self.wall_x - radius - start.x) / (end.x - start.x)).clamp(0.0, 1.0);
            let position = start.lerp(end, fraction);
            vec![SweepHit::world(
                fraction,
                position,
                Vec3::new(self.wall_x, position.y, position.z),
                -Vec3::X,
            )]
        }

        fn line_trace(&self, _: Vec3, _: Vec3, _: Option<ObjectId>) -> Option<SweepHit> {
            None
        }
    }

    /// Counts the sweeps issued against the wrapped query.
    struct Counted<Q> {
        inner: Q,
        sweeps: AtomicUsize,
    }

    impl<Q> Counted<Q> {
        fn new(inner: Q) -> Self {
            Self {
                inner,
                sweeps: AtomicUsize::new(0),
            }
        }

        fn sweeps(&self) -> usize {
            self.sweeps.load(Ordering::SeqCst)
        }
    }

    impl<Q: SpatialQuery> SpatialQuery for Counted<Q> {
        fn sweep_sphere(&self, start: Vec3, end: Vec3, radius: f32, ignore: Option<ObjectId>) -> Vec<SweepHit> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            self.inner.sweep_sphere(start, end, radius, ignore)
        }

        fn line_trace(&self, start: Vec3, end: Vec3, ignore: Option<ObjectId>) -> Option<SweepHit> {
            self.inner.line_trace(start, end, ignore)
        }
    }

    /// Overhang everywhere: every sweep hits a surface facing straight down.
    struct CeilingQuery;

    impl SpatialQuery for CeilingQuery {
        fn sweep_sphere(&self, start: Vec3, end: Vec3, _: f32, _: Option<ObjectId>) -> Vec<SweepHit> {
            let position = start.lerp(end, 0.5);
            vec![SweepHit::world(0.5, position, position, -UP)]
        }

        fn line_trace(&self, _: Vec3, _: Vec3, _: Option<ObjectId>) -> Option<SweepHit> {
            None
        }
    }

    fn probe() -> CollisionProbe {
        CollisionProbe {
            radius: 10.0,
            acceptable_slope_degrees: 45.0,
            acceptable_distance: 20.0,
            max_slope_iterations: 3,
            step_height: 0.0,
        }
    }

    #[test]
    fn test_open_space_accepts_target() {
        let world = CollisionWorld::new();
        let target = Vec3::new(100.0, 50.0, 0.0);
        let result = check_collision(&world, Vec3::ZERO, target, &probe(), None);
        assert_eq!(result, Resolution::moved(target));
    }

    #[test]
    fn test_flat_floor_is_walkable() {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(0.0, 0.0, -5.0), Vec3::new(500.0, 500.0, 5.0));

        let current = Vec3::new(0.0, 0.0, 15.0);
        let target = Vec3::new(40.0, 0.0, 5.0);
        let result = check_collision(&world, current, target, &probe(), None);

        assert!(result.accepted);
        assert_eq!(result.position, target);
    }

    #[test]
    fn test_wall_slide_runs_along_wall_and_floor() {
        let normal = -Vec3::X;
        let slide = slide_vector(normal, &probe());

        assert!(slide.dot(normal).abs() < 1e-5);
        assert!(slide.z.abs() < 1e-5);
        let expected = 10.0 * 45.0_f32.to_radians().cos();
        assert!((slide.length() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_wall_edge_slides_clear() {
        // Wall only exists for y >= 0; sliding pushes the target past its edge
        let query = WallQuery {
            wall_x: 100.0,
            min_y: 0.0,
        };
        let target = Vec3::new(95.0, 5.0, 0.0);
        let result = check_collision(&query, Vec3::ZERO, target, &probe(), None);

        assert!(result.accepted);
        let offset = result.position - target;
        assert!(offset.x.abs() < 1e-5);
        assert!(offset.z.abs() < 1e-5);
        assert!(result.position.y < 0.0);
        assert!(offset.length() <= probe().acceptable_distance);
    }

    #[test]
    fn test_endless_wall_blocks() {
        let query = WallQuery {
            wall_x: 100.0,
            min_y: f32::NEG_INFINITY,
        };
        let current = Vec3::new(10.0, 0.0, 0.0);
        let result = check_collision(&query, current, Vec3::new(120.0, 0.0, 0.0), &probe(), None);

        assert_eq!(result, Resolution::blocked(current));
    }

    #[test]
    fn test_real_wall_blocks() {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(105.0, 0.0, 0.0), Vec3::new(5.0, 1000.0, 100.0));

        let current = Vec3::new(50.0, 0.0, 0.0);
        let result = check_collision(&world, current, Vec3::new(120.0, 0.0, 0.0), &probe(), None);

        assert!(!result.accepted);
        assert_eq!(result.position, current);
    }

    #[test]
    fn test_steps_onto_low_ledge() {
        let mut world = CollisionWorld::new();
        // Floor top at z=0, ledge top at z=15 starting at x=100
        world.add_box(Vec3::new(0.0, 0.0, -5.0), Vec3::new(500.0, 500.0, 5.0));
        world.add_box(Vec3::new(200.0, 0.0, 7.5), Vec3::new(100.0, 500.0, 7.5));

        let probe = CollisionProbe {
            step_height: 20.0,
            ..probe()
        };
        let current = Vec3::new(80.0, 0.0, 10.5);
        let target = Vec3::new(110.0, 0.0, 10.5);
        let result = check_collision(&world, current, target, &probe, None);

        assert!(result.accepted);
        assert!((result.position.z - 25.0).abs() < 0.1, "landed at {}", result.position.z);
        assert!((result.position.x - 110.0).abs() < 1e-4);
    }

    #[test]
    fn test_tall_wall_is_not_a_step() {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(200.0, 0.0, 100.0), Vec3::new(100.0, 500.0, 100.0));

        let probe = CollisionProbe {
            step_height: 20.0,
            ..probe()
        };
        let current = Vec3::new(80.0, 0.0, 10.5);
        let result = check_collision(&world, current, Vec3::new(110.0, 0.0, 10.5), &probe, None);

        assert_eq!(result, Resolution::blocked(current));
    }

    #[test]
    fn test_iteration_cap_blocks() {
        let query = Counted::new(WallQuery {
            wall_x: 100.0,
            min_y: f32::NEG_INFINITY,
        });
        // Slides never stray far enough to hit the distance limit
        let shape = CollisionProbe {
            acceptable_distance: 1000.0,
            ..probe()
        };
        let current = Vec3::new(10.0, 0.0, 0.0);
        let result = check_collision(&query, current, Vec3::new(120.0, 0.0, 0.0), &shape, None);

        assert_eq!(result, Resolution::blocked(current));
        assert_eq!(query.sweeps(), usize::from(shape.max_slope_iterations) + 1);
    }

    #[test]
    fn test_zero_radius_slide_blocks() {
        let query = Counted::new(WallQuery {
            wall_x: 100.0,
            min_y: f32::NEG_INFINITY,
        });
        let shape = CollisionProbe {
            radius: 0.0,
            ..probe()
        };
        let current = Vec3::new(10.0, 0.0, 0.0);
        let result = check_collision(&query, current, Vec3::new(120.0, 0.0, 0.0), &shape, None);

        assert_eq!(slide_vector(-Vec3::X, &shape), Vec3::ZERO);
        assert_eq!(result, Resolution::blocked(current));
        assert_eq!(query.sweeps(), 1);
    }

    #[test]
    fn test_normal_along_up_blocks() {
        let query = Counted::new(CeilingQuery);
        let current = Vec3::new(0.0, 0.0, 10.0);
        let result = check_collision(&query, current, Vec3::new(30.0, 0.0, 20.0), &probe(), None);

        assert_eq!(slide_vector(-UP, &probe()), Vec3::ZERO);
        assert_eq!(result, Resolution::blocked(current));
        assert_eq!(query.sweeps(), 1);
    }
}
