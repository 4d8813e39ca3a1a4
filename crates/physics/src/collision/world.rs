//! Static collision world.
//!
//! Holds the level geometry the simulation sweeps against and answers
//! [`SpatialQuery`] calls with parry3d contact and ray queries.

use glam::Vec3;
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::query::{contact, Contact, Ray, RayCast};
use parry3d::shape::SharedShape;

use super::trace::SweepHit;
use super::{ObjectId, SpatialQuery};
use crate::UP;

/// Sweeps shorter than this are treated as an overlap test at the start.
const MIN_SWEEP_DISTANCE: f32 = 1e-4;

/// Bisection passes used to refine the first contact.
/// 12 passes gives ~0.025% precision along the path.
const REFINE_ITERATIONS: usize = 12;

/// A piece of static geometry.
#[derive(Debug, Clone)]
pub struct CollisionBrush {
    /// Unique identifier for this brush.
    pub id: u32,
    /// The collision shape.
    pub shape: SharedShape,
    /// Position and orientation in world space.
    pub transform: Isometry<Real>,
    /// Host object this geometry belongs to, if any.
    pub owner: Option<ObjectId>,
}

/// The collision world containing all static geometry.
///
/// # Thread Safety
///
/// The world is immutable once handed to a simulation and can be shared
/// behind an `Arc` between the simulation thread and the host.
#[derive(Debug, Default)]
pub struct CollisionWorld {
    brushes: Vec<CollisionBrush>,
    next_id: u32,
}

impl CollisionWorld {
    /// Create an empty collision world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis-aligned box of world geometry.
    ///
    /// # Arguments
    ///
    /// * `center` - Center position of the box in world space
    /// * `half_extents` - Half-size in each axis (x, y, z)
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3) -> u32 {
        self.push_box(center, half_extents, None)
    }

    /// Add an axis-aligned box that belongs to a host object.
    ///
    /// Sweeps issued on behalf of `owner` pass straight through it.
    pub fn add_owned_box(&mut self, center: Vec3, half_extents: Vec3, owner: ObjectId) -> u32 {
        self.push_box(center, half_extents, Some(owner))
    }

    /// Add a convex hull of world geometry.
    ///
    /// Returns `None` if the hull couldn't be computed (degenerate input).
    pub fn add_convex_hull(&mut self, points: &[Vec3]) -> Option<u32> {
        let parry_points: Vec<Point<Real>> =
            points.iter().map(|p| Point::new(p.x, p.y, p.z)).collect();

        let shape = SharedShape::convex_hull(&parry_points)?;
        Some(self.push(shape, Isometry::identity(), None))
    }

    /// Remove every brush owned by `owner`.
    pub fn remove_owned(&mut self, owner: ObjectId) -> usize {
        let before = self.brushes.len();
        self.brushes.retain(|brush| brush.owner != Some(owner));
        before - self.brushes.len()
    }

    /// Remove all collision geometry.
    pub fn clear(&mut self) {
        self.brushes.clear();
    }

    /// Get the number of collision brushes.
    pub fn brush_count(&self) -> usize {
        self.brushes.len()
    }

    fn push_box(&mut self, center: Vec3, half_extents: Vec3, owner: Option<ObjectId>) -> u32 {
        let shape = SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z);
        let transform = Isometry::translation(center.x, center.y, center.z);
        self.push(shape, transform, owner)
    }

    fn push(&mut self, shape: SharedShape, transform: Isometry<Real>, owner: Option<ObjectId>) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        self.brushes.push(CollisionBrush {
            id,
            shape,
            transform,
            owner,
        });

        id
    }

    fn candidates(&self, ignore: Option<ObjectId>) -> impl Iterator<Item = &CollisionBrush> {
        self.brushes
            .iter()
            .filter(move |brush| ignore.is_none() || brush.owner != ignore)
    }

    /// Contact between a probe at `position` and one brush, if they touch.
    fn probe_contact(&self, probe: &SharedShape, position: Vec3, brush: &CollisionBrush) -> Option<Contact> {
        let probe_transform = Isometry::translation(position.x, position.y, position.z);

        match contact(
            &probe_transform,
            probe.as_ref(),
            &brush.transform,
            brush.shape.as_ref(),
            0.0,
        ) {
            Ok(found) => found,
            Err(_) => None,
        }
    }

    /// Sweep a probe against a single brush.
    ///
    /// The path is marched in steps no longer than half the probe radius so
    /// thin geometry is not skipped, then the first overlapping step is
    /// refined by bisection.
    fn sweep_brush(
        &self,
        probe: &SharedShape,
        radius: f32,
        start: Vec3,
        end: Vec3,
        brush: &CollisionBrush,
    ) -> Option<SweepHit> {
        let delta = end - start;
        let distance = delta.length();

        if distance < MIN_SWEEP_DISTANCE {
            let touching = self.probe_contact(probe, start, brush)?;
            return Some(make_hit(0.0, start, &touching, brush));
        }

        let step = (radius * 0.5).max(MIN_SWEEP_DISTANCE);
        let samples = (distance / step).ceil().max(1.0) as usize;

        let mut lo = 0.0_f32;
        let mut hi = None;
        for i in 0..=samples {
            let t = i as f32 / samples as f32;
            if self.probe_contact(probe, start + delta * t, brush).is_some() {
                hi = Some(t);
                break;
            }
            lo = t;
        }

        let mut hi = hi?;
        if hi == 0.0 {
            let touching = self.probe_contact(probe, start, brush)?;
            return Some(make_hit(0.0, start, &touching, brush));
        }

        for _ in 0..REFINE_ITERATIONS {
            let mid = (lo + hi) * 0.5;
            if self.probe_contact(probe, start + delta * mid, brush).is_some() {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let touching = self.probe_contact(probe, start + delta * hi, brush)?;
        Some(make_hit(lo, start + delta * lo, &touching, brush))
    }
}

impl SpatialQuery for CollisionWorld {
    fn sweep_sphere(
        &self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        ignore: Option<ObjectId>,
    ) -> Vec<SweepHit> {
        let probe = SharedShape::ball(radius.max(MIN_SWEEP_DISTANCE));

        let mut hits: Vec<SweepHit> = self
            .candidates(ignore)
            .filter_map(|brush| self.sweep_brush(&probe, radius, start, end, brush))
            .collect();

        hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
        hits
    }

    fn line_trace(&self, start: Vec3, end: Vec3, ignore: Option<ObjectId>) -> Option<SweepHit> {
        let delta = end - start;
        let max_distance = delta.length();
        if max_distance < MIN_SWEEP_DISTANCE {
            return None;
        }
        let dir = delta / max_distance;

        let ray = Ray::new(
            Point::new(start.x, start.y, start.z),
            Vector::new(dir.x, dir.y, dir.z),
        );

        let mut closest: Option<(Real, &CollisionBrush)> = None;
        for brush in self.candidates(ignore) {
            if let Some(toi) = brush.shape.cast_ray(&brush.transform, &ray, max_distance, true) {
                if closest.map_or(true, |(best, _)| toi < best) {
                    closest = Some((toi, brush));
                }
            }
        }

        let (toi, brush) = closest?;
        let point = ray.point_at(toi);
        let impact_point = Vec3::new(point.x, point.y, point.z);

        let impact_normal = brush
            .shape
            .cast_ray_and_get_normal(&brush.transform, &ray, toi + 0.01, true)
            .map(|hit| Vec3::new(hit.normal.x, hit.normal.y, hit.normal.z))
            .unwrap_or(-dir);

        Some(SweepHit {
            fraction: toi / max_distance,
            position: impact_point,
            impact_point,
            impact_normal,
            object: brush.owner,
        })
    }
}

fn make_hit(fraction: f32, position: Vec3, touching: &Contact, brush: &CollisionBrush) -> SweepHit {
    let normal = Vec3::new(touching.normal2.x, touching.normal2.y, touching.normal2.z);
    let impact_normal = if normal.length_squared() > 1e-6 {
        normal.normalize()
    } else {
        UP
    };

    SweepHit {
        fraction,
        position,
        impact_point: Vec3::new(touching.point2.x, touching.point2.y, touching.point2.z),
        impact_normal,
        object: brush.owner,
    }
}
