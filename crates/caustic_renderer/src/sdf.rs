//! Implicit surfaces intersected by sphere tracing.
//!
//! A field returns a lower bound on the distance to its surface (negative
//! inside). Marching steps by that bound, so it never crosses the surface,
//! and stops once the bound drops below [`MARCH_EPSILON`].

use caustic_math::{Aabb, Ray, Vec3, RAY_EPSILON};

use crate::hit::LocalHit;
use crate::shape::LocalShape;

/// Distance at which the march counts as touching the surface.
pub const MARCH_EPSILON: f32 = 1e-3;

const MAX_MARCH_STEPS: usize = 512;

/// Blend radius of the polynomial smooth minimum between metaballs.
const DEFAULT_BLEND: f32 = 0.7;

pub trait DistanceField {
    /// Signed distance bound at `p`, negative inside.
    fn distance(&self, p: Vec3) -> f32;

    /// Box enclosing the zero set.
    fn field_bounds(&self) -> Aabb;

    /// Outward normal from the central-difference gradient.
    fn gradient_normal(&self, p: Vec3) -> Vec3 {
        let h = MARCH_EPSILON;
        let axis = |e: Vec3| self.distance(p + e * h) - self.distance(p - e * h);
        Vec3::new(axis(Vec3::X), axis(Vec3::Y), axis(Vec3::Z)).normalize_or_zero()
    }
}

/// Nearest zero crossing of `field` along a unit-direction local ray.
///
/// A ray that starts on the surface first has to move off it, so restarting
/// just past a crossing finds the next one instead of the same one again.
pub(crate) fn sphere_trace<F: DistanceField + ?Sized>(field: &F, ray: &Ray) -> Option<LocalHit> {
    let span = field.field_bounds().padded().hit(ray)?;
    let mut t = span.min.max(0.0);
    let mut departed = field.distance(ray.at(t)).abs() >= MARCH_EPSILON;

    for _ in 0..MAX_MARCH_STEPS {
        if t > span.max {
            return None;
        }
        let p = ray.at(t);
        let d = field.distance(p).abs();
        if d < MARCH_EPSILON {
            if departed && t > RAY_EPSILON {
                let n = field.gradient_normal(p);
                return (n != Vec3::ZERO).then(|| LocalHit::new(t, n));
            }
            t += MARCH_EPSILON;
            continue;
        }
        departed = true;
        t += d;
    }
    None
}

/// `(p, q)`-style torus knot: a tube of radius `tube` wound around a ring
/// of radius `radius` in the local XZ plane. Strands sit `offset` above and
/// below the ring and twist `twist` times per revolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorusKnot {
    pub radius: f32,
    pub tube: f32,
    pub offset: f32,
    pub twist: f32,
}

impl TorusKnot {
    pub fn new(radius: f32, tube: f32, offset: f32, twist: f32) -> Self {
        Self {
            radius,
            tube,
            offset,
            twist,
        }
    }
}

impl DistanceField for TorusKnot {
    fn distance(&self, p: Vec3) -> f32 {
        let phi = p.x.atan2(p.z) * self.twist;
        let (sin, cos) = phi.sin_cos();
        let r = (p.x * p.x + p.z * p.z).sqrt() - self.radius;
        let across = cos * r - sin * p.y;
        let along = (sin * r + cos * p.y).abs() - self.offset;
        // The twist stretches space, halve the bound to stay conservative
        ((along * along + across * across).sqrt() - self.tube) * 0.5
    }

    fn field_bounds(&self) -> Aabb {
        let reach = self.offset + 2.0 * self.tube;
        let ring = self.radius + reach;
        Aabb::new(Vec3::new(-ring, -reach, -ring), Vec3::new(ring, reach, ring))
    }
}

impl LocalShape for TorusKnot {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        sphere_trace(self, ray)
    }

    fn local_bounds(&self) -> Option<Aabb> {
        Some(self.field_bounds())
    }

    fn is_closed(&self) -> bool {
        true
    }
}

/// Balls of a common radius fused with a polynomial smooth minimum.
#[derive(Debug, Clone, PartialEq)]
pub struct Metaball {
    pub centers: Vec<Vec3>,
    pub radius: f32,
    pub blend: f32,
}

impl Metaball {
    pub fn new(radius: f32) -> Self {
        Self {
            centers: Vec::new(),
            radius,
            blend: DEFAULT_BLEND,
        }
    }

    pub fn with_ball(mut self, center: Vec3) -> Self {
        self.centers.push(center);
        self
    }

    pub fn with_blend(mut self, blend: f32) -> Self {
        self.blend = blend.max(0.0);
        self
    }
}

/// Polynomial smooth minimum; undershoots `min(a, b)` by at most `k / 4`.
fn smooth_min(a: f32, b: f32, k: f32) -> f32 {
    if k <= 0.0 {
        return a.min(b);
    }
    let h = (0.5 + (a - b) / (2.0 * k)).clamp(0.0, 1.0);
    a * (1.0 - h) + b * h - k * h * (1.0 - h)
}

impl DistanceField for Metaball {
    fn distance(&self, p: Vec3) -> f32 {
        self.centers
            .iter()
            .map(|c| p.distance(*c) - self.radius)
            .reduce(|acc, d| smooth_min(acc, d, self.blend))
            .unwrap_or(f32::INFINITY)
    }

    fn field_bounds(&self) -> Aabb {
        // Every blend can pull the surface out by up to blend / 4
        let reach = self.radius + self.centers.len() as f32 * self.blend * 0.25;
        self.centers
            .iter()
            .fold(Aabb::EMPTY, |acc, c| acc.grow(*c - Vec3::splat(reach)).grow(*c + Vec3::splat(reach)))
    }
}

impl LocalShape for Metaball {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        if self.centers.is_empty() {
            return None;
        }
        sphere_trace(self, ray)
    }

    fn local_bounds(&self) -> Option<Aabb> {
        (!self.centers.is_empty()).then(|| self.field_bounds())
    }

    fn is_closed(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knot() -> TorusKnot {
        TorusKnot::new(1.0, 0.2, 0.4, 1.5)
    }

    #[test]
    fn test_knot_hit_from_above() {
        // Straight down through a strand at phi = 0
        let ray = Ray::new(Vec3::new(0.0, 5.0, 1.0), -Vec3::Y);
        let hit = knot().intersect_local(&ray).expect("strand below");
        assert!((hit.t - (5.0 - 0.6)).abs() < 5e-3, "t = {}", hit.t);
        assert!((hit.normal - Vec3::Y).length() < 1e-2);
    }

    #[test]
    fn test_knot_exit_from_inside_tube() {
        let ray = Ray::new(Vec3::new(0.0, 0.4, 1.0), Vec3::Y);
        let hit = knot().intersect_local(&ray).expect("tube wall");
        assert!((hit.t - 0.2).abs() < 5e-3);
        assert!(hit.normal.dot(ray.direction) > 0.0);
    }

    #[test]
    fn test_knot_miss_through_hole() {
        let ray = Ray::new(Vec3::new(0.0, 5.0, 0.0), -Vec3::Y);
        assert!(knot().intersect_local(&ray).is_none());
    }

    #[test]
    fn test_metaballs_fuse_between_centres() {
        let blob = Metaball::new(0.5)
            .with_ball(Vec3::new(-0.5, 0.0, 0.0))
            .with_ball(Vec3::new(0.5, 0.0, 0.0));
        // Without blending the balls only touch at the origin
        let expected = 0.675f32.powi(2) - 0.25;
        let ray = Ray::new(Vec3::new(0.0, 5.0, 0.0), -Vec3::Y);
        let hit = blob.intersect_local(&ray).expect("fused neck");
        assert!((hit.t - (5.0 - expected.sqrt())).abs() < 1e-2, "t = {}", hit.t);
        assert!((hit.normal - Vec3::Y).length() < 1e-2);
    }

    #[test]
    fn test_restart_past_crossing_finds_far_side() {
        let blob = Metaball::new(1.0).with_ball(Vec3::ZERO);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let near = blob.intersect_local(&ray).unwrap();
        assert!((near.t - 4.0).abs() < 5e-3);

        let restart = Ray::new(ray.at(near.t + RAY_EPSILON), Vec3::Z);
        let far = restart.origin.z + blob.intersect_local(&restart).unwrap().t;
        assert!((far - 1.0).abs() < 5e-3);
    }

    #[test]
    fn test_empty_metaball_is_unbounded_and_never_hit() {
        let blob = Metaball::new(1.0);
        assert!(blob.local_bounds().is_none());
        assert!(blob.intersect_local(&Ray::new(Vec3::ZERO, Vec3::X)).is_none());
    }
}
