//! Sphere primitives: the canonical unit sphere and a sphere moving through
//! the camera shutter.

use caustic_math::{Aabb, Mat3, Ray, Vec2, Vec3, RAY_EPSILON};
use std::f32::consts::PI;

use crate::hit::LocalHit;
use crate::shape::{solve_quadratic, LocalShape};

/// Unit sphere centred at the local origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sphere;

impl Sphere {
    /// Spherical texture coordinates for a point on the unit sphere.
    fn sphere_uv(p: Vec3) -> Vec2 {
        let u = (p.y.atan2(p.x) + PI) / (2.0 * PI);
        let v = p.z.clamp(-1.0, 1.0).asin() / PI + 0.5;
        Vec2::new(u, v)
    }

    fn sphere_tbn(n: Vec3) -> Mat3 {
        let tangent = Vec3::new(-n.y, n.x, 0.0);
        let tangent = if tangent.length_squared() < 1e-12 {
            Vec3::X
        } else {
            tangent.normalize()
        };
        Mat3::from_cols(tangent, n.cross(tangent), n)
    }
}

impl LocalShape for Sphere {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        let v = -ray.origin;
        let b = v.dot(ray.direction);
        let disc = b * b - v.dot(v) + 1.0;
        if disc < 0.0 {
            return None;
        }
        let sqrt_d = disc.sqrt();
        let t_far = b + sqrt_d;
        if t_far <= RAY_EPSILON {
            return None;
        }
        let t_near = b - sqrt_d;
        let t = if t_near > RAY_EPSILON { t_near } else { t_far };

        let n = ray.at(t).normalize_or_zero();
        Some(
            LocalHit::new(t, n)
                .with_uv(Self::sphere_uv(n))
                .with_tbn(Self::sphere_tbn(n)),
        )
    }

    fn local_bounds(&self) -> Option<Aabb> {
        Some(Aabb::new(Vec3::splat(-1.0), Vec3::ONE))
    }

    fn is_closed(&self) -> bool {
        true
    }
}

/// Sphere whose centre travels linearly between two positions over a time
/// range. Ray time outside the range clamps to the nearest end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingSphere {
    pub center0: Vec3,
    pub center1: Vec3,
    pub radius: f32,
    pub time0: f32,
    pub time1: f32,
}

impl MovingSphere {
    pub fn new(center0: Vec3, center1: Vec3, radius: f32, time0: f32, time1: f32) -> Self {
        Self {
            center0,
            center1,
            radius: radius.max(0.0),
            time0,
            time1,
        }
    }

    pub fn center(&self, time: f32) -> Vec3 {
        let span = self.time1 - self.time0;
        let s = if span.abs() < f32::EPSILON {
            0.0
        } else {
            ((time - self.time0) / span).clamp(0.0, 1.0)
        };
        self.center0 + (self.center1 - self.center0) * s
    }
}

impl LocalShape for MovingSphere {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        let center = self.center(ray.time);
        let oc = ray.origin - center;
        let b = 2.0 * oc.dot(ray.direction);
        let c = oc.length_squared() - self.radius * self.radius;
        let (t0, t1) = solve_quadratic(1.0, b, c)?;
        let t = if t0 > RAY_EPSILON {
            t0
        } else if t1 > RAY_EPSILON {
            t1
        } else {
            return None;
        };

        let n = (ray.at(t) - center) / self.radius;
        Some(LocalHit::new(t, n).with_uv(Sphere::sphere_uv(n.normalize_or_zero())))
    }

    fn local_bounds(&self) -> Option<Aabb> {
        // Treated as unbounded; its extent depends on the shutter interval.
        None
    }

    fn is_closed(&self) -> bool {
        false
    }
}
