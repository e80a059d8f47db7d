//! Axis-aligned unit cube `[-0.5, 0.5]^3`.

use caustic_math::{Aabb, Ray, Vec2, Vec3, RAY_EPSILON};

use crate::hit::LocalHit;
use crate::shape::LocalShape;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cuboid;

impl Cuboid {
    const BOUNDS: Aabb = Aabb {
        min: Vec3::splat(-0.5),
        max: Vec3::splat(0.5),
    };
}

impl LocalShape for Cuboid {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        let span = Self::BOUNDS.hit(ray)?;
        let t = if span.min > RAY_EPSILON {
            span.min
        } else if span.max > RAY_EPSILON {
            span.max
        } else {
            return None;
        };

        // The face is the one whose coordinate is largest in magnitude.
        let p = ray.at(t);
        let a = p.abs();
        let axis = if a.x >= a.y && a.x >= a.z {
            0
        } else if a.y >= a.z {
            1
        } else {
            2
        };
        let mut normal = Vec3::ZERO;
        normal[axis] = p[axis].signum();

        let (u, v) = match axis {
            0 => (p.y, p.z),
            1 => (p.z, p.x),
            _ => (p.x, p.y),
        };
        Some(LocalHit::new(t, normal).with_uv(Vec2::new(u + 0.5, v + 0.5)))
    }

    fn local_bounds(&self) -> Option<Aabb> {
        Some(Self::BOUNDS)
    }

    fn is_closed(&self) -> bool {
        true
    }
}
