//! Flat shapes in the local `z = 0` plane.

use caustic_math::{Aabb, Mat3, Ray, Vec2, Vec3, RAY_EPSILON};

use crate::hit::LocalHit;
use crate::shape::LocalShape;

fn plane_hit(ray: &Ray) -> Option<(f32, Vec3)> {
    if ray.direction.z.abs() < 1e-12 {
        return None;
    }
    let t = -ray.origin.z / ray.direction.z;
    if t <= RAY_EPSILON {
        return None;
    }
    Some((t, ray.at(t)))
}

/// Unit square `[-0.5, 0.5]^2` with normal `+z`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Square;

impl LocalShape for Square {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        let (t, p) = plane_hit(ray)?;
        if p.x.abs() > 0.5 || p.y.abs() > 0.5 {
            return None;
        }
        Some(
            LocalHit::new(t, Vec3::Z)
                .with_uv(Vec2::new(p.x + 0.5, p.y + 0.5))
                .with_tbn(Mat3::IDENTITY),
        )
    }

    fn local_bounds(&self) -> Option<Aabb> {
        Some(Aabb::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::new(0.5, 0.5, 0.0)).padded())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// Infinite plane `z = 0`, normal `+z`. Texture coordinates tile per unit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Plane;

impl LocalShape for Plane {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        let (t, p) = plane_hit(ray)?;
        Some(
            LocalHit::new(t, Vec3::Z)
                .with_uv(Vec2::new(p.x.rem_euclid(1.0), p.y.rem_euclid(1.0)))
                .with_tbn(Mat3::IDENTITY),
        )
    }

    fn local_bounds(&self) -> Option<Aabb> {
        None
    }

    fn is_closed(&self) -> bool {
        false
    }
}
