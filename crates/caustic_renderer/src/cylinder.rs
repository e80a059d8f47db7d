//! Surfaces of revolution around the local `z` axis.
//!
//! A [`Cylinder`] has radius 1 and spans `z` in `[0, 1]`. A [`Cone`] spans
//! `z` in `[0, height]` with independent radii at the two ends. Both may be
//! capped with flat disks; only capped variants are closed solids.

use caustic_math::{Aabb, Ray, Vec2, Vec3, RAY_EPSILON};
use std::f32::consts::PI;

use crate::hit::LocalHit;
use crate::shape::{solve_quadratic, LocalShape};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    pub capped: bool,
}

impl Cylinder {
    pub fn new(capped: bool) -> Self {
        Self { capped }
    }
}

impl Default for Cylinder {
    fn default() -> Self {
        Self { capped: true }
    }
}

impl LocalShape for Cylinder {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        intersect_frustum(ray, 1.0, 1.0, 1.0, self.capped)
    }

    fn local_bounds(&self) -> Option<Aabb> {
        Some(Aabb::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::ONE))
    }

    fn is_closed(&self) -> bool {
        self.capped
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cone {
    pub height: f32,
    pub bottom_radius: f32,
    pub top_radius: f32,
    pub capped: bool,
}

impl Cone {
    pub fn new(height: f32, bottom_radius: f32, top_radius: f32, capped: bool) -> Self {
        Self {
            height: height.max(f32::EPSILON),
            bottom_radius: bottom_radius.max(0.0),
            top_radius: top_radius.max(0.0),
            capped,
        }
    }
}

impl Default for Cone {
    fn default() -> Self {
        Self::new(1.0, 1.0, 0.0, true)
    }
}

impl LocalShape for Cone {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        intersect_frustum(ray, self.bottom_radius, self.top_radius, self.height, self.capped)
    }

    fn local_bounds(&self) -> Option<Aabb> {
        let r = self.bottom_radius.max(self.top_radius);
        Some(Aabb::new(Vec3::new(-r, -r, 0.0), Vec3::new(r, r, self.height)))
    }

    fn is_closed(&self) -> bool {
        self.capped
    }
}

/// Nearest hit on a capped or open conical frustum around `z`.
fn intersect_frustum(ray: &Ray, r0: f32, r1: f32, height: f32, capped: bool) -> Option<LocalHit> {
    let (o, d) = (ray.origin, ray.direction);
    let k = (r1 - r0) / height;
    let radius_at = |z: f32| r0 + k * z;

    let mut best: Option<LocalHit> = None;
    let mut consider = |hit: LocalHit| {
        if best.as_ref().map_or(true, |b| hit.t < b.t) {
            best = Some(hit);
        }
    };

    // Lateral surface: x^2 + y^2 = (r0 + k z)^2
    let ro = radius_at(o.z);
    let a = d.x * d.x + d.y * d.y - k * k * d.z * d.z;
    let b = 2.0 * (o.x * d.x + o.y * d.y - k * d.z * ro);
    let c = o.x * o.x + o.y * o.y - ro * ro;
    if let Some((t0, t1)) = solve_quadratic(a, b, c) {
        for t in [t0, t1] {
            if t <= RAY_EPSILON {
                continue;
            }
            let p = ray.at(t);
            if p.z < 0.0 || p.z > height {
                continue;
            }
            let normal = Vec3::new(p.x, p.y, -k * radius_at(p.z));
            let u = (p.y.atan2(p.x) + PI) / (2.0 * PI);
            consider(LocalHit::new(t, normal.normalize_or_zero()).with_uv(Vec2::new(u, p.z / height)));
            break;
        }
    }

    if capped && d.z.abs() > 1e-12 {
        for (z, r, nz) in [(0.0, r0, -1.0), (height, r1, 1.0)] {
            if r <= 0.0 {
                continue;
            }
            let t = (z - o.z) / d.z;
            if t <= RAY_EPSILON {
                continue;
            }
            let p = ray.at(t);
            if p.x * p.x + p.y * p.y <= r * r {
                let uv = Vec2::new(p.x / (2.0 * r) + 0.5, p.y / (2.0 * r) + 0.5);
                consider(LocalHit::new(t, Vec3::new(0.0, 0.0, nz)).with_uv(uv));
            }
        }
    }

    best
}
