//! Capability shared by every analytic shape.
//!
//! Shapes live in their own canonical frame (unit sphere, unit cube, ...);
//! placement, scale and orientation come from the owning primitive's
//! transform.

use caustic_math::{Aabb, Ray};

use crate::hit::LocalHit;

pub trait LocalShape {
    /// Nearest crossing with `t > RAY_EPSILON` along a local-space ray.
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit>;

    /// Local bounds, or `None` for unbounded shapes.
    fn local_bounds(&self) -> Option<Aabb>;

    /// True for shapes that enclose a volume and may be CSG operands.
    fn is_closed(&self) -> bool;
}

/// Real roots of `a t^2 + b t + c = 0` in ascending order. A vanishing `a`
/// degrades to the linear root, returned twice.
pub(crate) fn solve_quadratic(a: f32, b: f32, c: f32) -> Option<(f32, f32)> {
    if a.abs() < 1e-12 {
        if b.abs() < 1e-12 {
            return None;
        }
        let t = -c / b;
        return Some((t, t));
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_d = disc.sqrt();
    // Numerically stable form
    let q = if b < 0.0 { -0.5 * (b - sqrt_d) } else { -0.5 * (b + sqrt_d) };
    let (mut t0, mut t1) = if q == 0.0 { (0.0, 0.0) } else { (q / a, c / q) };
    if t0 > t1 {
        std::mem::swap(&mut t0, &mut t1);
    }
    Some((t0, t1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_quadratic() {
        // (t - 1)(t - 3)
        let (t0, t1) = solve_quadratic(1.0, -4.0, 3.0).unwrap();
        assert!((t0 - 1.0).abs() < 1e-6);
        assert!((t1 - 3.0).abs() < 1e-6);

        assert!(solve_quadratic(1.0, 0.0, 1.0).is_none());

        // Linear fallback: 2t - 4 = 0
        let (t0, t1) = solve_quadratic(0.0, 2.0, -4.0).unwrap();
        assert_eq!((t0, t1), (2.0, 2.0));
    }
}
