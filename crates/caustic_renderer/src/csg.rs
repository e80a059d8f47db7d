//! Constructive solid geometry over closed primitives.
//!
//! A CSG node has no local intersection test. Both operands are flattened
//! into the ordered list of surface crossings along the ray, and the two
//! lists are merged while tracking whether the ray is inside each operand.
//! A crossing is kept wherever the combined inside state flips.

use caustic_math::{Aabb, Ray, RAY_EPSILON};
use serde::{Deserialize, Serialize};

use crate::hit::{Intersection, PrimitiveId};
use crate::primitive::{Primitive, Shape};

/// Deepest CSG nesting accepted by the scene builder.
pub const MAX_CSG_DEPTH: usize = 32;

/// Upper bound on crossings collected from a single operand.
const MAX_CROSSINGS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CsgOp {
    And,
    Or,
    Subtract,
}

impl CsgOp {
    pub fn is_inside(self, left: bool, right: bool) -> bool {
        match self {
            CsgOp::And => left && right,
            CsgOp::Or => left || right,
            CsgOp::Subtract => left && !right,
        }
    }

    /// Conservative world bounds of the combined solid.
    pub fn bounds(self, left: &Aabb, right: &Aabb) -> Aabb {
        match self {
            CsgOp::Or => Aabb::surrounding(left, right),
            CsgOp::And => {
                let overlap = Aabb::intersection(left, right);
                if overlap.is_empty() {
                    Aabb::EMPTY
                } else {
                    overlap
                }
            }
            CsgOp::Subtract => *left,
        }
    }
}

/// Boolean combination of two primitives of the same scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Csg {
    pub op: CsgOp,
    pub left: PrimitiveId,
    pub right: PrimitiveId,
}

impl Csg {
    pub fn new(op: CsgOp, left: PrimitiveId, right: PrimitiveId) -> Self {
        Self { op, left, right }
    }

    /// Nearest crossing of the combined solid.
    ///
    /// The record names the operand primitive that was crossed, so hits
    /// shade with that operand's material.
    pub(crate) fn intersect(&self, ray: &Ray, arena: &[Primitive]) -> Option<Intersection> {
        self.merge(ray, arena, true).into_iter().next()
    }

    /// Every crossing of the combined solid along `ray`, nearest first.
    pub(crate) fn crossings(&self, ray: &Ray, arena: &[Primitive]) -> Vec<Intersection> {
        self.merge(ray, arena, false)
    }

    fn merge(&self, ray: &Ray, arena: &[Primitive], first_only: bool) -> Vec<Intersection> {
        let left = crossings(arena, self.left, ray);
        let right = crossings(arena, self.right, ray);

        match (left.is_empty(), right.is_empty()) {
            (true, true) => return Vec::new(),
            (false, true) => {
                return if self.op == CsgOp::And { Vec::new() } else { left };
            }
            (true, false) => {
                return if self.op == CsgOp::Or { right } else { Vec::new() };
            }
            (false, false) => {}
        }

        // A first crossing that leaves the solid means the origin is inside.
        let mut in_left = ray.direction.dot(left[0].normal) > 0.0;
        let mut in_right = ray.direction.dot(right[0].normal) > 0.0;
        let mut inside = self.op.is_inside(in_left, in_right);

        let mut merged = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < left.len() || j < right.len() {
            let from_left = j >= right.len() || (i < left.len() && left[i].t < right[j].t);
            let crossing = if from_left {
                in_left = !in_left;
                i += 1;
                &left[i - 1]
            } else {
                in_right = !in_right;
                j += 1;
                &right[j - 1]
            };

            let now = self.op.is_inside(in_left, in_right);
            if now == inside {
                continue;
            }
            inside = now;

            let mut hit = crossing.clone();
            // The subtracted operand's surface bounds the result from the other side.
            if !from_left && self.op == CsgOp::Subtract {
                hit.normal = -hit.normal;
            }
            merged.push(hit);
            if first_only {
                break;
            }
        }
        merged
    }
}

/// Ordered crossings of primitive `id` along `ray`.
///
/// CSG nodes recurse into their operands; solids are intersected
/// repeatedly, restarting just past each crossing.
pub(crate) fn crossings(arena: &[Primitive], id: PrimitiveId, ray: &Ray) -> Vec<Intersection> {
    let primitive = &arena[id.0];
    if let Shape::Csg(csg) = primitive.shape() {
        return csg.crossings(ray, arena);
    }

    let mut list = Vec::new();
    let mut offset = 0.0;
    while list.len() < MAX_CROSSINGS {
        let restart = Ray {
            origin: ray.at(offset),
            ..*ray
        };
        let Some(mut hit) = primitive.intersect(id, &restart, arena) else {
            break;
        };
        hit.t += offset;
        offset = hit.t + RAY_EPSILON;
        list.push(hit);
    }
    list
}

/// Depth of the CSG tree rooted at `id`; plain primitives have depth 0.
pub(crate) fn depth(arena: &[Primitive], id: PrimitiveId) -> usize {
    match arena[id.0].shape() {
        Shape::Csg(csg) => 1 + depth(arena, csg.left).max(depth(arena, csg.right)),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::MaterialId;
    use crate::sphere::Sphere;
    use caustic_math::{Mat4, Transform, Vec3};

    fn is_exit(ray: &Ray, normal: Vec3) -> bool {
        ray.direction.dot(normal) > 0.0
    }

    fn sphere_at(x: f32) -> Primitive {
        Primitive::new(format!("s{x}"), Shape::Sphere(Sphere), MaterialId(0))
            .with_transform(Transform::from_matrix(Mat4::from_translation(Vec3::new(x, 0.0, 0.0))))
    }

    fn arena(op: CsgOp) -> Vec<Primitive> {
        vec![
            sphere_at(-0.5),
            sphere_at(0.5),
            Primitive::new("csg", Shape::Csg(Csg::new(op, PrimitiveId(0), PrimitiveId(1))), MaterialId(0)),
        ]
    }

    fn ts(op: CsgOp) -> Vec<f32> {
        let arena = arena(op);
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        crossings(&arena, PrimitiveId(2), &ray).iter().map(|h| h.t).collect()
    }

    fn assert_ts(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-3, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn test_operator_truth_tables() {
        assert!(CsgOp::And.is_inside(true, true));
        assert!(!CsgOp::And.is_inside(true, false));
        assert!(CsgOp::Or.is_inside(false, true));
        assert!(!CsgOp::Or.is_inside(false, false));
        assert!(CsgOp::Subtract.is_inside(true, false));
        assert!(!CsgOp::Subtract.is_inside(true, true));
    }

    #[test]
    fn test_solid_crossings_enter_then_exit() {
        let arena = arena(CsgOp::Or);
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let list = crossings(&arena, PrimitiveId(0), &ray);
        assert_ts(&list.iter().map(|h| h.t).collect::<Vec<_>>(), &[3.5, 5.5]);
        assert!(!is_exit(&ray, list[0].normal));
        assert!(is_exit(&ray, list[1].normal));
    }

    #[test]
    fn test_merge_intervals_per_operator() {
        assert_ts(&ts(CsgOp::And), &[4.5, 5.5]);
        assert_ts(&ts(CsgOp::Or), &[3.5, 6.5]);
        assert_ts(&ts(CsgOp::Subtract), &[3.5, 4.5]);
    }

    #[test]
    fn test_subtract_flips_right_normals() {
        let arena = arena(CsgOp::Subtract);
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let list = crossings(&arena, PrimitiveId(2), &ray);
        assert_eq!(list[1].primitive, PrimitiveId(1));
        assert!(is_exit(&ray, list[1].normal));
    }

    #[test]
    fn test_empty_operand_rules() {
        // Only the left operand is crossed
        let and = arena(CsgOp::And);
        let ray = Ray::new(Vec3::new(-1.2, 5.0, 0.0), -Vec3::Y);
        assert!(crossings(&and, PrimitiveId(1), &ray).is_empty());
        assert!(crossings(&and, PrimitiveId(2), &ray).is_empty());

        let or = arena(CsgOp::Or);
        assert_eq!(crossings(&or, PrimitiveId(2), &ray).len(), 2);
        let sub = arena(CsgOp::Subtract);
        assert_eq!(crossings(&sub, PrimitiveId(2), &ray).len(), 2);

        // Only the right operand is crossed
        let ray = Ray::new(Vec3::new(1.2, 5.0, 0.0), -Vec3::Y);
        assert_eq!(crossings(&or, PrimitiveId(2), &ray).len(), 2);
        assert!(crossings(&sub, PrimitiveId(2), &ray).is_empty());
    }

    #[test]
    fn test_origin_inside_operand() {
        let arena = arena(CsgOp::And);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let list = crossings(&arena, PrimitiveId(2), &ray);
        assert_ts(&list.iter().map(|h| h.t).collect::<Vec<_>>(), &[0.5]);
        assert!(is_exit(&ray, list[0].normal));
    }

    #[test]
    fn test_nested_depth_and_crossings() {
        let mut arena = arena(CsgOp::Or);
        arena.push(sphere_at(3.0));
        arena.push(Primitive::new(
            "outer",
            Shape::Csg(Csg::new(CsgOp::Subtract, PrimitiveId(2), PrimitiveId(3))),
            MaterialId(0),
        ));
        assert_eq!(depth(&arena, PrimitiveId(4)), 2);
        assert_eq!(depth(&arena, PrimitiveId(0)), 0);

        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let list = crossings(&arena, PrimitiveId(4), &ray);
        // Union spans [-1.5, 1.5]; subtracting the sphere on [2, 4] leaves it whole
        assert_ts(&list.iter().map(|h| h.t).collect::<Vec<_>>(), &[3.5, 6.5]);
    }

    #[test]
    fn test_bounds_per_operator() {
        let a = Aabb::from_points(Vec3::ZERO, Vec3::splat(2.0));
        let b = Aabb::from_points(Vec3::splat(1.0), Vec3::splat(3.0));
        assert_eq!(CsgOp::Or.bounds(&a, &b).max, Vec3::splat(3.0));
        assert_eq!(CsgOp::And.bounds(&a, &b).min, Vec3::splat(1.0));
        assert_eq!(CsgOp::Subtract.bounds(&a, &b), a);

        let far = Aabb::from_points(Vec3::splat(10.0), Vec3::splat(11.0));
        assert!(CsgOp::And.bounds(&a, &far).is_empty());
    }
}
