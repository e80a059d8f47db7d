//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A binary tree of axis-aligned boxes over primitive handles. The tree is
//! built once before rendering and only read afterwards, so any number of
//! threads may traverse it at the same time.

use caustic_math::{Aabb, Ray};

use crate::hit::{Intersection, PrimitiveId};
use crate::primitive::Primitive;

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// BVH node - either a branch with two children or a leaf with primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum BvhNode {
    /// Internal node with two children, split along `axis`.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
        axis: usize,
    },
    /// Leaf node with a small number of primitives.
    Leaf { primitives: Vec<PrimitiveId>, bbox: Aabb },
    /// Empty node (no bounded primitives).
    Empty,
}

impl BvhNode {
    /// Recursive median split: sort by box center along the longest axis
    /// of the combined box, split in half, recurse.
    fn build(mut items: Vec<(PrimitiveId, Aabb)>) -> Self {
        if items.is_empty() {
            return BvhNode::Empty;
        }

        let bbox = items
            .iter()
            .fold(Aabb::EMPTY, |acc, (_, b)| Aabb::surrounding(&acc, b));

        if items.len() <= LEAF_MAX_SIZE {
            return BvhNode::Leaf {
                primitives: items.into_iter().map(|(id, _)| id).collect(),
                bbox,
            };
        }

        let axis = bbox.longest_axis();
        // Stable sort keeps equal centers in input order, so rebuilding
        // from the same list yields the same tree.
        items.sort_by(|(_, a), (_, b)| a.centroid()[axis].total_cmp(&b.centroid()[axis]));

        let right_items = items.split_off(items.len() / 2);
        let left = Self::build(items);
        let right = Self::build(right_items);

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox,
            axis,
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } => *bbox,
            BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    fn depth(&self) -> usize {
        match self {
            BvhNode::Empty | BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn intersect(&self, ray: &Ray, arena: &[Primitive], best: &mut Option<Intersection>) {
        let bbox = match self {
            BvhNode::Empty => return,
            BvhNode::Leaf { bbox, .. } | BvhNode::Branch { bbox, .. } => bbox,
        };
        let Some(span) = bbox.hit(ray) else {
            return;
        };
        if let Some(hit) = best {
            if span.min > hit.t {
                return;
            }
        }

        match self {
            BvhNode::Empty => {}
            BvhNode::Leaf { primitives, .. } => {
                for &id in primitives {
                    if let Some(hit) = arena[id.0].intersect(id, ray, arena) {
                        if best.as_ref().map_or(true, |b| hit.t < b.t) {
                            *best = Some(hit);
                        }
                    }
                }
            }
            BvhNode::Branch { left, right, .. } => {
                left.intersect(ray, arena, best);
                right.intersect(ray, arena, best);
            }
        }
    }

    fn any_hit(&self, ray: &Ray, max_t: f32, arena: &[Primitive]) -> bool {
        match self {
            BvhNode::Empty => false,
            BvhNode::Leaf { primitives, bbox } => {
                if !bbox.hit(ray).is_some_and(|span| span.min <= max_t) {
                    return false;
                }
                primitives.iter().any(|&id| {
                    arena[id.0]
                        .intersect(id, ray, arena)
                        .is_some_and(|hit| hit.t < max_t)
                })
            }
            BvhNode::Branch { left, right, bbox, .. } => {
                if !bbox.hit(ray).is_some_and(|span| span.min <= max_t) {
                    return false;
                }
                left.any_hit(ray, max_t, arena) || right.any_hit(ray, max_t, arena)
            }
        }
    }
}

/// Median-split BVH over the bounded primitives of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Bvh {
    root: BvhNode,
    primitive_count: usize,
}

impl Bvh {
    pub fn build(items: Vec<(PrimitiveId, Aabb)>) -> Self {
        let primitive_count = items.len();
        Self {
            root: BvhNode::build(items),
            primitive_count,
        }
    }

    /// Nearest hit among the indexed primitives.
    pub fn intersect(&self, ray: &Ray, arena: &[Primitive]) -> Option<Intersection> {
        if ray.is_degenerate() {
            return None;
        }
        let mut best = None;
        self.root.intersect(ray, arena, &mut best);
        best
    }

    /// True if any indexed primitive is hit closer than `max_t`.
    pub fn any_hit(&self, ray: &Ray, max_t: f32, arena: &[Primitive]) -> bool {
        !ray.is_degenerate() && self.root.any_hit(ray, max_t, arena)
    }

    pub fn root(&self) -> &BvhNode {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn len(&self) -> usize {
        self.primitive_count
    }

    pub fn is_empty(&self) -> bool {
        self.primitive_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::MaterialId;
    use crate::primitive::Shape;
    use crate::sphere::Sphere;
    use caustic_math::{Mat4, Transform, Vec3};

    fn spheres(n: usize) -> Vec<Primitive> {
        (0..n)
            .map(|i| {
                let center = Vec3::new(i as f32 * 3.0, (i % 3) as f32, -10.0);
                Primitive::new(format!("s{i}"), Shape::Sphere(Sphere), MaterialId(0))
                    .with_transform(Transform::from_matrix(Mat4::from_translation(center)))
            })
            .collect()
    }

    fn build(arena: &[Primitive]) -> Bvh {
        Bvh::build(
            arena
                .iter()
                .enumerate()
                .map(|(i, p)| (PrimitiveId(i), p.local_world_bounds().unwrap()))
                .collect(),
        )
    }

    #[test]
    fn test_bvh_empty() {
        let bvh = Bvh::build(vec![]);
        assert!(matches!(bvh.root(), BvhNode::Empty));
        assert!(bvh.is_empty());
        assert!(bvh.intersect(&Ray::new(Vec3::ZERO, Vec3::Z), &[]).is_none());
    }

    #[test]
    fn test_bvh_single_sphere_is_leaf() {
        let arena = spheres(1);
        let bvh = build(&arena);
        assert!(matches!(bvh.root(), BvhNode::Leaf { .. }));

        let ray = Ray::new(Vec3::new(0.0, 0.0, 0.0), -Vec3::Z);
        let hit = bvh.intersect(&ray, &arena).unwrap();
        assert!((hit.t - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_bvh_splits_large_sets() {
        let arena = spheres(20);
        let bvh = build(&arena);
        match bvh.root() {
            BvhNode::Branch { axis, .. } => assert_eq!(*axis, 0),
            other => panic!("expected branch, got {other:?}"),
        }
        assert!(bvh.depth() > 2);
        assert_eq!(bvh.len(), 20);
    }

    #[test]
    fn test_bvh_nearest_hit_and_any_hit() {
        let arena = spheres(20);
        let bvh = build(&arena);

        // Looking down +x through the row of spheres at y = 0
        let ray = Ray::new(Vec3::new(-5.0, 0.0, -10.0), Vec3::X);
        let hit = bvh.intersect(&ray, &arena).unwrap();
        assert_eq!(hit.primitive, PrimitiveId(0));
        assert!((hit.t - 4.0).abs() < 1e-4);

        assert!(bvh.any_hit(&ray, 10.0, &arena));
        assert!(!bvh.any_hit(&ray, 3.0, &arena));

        let miss = Ray::new(Vec3::new(0.0, 50.0, 0.0), Vec3::Y);
        assert!(bvh.intersect(&miss, &arena).is_none());
    }
}
