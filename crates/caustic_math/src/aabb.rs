use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box used by the BVH and by primitive bounds.
///
/// Once computed from real geometry `min <= max` holds componentwise. The
/// [`Aabb::EMPTY`] box (inverted infinities) is the identity for
/// [`Aabb::surrounding`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Minimum thickness enforced by [`Aabb::padded`].
    const MIN_EXTENT: f32 = 1e-4;

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from two arbitrary corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every point of the iterator.
    pub fn from_iter_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points
            .into_iter()
            .fold(Aabb::EMPTY, |acc, p| acc.grow(p))
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(a: &Aabb, b: &Aabb) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Overlap of two boxes. May be empty.
    pub fn intersection(a: &Aabb, b: &Aabb) -> Self {
        Self {
            min: a.min.max(b.min),
            max: a.max.min(b.max),
        }
    }

    pub fn grow(&self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Returns a copy with every degenerate axis widened to a minimum thickness.
    pub fn padded(&self) -> Self {
        let mut out = *self;
        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            if slab.size() < Self::MIN_EXTENT {
                let widened = slab.expand(Self::MIN_EXTENT);
                out.min[axis] = widened.min;
                out.max[axis] = widened.max;
            }
        }
        out
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, axis: usize) -> Interval {
        Interval::new(self.min[axis], self.max[axis])
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The eight corners, in `x`-fastest order.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Slab test (Kay/Kajiya).
    ///
    /// Returns the entry and exit distances along the ray, or `None` if the
    /// ray misses the box or the box lies entirely behind the origin. The
    /// entry distance is negative when the origin is inside the box.
    pub fn hit(&self, ray: &Ray) -> Option<Interval> {
        let mut t = Interval::UNIVERSE;

        for axis in 0..3 {
            let d = ray.direction[axis];
            let o = ray.origin[axis];
            let slab = self.axis_interval(axis);

            // Parallel to this slab: either always inside it or never.
            if d == 0.0 {
                if !slab.contains(o) {
                    return None;
                }
                continue;
            }

            let t0 = (slab.min - o) / d;
            let t1 = (slab.max - o) / d;
            t = t.intersection(&Interval::new(t0.min(t1), t0.max(t1)));
            if t.is_empty() || t.max < 0.0 {
                return None;
            }
        }

        Some(t)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn test_aabb_from_points_orders_corners() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 5.0), Vec3::new(0.0, 10.0, -5.0));
        assert_eq!(aabb.min, Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(aabb.max, Vec3::new(10.0, 10.0, 5.0));
    }

    #[test]
    fn test_aabb_surrounding_and_empty_identity() {
        let a = Aabb::from_points(Vec3::ZERO, Vec3::splat(5.0));
        let b = Aabb::from_points(Vec3::splat(3.0), Vec3::splat(10.0));
        let s = Aabb::surrounding(&a, &b);
        assert_eq!(s.min, Vec3::ZERO);
        assert_eq!(s.max, Vec3::splat(10.0));

        assert_eq!(Aabb::surrounding(&Aabb::EMPTY, &a), a);
        assert!(Aabb::EMPTY.is_empty());
    }

    #[test]
    fn test_aabb_hit_entry_exit() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let t = unit_box().hit(&ray).expect("ray should hit");
        assert!((t.min - 4.0).abs() < 1e-5);
        assert!((t.max - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_aabb_hit_misses() {
        // Pointing away
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), -Vec3::Z);
        assert!(unit_box().hit(&ray).is_none());

        // Parallel, outside the x slab
        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::Z);
        assert!(unit_box().hit(&ray).is_none());
    }

    #[test]
    fn test_aabb_hit_from_inside() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let t = unit_box().hit(&ray).expect("origin is inside");
        assert!(t.min < 0.0);
        assert!((t.max - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_aabb_padded_flat_box_is_hit() {
        let flat = Aabb::from_points(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)).padded();
        assert!(flat.extent().z > 0.0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), -Vec3::Z);
        assert!(flat.hit(&ray).is_some());
    }

    #[test]
    fn test_aabb_longest_axis() {
        assert_eq!(Aabb::from_points(Vec3::ZERO, Vec3::new(10.0, 1.0, 1.0)).longest_axis(), 0);
        assert_eq!(Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 10.0, 1.0)).longest_axis(), 1);
        assert_eq!(Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 1.0, 10.0)).longest_axis(), 2);
    }

    #[test]
    fn test_aabb_intersection() {
        let a = Aabb::from_points(Vec3::ZERO, Vec3::splat(2.0));
        let b = Aabb::from_points(Vec3::splat(1.0), Vec3::splat(3.0));
        let i = Aabb::intersection(&a, &b);
        assert_eq!(i.min, Vec3::splat(1.0));
        assert_eq!(i.max, Vec3::splat(2.0));
        assert_eq!(i.centroid(), Vec3::splat(1.5));
    }
}
