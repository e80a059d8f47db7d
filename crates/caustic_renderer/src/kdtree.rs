//! Balanced k-d tree for k-nearest-neighbour queries over points.
//!
//! The tree is implicit: items are reordered in place so that every range
//! `[lo, hi)` has its median at `(lo + hi) / 2`, split on the axis of
//! greatest spatial extent of that range. Built once, then read-only.

use caustic_math::Vec3;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Anything with a position in space.
pub trait KdPoint {
    fn position(&self) -> Vec3;
}

#[derive(Debug, Clone)]
pub struct KdTree<T> {
    items: Vec<T>,
    /// Split axis of the node whose median sits at the same index.
    axes: Vec<u8>,
}

/// Max-heap entry ordered by squared distance.
struct Candidate {
    dist2: f32,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist2 == other.dist2
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2.total_cmp(&other.dist2)
    }
}

impl<T: KdPoint> KdTree<T> {
    pub fn build(mut items: Vec<T>) -> Self {
        let mut axes = vec![0u8; items.len()];
        Self::build_range(&mut items, &mut axes);
        Self { items, axes }
    }

    fn build_range(items: &mut [T], axes: &mut [u8]) {
        if items.len() <= 1 {
            return;
        }
        let (min, max) = items.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), item| (lo.min(item.position()), hi.max(item.position())),
        );
        let extent = max - min;
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |a, b| a.position()[axis].total_cmp(&b.position()[axis]));
        axes[mid] = axis as u8;

        let (left, rest) = items.split_at_mut(mid);
        let (left_axes, rest_axes) = axes.split_at_mut(mid);
        Self::build_range(left, left_axes);
        Self::build_range(&mut rest[1..], &mut rest_axes[1..]);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Up to `k` items within `max_radius` of `query`, nearest first, with
    /// their squared distances.
    pub fn nearest(&self, query: Vec3, k: usize, max_radius: f32) -> Vec<(&T, f32)> {
        if k == 0 || self.items.is_empty() {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search(0, self.items.len(), query, k, max_radius * max_radius, &mut heap);

        let mut found: Vec<_> = heap
            .into_iter()
            .map(|c| (&self.items[c.index], c.dist2))
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        found
    }

    fn search(
        &self,
        lo: usize,
        hi: usize,
        query: Vec3,
        k: usize,
        max_dist2: f32,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = (lo + hi) / 2;
        let p = self.items[mid].position();

        let dist2 = p.distance_squared(query);
        if dist2 <= max_dist2 {
            heap.push(Candidate { dist2, index: mid });
            if heap.len() > k {
                heap.pop();
            }
        }

        if hi - lo == 1 {
            return;
        }
        let axis = self.axes[mid] as usize;
        let delta = query[axis] - p[axis];
        let (near, far) = if delta < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };

        self.search(near.0, near.1, query, k, max_dist2, heap);

        let worst = if heap.len() == k {
            heap.peek().map_or(max_dist2, |c| c.dist2)
        } else {
            max_dist2
        };
        if delta * delta <= worst {
            self.search(far.0, far.1, query, k, max_dist2, heap);
        }
    }
}
