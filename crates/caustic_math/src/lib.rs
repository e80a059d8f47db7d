//! Math kernel for caustic.
//!
//! Re-exports glam for vector/matrix algebra and adds the ray-tracing
//! specific types built on top of it: parametric [`Interval`]s, axis-aligned
//! boxes with a slab test, normalized [`Ray`]s and the hierarchical
//! [`TransformTree`].

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
pub use transform::{Mat4Ext, Transform, TransformId, TransformNode, TransformTree};

/// Offset applied along rays and normals to avoid re-hitting the surface a
/// ray was spawned from.
pub const RAY_EPSILON: f32 = 1e-4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a * b, Vec3::new(4.0, 10.0, 18.0));
    }

    #[test]
    fn test_mat3_inverse_transpose_of_rotation_is_rotation() {
        let m = Mat3::from_rotation_y(0.7);
        let n = m.inverse().transpose();
        let v = Vec3::new(0.3, -1.2, 2.0);
        assert!((m * v - n * v).length() < 1e-5);
    }
}
