//! Hit records produced by primitive intersection.

use caustic_math::{Mat3, Ray, Vec2, Vec3};

use crate::material::Material;
use crate::sampling::{reflect, refract};

/// Index of a primitive inside its scene arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub(crate) usize);

impl PrimitiveId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a material inside its scene arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

impl MaterialId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A surface hit expressed in a shape's own frame, before the primitive
/// carries it back to world space.
#[derive(Debug, Clone)]
pub struct LocalHit {
    pub t: f32,
    /// Outward normal in local space (not necessarily unit length).
    pub normal: Vec3,
    pub uv: Option<Vec2>,
    /// Tangent, bitangent, normal as matrix columns.
    pub tbn: Option<Mat3>,
    /// Per-hit material, set by meshes with per-vertex materials.
    pub material: Option<Box<Material>>,
}

impl LocalHit {
    pub fn new(t: f32, normal: Vec3) -> Self {
        Self {
            t,
            normal,
            uv: None,
            tbn: None,
            material: None,
        }
    }

    pub fn with_uv(mut self, uv: Vec2) -> Self {
        self.uv = Some(uv);
        self
    }

    pub fn with_tbn(mut self, tbn: Mat3) -> Self {
        self.tbn = Some(tbn);
        self
    }
}

/// Nearest world-space surface crossing along a ray.
///
/// `normal` is the unit outward normal of the surface that was hit; whether
/// the ray enters or leaves is recovered from its sign against the ray
/// direction. Interpolated materials are owned by the record and released
/// with it.
#[derive(Debug, Clone)]
pub struct Intersection {
    pub primitive: PrimitiveId,
    pub t: f32,
    pub normal: Vec3,
    pub uv: Option<Vec2>,
    pub tbn: Option<Mat3>,
    pub material: Option<Box<Material>>,
}

impl Intersection {
    pub fn new(primitive: PrimitiveId, t: f32, normal: Vec3) -> Self {
        Self {
            primitive,
            t,
            normal,
            uv: None,
            tbn: None,
            material: None,
        }
    }

    pub fn point(&self, ray: &Ray) -> Vec3 {
        ray.at(self.t)
    }

    /// True when the ray arrives from the outside of the surface.
    pub fn is_entering(&self, ray: &Ray) -> bool {
        ray.direction.dot(self.normal) < 0.0
    }

    /// The normal flipped to face back along the incoming ray.
    pub fn facing_normal(&self, ray: &Ray) -> Vec3 {
        if self.is_entering(ray) {
            self.normal
        } else {
            -self.normal
        }
    }

    /// Mirror continuation of `ray` off this surface.
    pub fn reflected(&self, ray: &Ray) -> Ray {
        let n = self.facing_normal(ray);
        ray.spawn(self.point(ray), reflect(ray.direction, n))
    }

    /// Refracted continuation of `ray` into (or out of) a medium of index
    /// `ior`, or `None` on total internal reflection. The new ray records
    /// the medium it travels through.
    pub fn refracted(&self, ray: &Ray, ior: f32) -> Option<Ray> {
        let entering = self.is_entering(ray);
        let (n1, n2, medium) = if entering {
            (ray.current_ior(), ior, Some(ior))
        } else {
            (ior, 1.0, None)
        };
        let dir = refract(ray.direction, self.facing_normal(ray), n1 / n2)?;
        Some(ray.spawn(self.point(ray), dir).with_medium(medium))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_normal() {
        let hit = Intersection::new(PrimitiveId(0), 1.0, Vec3::Z);
        let entering = Ray::new(Vec3::new(0.0, 0.0, 2.0), -Vec3::Z);
        let leaving = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(hit.is_entering(&entering));
        assert_eq!(hit.facing_normal(&entering), Vec3::Z);
        assert!(!hit.is_entering(&leaving));
        assert_eq!(hit.facing_normal(&leaving), -Vec3::Z);
    }

    #[test]
    fn test_reflected_and_refracted_rays() {
        let ray = Ray::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, -1.0, 0.0));
        let hit = Intersection::new(PrimitiveId(0), 2f32.sqrt(), Vec3::Y);

        let r = hit.reflected(&ray);
        assert!((r.direction - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-5);
        assert!(r.origin.y > 0.0);

        let t = hit.refracted(&ray, 1.5).expect("entering glass never reflects totally");
        assert_eq!(t.medium_ior, Some(1.5));
        assert!(t.direction.y < 0.0);
        // Bends towards the normal
        assert!(t.direction.x < ray.direction.x);

        // Leaving the glass at the same angle is past the critical angle
        let inside = Ray::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)).with_medium(Some(1.5));
        assert!(hit.refracted(&inside, 1.5).is_none());
    }
}
