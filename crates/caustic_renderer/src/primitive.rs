//! Scene primitives: a shape placed in the world by a transform, with a
//! material and an optional surface emission.

use caustic_math::{Aabb, Ray, Transform, Vec3};
use rand::RngCore;
use std::f32::consts::PI;
use std::sync::Arc;

use crate::csg::Csg;
use crate::cuboid::Cuboid;
use crate::cylinder::{Cone, Cylinder};
use crate::hit::{Intersection, MaterialId, PrimitiveId};
use crate::material::Color;
use crate::mesh::MeshFace;
use crate::sampling::{gen_f32, uniform_sample_sphere};
use crate::sdf::{Metaball, TorusKnot};
use crate::shape::LocalShape;
use crate::sphere::{MovingSphere, Sphere};
use crate::square::{Plane, Square};
use crate::texture::SolidTexture;

#[derive(Debug, Clone)]
pub enum Shape {
    Sphere(Sphere),
    Cuboid(Cuboid),
    Cylinder(Cylinder),
    Cone(Cone),
    Square(Square),
    Plane(Plane),
    MovingSphere(MovingSphere),
    Triangle(MeshFace),
    TorusKnot(TorusKnot),
    Metaball(Metaball),
    Csg(Csg),
}

impl Shape {
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Sphere(_) => "sphere",
            Shape::Cuboid(_) => "box",
            Shape::Cylinder(_) => "cylinder",
            Shape::Cone(_) => "cone",
            Shape::Square(_) => "square",
            Shape::Plane(_) => "plane",
            Shape::MovingSphere(_) => "moving sphere",
            Shape::Triangle(_) => "triangle",
            Shape::TorusKnot(_) => "torus knot",
            Shape::Metaball(_) => "metaball",
            Shape::Csg(_) => "csg",
        }
    }

    /// The analytic shape, or `None` for CSG nodes which have no local test.
    fn local(&self) -> Option<&dyn LocalShape> {
        match self {
            Shape::Sphere(s) => Some(s),
            Shape::Cuboid(s) => Some(s),
            Shape::Cylinder(s) => Some(s),
            Shape::Cone(s) => Some(s),
            Shape::Square(s) => Some(s),
            Shape::Plane(s) => Some(s),
            Shape::MovingSphere(s) => Some(s),
            Shape::Triangle(s) => Some(s),
            Shape::TorusKnot(s) => Some(s),
            Shape::Metaball(s) => Some(s),
            Shape::Csg(_) => None,
        }
    }

    /// True for closed solids that may be CSG operands.
    pub fn is_closed(&self) -> bool {
        self.local().map_or(true, |s| s.is_closed())
    }
}

/// A point drawn uniformly over an emitter's surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub point: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Clone)]
pub struct Primitive {
    name: String,
    shape: Shape,
    transform: Transform,
    material: MaterialId,
    emission: Option<Color>,
    texture_coords: bool,
    solid_texture: Option<Arc<dyn SolidTexture>>,
}

impl Primitive {
    pub fn new(name: impl Into<String>, shape: Shape, material: MaterialId) -> Self {
        Self {
            name: name.into(),
            shape,
            transform: Transform::IDENTITY,
            material,
            emission: None,
            texture_coords: false,
            solid_texture: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Make this primitive an area emitter with the given radiance.
    pub fn with_emission(mut self, radiance: Color) -> Self {
        self.emission = Some(radiance);
        self
    }

    /// Report texture coordinates and tangent frames on hits.
    pub fn with_texture_coords(mut self, enabled: bool) -> Self {
        self.texture_coords = enabled;
        self
    }

    /// Replace the material's diffuse color with `texture` sampled at the
    /// world-space hit point.
    pub fn with_solid_texture(mut self, texture: Arc<dyn SolidTexture>) -> Self {
        self.solid_texture = Some(texture);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn emission(&self) -> Option<Color> {
        self.emission
    }

    pub fn solid_texture(&self) -> Option<&dyn SolidTexture> {
        self.solid_texture.as_deref()
    }

    /// Nearest world-space hit. CSG nodes resolve their operands through `arena`.
    pub(crate) fn intersect(&self, id: PrimitiveId, ray: &Ray, arena: &[Primitive]) -> Option<Intersection> {
        let shape = match &self.shape {
            Shape::Csg(csg) => return csg.intersect(ray, arena),
            other => other.local()?,
        };

        let (local_ray, scale) = self.transform.ray_to_local(ray);
        if scale <= 0.0 {
            return None;
        }
        let hit = shape.intersect_local(&local_ray)?;

        let mut isect = Intersection::new(id, hit.t / scale, self.transform.normal_to_world(hit.normal));
        if self.texture_coords {
            isect.uv = hit.uv;
            isect.tbn = hit.tbn.map(|tbn| self.transform.normal_matrix * tbn);
        }
        isect.material = hit.material;
        Some(isect)
    }

    /// World bounds of an analytic shape. CSG bounds depend on the operands
    /// and are resolved by the scene builder.
    pub(crate) fn local_world_bounds(&self) -> Option<Aabb> {
        let local = self.shape.local()?.local_bounds()?;
        Some(self.transform.aabb_to_world(&local).padded())
    }

    /// Surface area for emitter sampling; `None` for shapes that cannot
    /// be sampled.
    pub(crate) fn surface_area(&self) -> Option<f32> {
        let m = &self.transform.xform;
        match &self.shape {
            Shape::Sphere(_) => {
                let radius = m.determinant().abs().cbrt();
                Some(4.0 * PI * radius * radius)
            }
            Shape::Square(_) => Some(m.x_axis.truncate().cross(m.y_axis.truncate()).length()),
            Shape::Triangle(face) => {
                let [a, b, c] = face.mesh().face_vertices(face.face()).map(|v| self.transform.point_to_world(v));
                Some(0.5 * (b - a).cross(c - a).length())
            }
            _ => None,
        }
    }

    /// Uniform point on the surface with its outward normal.
    pub(crate) fn sample_surface(&self, rng: &mut dyn RngCore) -> Option<SurfaceSample> {
        let (local_point, local_normal) = match &self.shape {
            Shape::Sphere(_) => {
                let p = uniform_sample_sphere(rng);
                (p, p)
            }
            Shape::Square(_) => (Vec3::new(gen_f32(rng) - 0.5, gen_f32(rng) - 0.5, 0.0), Vec3::Z),
            Shape::Triangle(face) => {
                let [a, b, c] = face.mesh().face_vertices(face.face());
                let su = gen_f32(rng).sqrt();
                let v = gen_f32(rng);
                let p = a * (1.0 - su) + b * (su * (1.0 - v)) + c * (su * v);
                (p, face.mesh().face_normal(face.face()))
            }
            _ => return None,
        };
        Some(SurfaceSample {
            point: self.transform.point_to_world(local_point),
            normal: self.transform.normal_to_world(local_normal),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caustic_math::Mat4;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn placed(shape: Shape, m: Mat4) -> Primitive {
        Primitive::new("p", shape, MaterialId(0)).with_transform(Transform::from_matrix(m))
    }

    #[test]
    fn test_scaled_sphere_world_distance_and_normal() {
        let prim = placed(
            Shape::Sphere(Sphere),
            Mat4::from_scale_rotation_translation(Vec3::splat(2.0), Default::default(), Vec3::new(0.0, 0.0, -10.0)),
        );
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let hit = prim.intersect(PrimitiveId(0), &ray, &[]).unwrap();
        assert!((hit.t - 8.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::Z).length() < 1e-4);
        assert!(hit.uv.is_none());
    }

    #[test]
    fn test_marched_shape_under_transform() {
        let prim = placed(
            Shape::Metaball(Metaball::new(1.0).with_ball(Vec3::ZERO)),
            Mat4::from_scale_rotation_translation(Vec3::splat(2.0), Default::default(), Vec3::new(0.0, 0.0, -10.0)),
        );
        let hit = prim.intersect(PrimitiveId(0), &Ray::new(Vec3::ZERO, -Vec3::Z), &[]).unwrap();
        assert!((hit.t - 8.0).abs() < 1e-2);
        assert!((hit.normal - Vec3::Z).length() < 1e-2);
        assert!(prim.surface_area().is_none());
        assert!(prim.shape().is_closed());
    }

    #[test]
    fn test_non_uniform_scale_keeps_normals_outward() {
        let prim = placed(Shape::Sphere(Sphere), Mat4::from_scale(Vec3::new(4.0, 1.0, 1.0)));
        let ray = Ray::new(Vec3::new(-10.0, 0.5, 0.0), Vec3::X);
        let hit = prim.intersect(PrimitiveId(0), &ray, &[]).unwrap();
        assert!(hit.normal.dot(ray.direction) < 0.0);
        assert!((hit.normal.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_texture_coords_toggle() {
        let prim = placed(Shape::Square(Square), Mat4::IDENTITY).with_texture_coords(true);
        let hit = prim.intersect(PrimitiveId(0), &Ray::new(Vec3::Z, -Vec3::Z), &[]).unwrap();
        assert!(hit.uv.is_some());
        assert!(hit.tbn.is_some());
    }

    #[test]
    fn test_surface_area_under_transform() {
        let sphere = placed(Shape::Sphere(Sphere), Mat4::from_scale(Vec3::splat(3.0)));
        assert!((sphere.surface_area().unwrap() - 36.0 * PI).abs() < 1e-2);

        let square = placed(Shape::Square(Square), Mat4::from_scale(Vec3::new(2.0, 5.0, 1.0)));
        assert!((square.surface_area().unwrap() - 10.0).abs() < 1e-4);

        assert!(placed(Shape::Cuboid(Cuboid), Mat4::IDENTITY).surface_area().is_none());
    }

    #[test]
    fn test_surface_samples_lie_on_surface() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let sphere = placed(Shape::Sphere(Sphere), m);
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..50 {
            let s = sphere.sample_surface(&mut rng).unwrap();
            let offset = s.point - Vec3::new(1.0, 2.0, 3.0);
            assert!((offset.length() - 2.0).abs() < 1e-4);
            assert!((s.normal - offset.normalize()).length() < 1e-4);
        }
    }

    #[test]
    fn test_closed_shapes() {
        assert!(Shape::Sphere(Sphere).is_closed());
        assert!(Shape::Cylinder(Cylinder::new(true)).is_closed());
        assert!(!Shape::Cylinder(Cylinder::new(false)).is_closed());
        assert!(!Shape::Square(Square).is_closed());
        assert!(!Shape::Plane(Plane).is_closed());
    }
}
