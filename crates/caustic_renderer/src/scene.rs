//! Scene assembly and queries.
//!
//! [`SceneBuilder`] collects primitives, materials, lights and transforms,
//! validates them, and produces an immutable [`Scene`] holding the BVH, the
//! list of unbounded primitives and the emitter table used for light
//! sampling. A built scene is never mutated, so render threads share it by
//! reference.

use caustic_math::{Aabb, Mat4, Ray, Transform, TransformId, TransformTree, Vec3, RAY_EPSILON};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;

use crate::bvh::Bvh;
use crate::csg::{self, Csg, CsgOp, MAX_CSG_DEPTH};
use crate::error::SceneError;
use crate::hit::{Intersection, MaterialId, PrimitiveId};
use crate::light::Light;
use crate::material::{Color, Material};
use crate::mesh::{MeshFace, TriangleMesh};
use crate::primitive::{Primitive, Shape};
use crate::sampling::gen_f32;
use crate::settings::SceneOptions;

/// Occluders a shadow ray looks through before giving up.
const MAX_SHADOW_OCCLUDERS: usize = 16;

/// A point sampled on an emissive surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterSample {
    pub primitive: PrimitiveId,
    pub point: Vec3,
    /// Outward surface normal at `point`.
    pub normal: Vec3,
    pub radiance: Color,
    /// Density with respect to surface area over all emitters.
    pub pdf_area: f32,
}

/// Emissive primitives, picked proportionally to their surface area.
#[derive(Debug, Clone, Default)]
pub struct EmitterTable {
    entries: Vec<PrimitiveId>,
    cumulative: Vec<f32>,
    total_area: f32,
}

impl EmitterTable {
    fn build(arena: &[Primitive], roots: &[PrimitiveId]) -> Result<Self, SceneError> {
        let mut table = EmitterTable::default();
        for &id in roots {
            let primitive = &arena[id.0];
            if primitive.emission().is_none() {
                continue;
            }
            let area = primitive.surface_area().ok_or_else(|| SceneError::UnsupportedEmitter {
                name: primitive.name().to_string(),
                kind: primitive.shape().kind(),
            })?;
            if area <= 0.0 {
                continue;
            }
            table.total_area += area;
            table.entries.push(id);
            table.cumulative.push(table.total_area);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_area(&self) -> f32 {
        self.total_area
    }

    /// Pick an emitter proportionally to area, then a uniform point on it.
    pub fn sample(&self, arena: &[Primitive], rng: &mut dyn RngCore) -> Option<EmitterSample> {
        if self.entries.is_empty() || self.total_area <= 0.0 {
            return None;
        }
        let x = gen_f32(rng) * self.total_area;
        let index = self
            .cumulative
            .partition_point(|&c| c <= x)
            .min(self.entries.len() - 1);
        let id = self.entries[index];
        let primitive = &arena[id.0];
        let surface = primitive.sample_surface(rng)?;
        Some(EmitterSample {
            primitive: id,
            point: surface.point,
            normal: surface.normal,
            radiance: primitive.emission()?,
            pdf_area: 1.0 / self.total_area,
        })
    }
}

#[derive(Debug)]
pub struct Scene {
    primitives: Vec<Primitive>,
    materials: Vec<Material>,
    lights: Vec<Light>,
    roots: Vec<PrimitiveId>,
    bvh: Bvh,
    unbounded: Vec<PrimitiveId>,
    primitive_bounds: Vec<Option<Aabb>>,
    bounds: Aabb,
    emitters: EmitterTable,
    options: SceneOptions,
    has_transmissive: bool,
}

impl Scene {
    pub fn primitive(&self, id: PrimitiveId) -> &Primitive {
        &self.primitives[id.0]
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Primitives that are not CSG operands.
    pub fn roots(&self) -> &[PrimitiveId] {
        &self.roots
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    /// The material to shade `hit` with: the interpolated material carried
    /// by the record if there is one, else the primitive's own.
    pub fn material_at<'a>(&'a self, hit: &'a Intersection) -> &'a Material {
        hit.material
            .as_deref()
            .unwrap_or_else(|| self.material(self.primitive(hit.primitive).material()))
    }

    pub fn emission(&self, hit: &Intersection) -> Option<Color> {
        self.primitive(hit.primitive).emission()
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn unbounded(&self) -> &[PrimitiveId] {
        &self.unbounded
    }

    pub fn emitters(&self) -> &EmitterTable {
        &self.emitters
    }

    /// World box of one primitive; `None` for unbounded ones.
    pub fn primitive_bounds(&self, id: PrimitiveId) -> Option<Aabb> {
        self.primitive_bounds[id.0]
    }

    /// Union of the bounded roots' boxes.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn sample_emitter(&self, rng: &mut dyn RngCore) -> Option<EmitterSample> {
        self.emitters.sample(&self.primitives, rng)
    }

    /// Nearest hit over the BVH and the unbounded primitives.
    pub fn intersect(&self, ray: &Ray) -> Option<Intersection> {
        if ray.is_degenerate() {
            return None;
        }
        let mut best = self.bvh.intersect(ray, &self.primitives);
        for &id in &self.unbounded {
            if let Some(hit) = self.primitive(id).intersect(id, ray, &self.primitives) {
                if best.as_ref().map_or(true, |b| hit.t < b.t) {
                    best = Some(hit);
                }
            }
        }
        best.map(|hit| self.apply_solid_texture(ray, hit))
    }

    /// Nearest hit by testing every root; the reference for [`Scene::intersect`].
    pub fn intersect_linear(&self, ray: &Ray) -> Option<Intersection> {
        if ray.is_degenerate() {
            return None;
        }
        self.roots
            .iter()
            .filter_map(|&id| self.primitive(id).intersect(id, ray, &self.primitives))
            .min_by(|a, b| a.t.total_cmp(&b.t))
            .map(|hit| self.apply_solid_texture(ray, hit))
    }

    /// Carry the textured diffuse color in the record when the primitive
    /// that was hit has a solid texture.
    fn apply_solid_texture(&self, ray: &Ray, mut hit: Intersection) -> Intersection {
        if let Some(texture) = self.primitive(hit.primitive).solid_texture() {
            let kd = texture.sample(hit.point(ray));
            hit.material = Some(Box::new(self.material_at(&hit).with_diffuse(kd)));
        }
        hit
    }

    /// Every surface crossing of primitive `id` along `ray`, nearest first.
    pub fn crossings(&self, id: PrimitiveId, ray: &Ray) -> Vec<Intersection> {
        csg::crossings(&self.primitives, id, ray)
    }

    /// True if anything lies along `ray` closer than `max_t`.
    pub fn is_occluded(&self, ray: &Ray, max_t: f32) -> bool {
        self.bvh.any_hit(ray, max_t, &self.primitives)
            || self.unbounded.iter().any(|&id| {
                self.primitive(id)
                    .intersect(id, ray, &self.primitives)
                    .is_some_and(|hit| hit.t < max_t)
            })
    }

    /// Fraction of light travelling from `origin + direction * max_distance`
    /// back to `origin` that survives the occluders in between. Transmissive
    /// occluders tint it; an opaque one blocks it entirely.
    pub fn transmittance(&self, origin: Vec3, direction: Vec3, max_distance: f32, time: f32) -> Color {
        let mut ray = Ray::new(origin, direction).with_time(time);
        if ray.is_degenerate() {
            return Color::ONE;
        }
        if !self.has_transmissive {
            return if self.is_occluded(&ray, max_distance) {
                Color::ZERO
            } else {
                Color::ONE
            };
        }

        let mut remaining = max_distance;
        let mut attenuation = Color::ONE;
        for _ in 0..MAX_SHADOW_OCCLUDERS {
            let Some(hit) = self.intersect(&ray) else {
                break;
            };
            if hit.t >= remaining {
                break;
            }
            let kt = self.material_at(&hit).transmission();
            if kt == Color::ZERO {
                return Color::ZERO;
            }
            attenuation *= kt;
            let step = hit.t + RAY_EPSILON;
            ray.origin = ray.at(step);
            remaining -= step;
        }
        attenuation
    }
}

/// Collects and validates scene contents.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    transforms: TransformTree,
    materials: Vec<Material>,
    primitives: Vec<Primitive>,
    names: HashMap<String, PrimitiveId>,
    is_operand: Vec<bool>,
    lights: Vec<Light>,
    options: SceneOptions,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: SceneOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transforms(&self) -> &TransformTree {
        &self.transforms
    }

    /// Add a transform node below `parent` and return its handle.
    pub fn add_transform(&mut self, parent: TransformId, local: Mat4) -> TransformId {
        self.transforms.add_child(parent, local)
    }

    /// World transform of a node, ready for [`Primitive::with_transform`].
    pub fn transform(&self, id: TransformId) -> Transform {
        self.transforms.transform(id)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    /// Add a primitive. CSG nodes must reference operands added earlier.
    pub fn add_primitive(&mut self, primitive: Primitive) -> Result<PrimitiveId, SceneError> {
        if self.names.contains_key(primitive.name()) {
            return Err(SceneError::DuplicatePrimitive(primitive.name().to_string()));
        }
        if primitive.material().0 >= self.materials.len() {
            return Err(SceneError::UnknownMaterial {
                name: primitive.name().to_string(),
                index: primitive.material().0,
            });
        }
        if !primitive.transform().is_invertible() {
            return Err(SceneError::SingularTransform(primitive.name().to_string()));
        }
        if let Shape::Csg(csg) = primitive.shape() {
            if !primitive.transform().is_identity() {
                return Err(SceneError::TransformedCsg(primitive.name().to_string()));
            }
            self.check_operands(primitive.name(), csg)?;
        }

        let id = PrimitiveId(self.primitives.len());
        if let Shape::Csg(csg) = primitive.shape() {
            self.is_operand[csg.left.0] = true;
            self.is_operand[csg.right.0] = true;
        }
        self.names.insert(primitive.name().to_string(), id);
        self.primitives.push(primitive);
        self.is_operand.push(false);
        Ok(id)
    }

    /// Add every face of `mesh` as its own primitive, named `mesh[i]`.
    pub fn add_mesh(
        &mut self,
        mesh: TriangleMesh,
        transform: Transform,
        material: MaterialId,
    ) -> Result<Vec<PrimitiveId>, SceneError> {
        let mesh = Arc::new(mesh);
        MeshFace::all(&mesh)
            .into_iter()
            .map(|face| {
                let name = format!("{}[{}]", mesh.name(), face.face());
                self.add_primitive(Primitive::new(name, Shape::Triangle(face), material).with_transform(transform))
            })
            .collect()
    }

    /// Combine two named primitives. Hits shade with the operand's material.
    pub fn add_csg(
        &mut self,
        name: impl Into<String>,
        op: CsgOp,
        left: &str,
        right: &str,
    ) -> Result<PrimitiveId, SceneError> {
        let name = name.into();
        let lookup = |operand: &str| {
            self.names.get(operand).copied().ok_or_else(|| SceneError::UnknownPrimitive {
                csg: name.clone(),
                operand: operand.to_string(),
            })
        };
        let (left, right) = (lookup(left)?, lookup(right)?);
        let material = self.primitives[left.0].material();
        self.add_primitive(Primitive::new(name, Shape::Csg(Csg::new(op, left, right)), material))
    }

    pub fn add_light(&mut self, light: Light) -> Result<usize, SceneError> {
        let index = self.lights.len();
        let invalid = |reason| Err(SceneError::InvalidLight { index, reason });
        match &light {
            Light::Directional(l) if l.direction == Vec3::ZERO => return invalid("direction is zero"),
            Light::Spot(l) if l.direction == Vec3::ZERO => return invalid("spot target coincides with its position"),
            Light::Spot(l) if !(l.cone_angle > 0.0 && l.cone_angle < 180.0) => {
                return invalid("spot cone angle must be within (0, 180) degrees")
            }
            Light::Area(l) if l.area() <= 0.0 => return invalid("area light has zero area"),
            _ => {}
        }
        self.lights.push(light);
        Ok(index)
    }

    fn check_operands(&self, csg_name: &str, csg: &Csg) -> Result<(), SceneError> {
        for operand in [csg.left, csg.right] {
            let Some(primitive) = self.primitives.get(operand.0) else {
                return Err(SceneError::UnknownPrimitive {
                    csg: csg_name.to_string(),
                    operand: format!("#{}", operand.0),
                });
            };
            if csg.left == csg.right || self.is_operand[operand.0] {
                return Err(SceneError::OperandReused {
                    csg: csg_name.to_string(),
                    operand: primitive.name().to_string(),
                });
            }
            if !primitive.shape().is_closed() {
                return Err(SceneError::UnsupportedCsgOperand {
                    csg: csg_name.to_string(),
                    operand: primitive.name().to_string(),
                    kind: primitive.shape().kind(),
                });
            }
        }

        let depth = 1 + csg::depth(&self.primitives, csg.left).max(csg::depth(&self.primitives, csg.right));
        if depth > MAX_CSG_DEPTH {
            return Err(SceneError::CsgTooDeep {
                csg: csg_name.to_string(),
                depth,
                max: MAX_CSG_DEPTH,
            });
        }
        Ok(())
    }

    pub fn build(self) -> Result<Scene, SceneError> {
        self.options.validate()?;

        // Operands always precede the CSG node using them, so one pass in
        // order resolves every box.
        let mut bounds: Vec<Option<Aabb>> = Vec::with_capacity(self.primitives.len());
        for primitive in &self.primitives {
            let b = match primitive.shape() {
                Shape::Csg(csg) => match (bounds[csg.left.0], bounds[csg.right.0]) {
                    (Some(l), Some(r)) => Some(csg.op.bounds(&l, &r)).filter(|b| !b.is_empty()),
                    _ => None,
                },
                _ => primitive.local_world_bounds(),
            };
            bounds.push(b);
        }

        let roots: Vec<PrimitiveId> = (0..self.primitives.len())
            .filter(|&i| !self.is_operand[i])
            .map(PrimitiveId)
            .collect();

        for (i, primitive) in self.primitives.iter().enumerate() {
            if self.is_operand[i] && primitive.emission().is_some() {
                return Err(SceneError::UnsupportedEmitter {
                    name: primitive.name().to_string(),
                    kind: "csg operand",
                });
            }
        }

        let mut items = Vec::new();
        let mut unbounded = Vec::new();
        let mut scene_bounds = Aabb::EMPTY;
        for &id in &roots {
            match bounds[id.0] {
                Some(b) => {
                    scene_bounds = Aabb::surrounding(&scene_bounds, &b);
                    items.push((id, b));
                }
                None => unbounded.push(id),
            }
        }

        let emitters = EmitterTable::build(&self.primitives, &roots)?;
        let has_transmissive = self.materials.iter().any(Material::is_transmissive)
            || self.primitives.iter().any(|p| match p.shape() {
                Shape::Triangle(face) => face.mesh().has_transmissive_materials(),
                _ => false,
            });

        let bvh = Bvh::build(items);
        log::info!(
            "scene: {} primitives ({} roots), bvh {} bounded (depth {}), {} unbounded, {} emitters, {} lights",
            self.primitives.len(),
            roots.len(),
            bvh.len(),
            bvh.depth(),
            unbounded.len(),
            emitters.len(),
            self.lights.len()
        );

        Ok(Scene {
            primitives: self.primitives,
            materials: self.materials,
            lights: self.lights,
            roots,
            bvh,
            unbounded,
            primitive_bounds: bounds,
            bounds: scene_bounds,
            emitters,
            options: self.options,
            has_transmissive,
        })
    }
}
