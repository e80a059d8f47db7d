//! Caustic photon map.
//!
//! Photons leave the point, area and directional lights, travel through
//! transmissive and reflective surfaces, and are stored where they first
//! land on a diffuse surface after at least one specular bounce. The stored
//! photons are indexed by a [`KdTree`] and gathered at shading time into an
//! irradiance estimate.

use caustic_math::{Aabb, Ray, Vec2, Vec3};
use rand::RngCore;
use std::f32::consts::PI;

use crate::error::SceneError;
use crate::kdtree::{KdPoint, KdTree};
use crate::light::{EmittedPhoton, Light};
use crate::material::Color;
use crate::primitive::Shape;
use crate::sampling::{gen_f32, orthonormal_basis};
use crate::scene::Scene;
use crate::settings::PhotonSettings;

/// Cells per side of a directional light's projection map.
pub const PROJECTION_RESOLUTION: usize = 64;

/// Distance the projection plane sits in front of the scene.
const PROJECTION_MARGIN: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Photon {
    pub position: Vec3,
    /// Direction of travel when the photon landed.
    pub direction: Vec3,
    pub power: Color,
}

impl KdPoint for Photon {
    fn position(&self) -> Vec3 {
        self.position
    }
}

/// Grid over the scene as seen along a directional light, marking where
/// specular or transmissive geometry lies.
#[derive(Debug, Clone)]
pub struct ProjectionMap {
    u_axis: Vec3,
    v_axis: Vec3,
    /// Offset of the projection plane along the light direction.
    plane: Vec3,
    min: Vec2,
    cell: Vec2,
    covered: Vec<usize>,
}

impl ProjectionMap {
    /// `None` when the scene has no bounded caster geometry.
    pub fn build(scene: &Scene, direction: Vec3) -> Option<Self> {
        let direction = direction.normalize_or_zero();
        let bounds = scene.bounds();
        if direction == Vec3::ZERO || bounds.is_empty() {
            return None;
        }
        let (u_axis, v_axis) = orthonormal_basis(direction);
        let project = |p: Vec3| Vec2::new(p.dot(u_axis), p.dot(v_axis));

        let corners = bounds.corners();
        let (min, max) = corners.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(lo, hi), &c| (lo.min(project(c)), hi.max(project(c))),
        );
        let nearest = corners
            .iter()
            .map(|c| c.dot(direction))
            .fold(f32::INFINITY, f32::min);
        let cell = ((max - min) / PROJECTION_RESOLUTION as f32).max(Vec2::splat(1e-6));

        let mut marked = vec![false; PROJECTION_RESOLUTION * PROJECTION_RESOLUTION];
        for caster in casters(scene) {
            let (lo, hi) = caster.corners().iter().fold(
                (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
                |(lo, hi), &c| (lo.min(project(c)), hi.max(project(c))),
            );
            let to_cell = |x: Vec2| ((x - min) / cell).floor();
            let (c0, c1) = (to_cell(lo).max(Vec2::ZERO), to_cell(hi));
            let last = (PROJECTION_RESOLUTION - 1) as f32;
            for y in c0.y as usize..=(c1.y.min(last) as usize) {
                for x in c0.x as usize..=(c1.x.min(last) as usize) {
                    marked[y * PROJECTION_RESOLUTION + x] = true;
                }
            }
        }

        let covered: Vec<usize> = (0..marked.len()).filter(|&i| marked[i]).collect();
        if covered.is_empty() {
            return None;
        }
        Some(Self {
            u_axis,
            v_axis,
            plane: direction * (nearest - PROJECTION_MARGIN),
            min,
            cell,
            covered,
        })
    }

    pub fn covered_cells(&self) -> usize {
        self.covered.len()
    }

    /// World area of the covered cells, perpendicular to the light.
    pub fn footprint_area(&self) -> f32 {
        self.covered.len() as f32 * self.cell.x * self.cell.y
    }

    /// Uniform point on the covered part of the projection plane.
    pub fn sample_origin(&self, rng: &mut dyn RngCore) -> Option<Vec3> {
        if self.covered.is_empty() {
            return None;
        }
        let pick = ((gen_f32(rng) * self.covered.len() as f32) as usize).min(self.covered.len() - 1);
        let index = self.covered[pick];
        let (x, y) = (index % PROJECTION_RESOLUTION, index / PROJECTION_RESOLUTION);
        let uv = self.min + (Vec2::new(x as f32, y as f32) + Vec2::new(gen_f32(rng), gen_f32(rng))) * self.cell;
        Some(self.plane + self.u_axis * uv.x + self.v_axis * uv.y)
    }
}

/// Boxes of root geometry that can redirect photons.
fn casters(scene: &Scene) -> impl Iterator<Item = Aabb> + '_ {
    scene.roots().iter().filter_map(move |&id| {
        let primitive = scene.primitive(id);
        let material = scene.material(primitive.material());
        let specular = material.coefficients().is_reflective()
            || material.is_transmissive()
            || matches!(primitive.shape(), Shape::Triangle(f) if f.mesh().has_transmissive_materials());
        if specular {
            scene.primitive_bounds(id)
        } else {
            None
        }
    })
}

/// A light taking part in photon emission.
struct Emitter<'a> {
    light: &'a Light,
    projection: Option<ProjectionMap>,
    emitted: u64,
}

#[derive(Debug, Clone)]
pub struct PhotonMap {
    tree: KdTree<Photon>,
    neighbors: usize,
    max_radius: f32,
}

impl PhotonMap {
    /// Emit and trace photons until `photon_count` are stored or the
    /// emission budget runs out, then index them.
    pub fn build(scene: &Scene, settings: &PhotonSettings, rng: &mut dyn RngCore) -> Result<Self, SceneError> {
        settings.validate()?;

        let mut emitters: Vec<Emitter> = scene
            .lights()
            .iter()
            .filter(|light| light.emits_photons())
            .map(|light| Emitter {
                light,
                projection: match light {
                    Light::Directional(l) => ProjectionMap::build(scene, l.direction),
                    _ => None,
                },
                emitted: 0,
            })
            .collect();

        // Lights are picked proportionally to the luminance of their power.
        let mut cumulative = Vec::with_capacity(emitters.len());
        let mut total = 0.0;
        for e in &emitters {
            total += luminance(e.light.power(e.projection.as_ref()));
            cumulative.push(total);
        }

        let mut stored: Vec<(usize, Photon)> = Vec::with_capacity(settings.photon_count);
        let budget = settings.photon_count.saturating_mul(settings.emission_budget) as u64;
        let mut attempts = 0u64;
        if total > 0.0 {
            while stored.len() < settings.photon_count && attempts < budget {
                attempts += 1;
                let x = gen_f32(rng) * total;
                let index = cumulative.partition_point(|&c| c <= x).min(emitters.len() - 1);
                let emitter = &mut emitters[index];
                emitter.emitted += 1;
                let Some(photon) = emitter.light.emit_photon(emitter.projection.as_ref(), rng) else {
                    continue;
                };
                if let Some(landed) = trace_photon(scene, settings, photon) {
                    stored.push((index, landed));
                }
            }
        }

        let scale = scene.options().light_scale * settings.flux_scale;
        let photons: Vec<Photon> = stored
            .into_iter()
            .map(|(index, mut photon)| {
                photon.power *= scale / emitters[index].emitted as f32;
                photon
            })
            .collect();

        if photons.len() < settings.photon_count {
            log::warn!(
                "photon map: stored {} of {} photons after {} emissions",
                photons.len(),
                settings.photon_count,
                attempts
            );
        }
        log::info!(
            "photon map: {} photons from {} lights ({} emitted)",
            photons.len(),
            emitters.len(),
            attempts
        );

        Ok(Self {
            tree: KdTree::build(photons),
            neighbors: settings.neighbors,
            max_radius: settings.max_radius,
        })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn photons(&self) -> &[Photon] {
        self.tree.items()
    }

    /// Density estimate: summed power of the nearest photons over the disk
    /// reaching the farthest of them.
    pub fn irradiance(&self, p: Vec3) -> Color {
        let found = self.tree.nearest(p, self.neighbors, self.max_radius);
        let Some(&(_, max_dist2)) = found.last() else {
            return Color::ZERO;
        };
        let flux: Color = found.iter().map(|(photon, _)| photon.power).sum();
        flux / (PI * max_dist2 + caustic_math::RAY_EPSILON)
    }
}

fn luminance(c: Color) -> f32 {
    c.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// Follow one photon; returns it where it lands on a diffuse surface after
/// a specular bounce.
fn trace_photon(scene: &Scene, settings: &PhotonSettings, emitted: EmittedPhoton) -> Option<Photon> {
    let mut ray = Ray::new(emitted.origin, emitted.direction);
    let mut power = emitted.power;
    let mut specular = false;

    for _ in 0..settings.max_bounces {
        let hit = scene.intersect(&ray)?;
        let material = scene.material_at(&hit);
        let coefficients = material.coefficients();

        if material.is_transmissive() {
            ray = match hit.refracted(&ray, coefficients.ior) {
                Some(next) => {
                    power *= material.transmission();
                    next
                }
                None => hit.reflected(&ray),
            };
        } else if coefficients.is_reflective() {
            power *= coefficients.reflective;
            ray = hit.reflected(&ray);
        } else if specular {
            return Some(Photon {
                position: hit.point(&ray),
                direction: ray.direction,
                power,
            });
        } else {
            return None;
        }

        specular = true;
        if power.max_element() <= 0.0 {
            return None;
        }
    }
    None
}
