//! Unidirectional path tracing with next-event estimation.

use caustic_math::{Ray, Vec3, RAY_EPSILON};
use rand::RngCore;

use crate::material::{Color, Material};
use crate::sampling::{face_forward, gen_f32};
use crate::scene::Scene;
use crate::settings::RenderSettings;

/// Iterative path tracer.
///
/// At every non-transmissive vertex one emitter point is sampled (chosen by
/// area) and connected with a shadow ray. Emission found by the random walk
/// itself is only counted where that light sampling could not have found
/// it: on camera rays, after specular bounces, and after transmissive
/// vertices.
#[derive(Debug, Clone, Copy)]
pub struct PathIntegrator<'a> {
    scene: &'a Scene,
    settings: &'a RenderSettings,
}

impl<'a> PathIntegrator<'a> {
    pub fn new(scene: &'a Scene, settings: &'a RenderSettings) -> Self {
        Self { scene, settings }
    }

    pub fn radiance(&self, camera_ray: &Ray, rng: &mut dyn RngCore) -> Color {
        let scene = self.scene;
        let survival = self.settings.survival_probability;
        let light_sampling = !scene.emitters().is_empty();

        let mut radiance = Color::ZERO;
        let mut beta = Color::ONE;
        let mut ray = *camera_ray;
        let mut count_emission = true;

        for _ in 0..=self.settings.max_bounces {
            let Some(hit) = scene.intersect(&ray) else {
                radiance += beta * self.settings.background;
                break;
            };

            if let Some(emission) = scene.emission(&hit) {
                if count_emission {
                    radiance += beta * emission;
                }
                break;
            }

            let material = scene.material_at(&hit);
            let p = hit.point(&ray);
            let wo = -ray.direction;
            let n = hit.normal;

            let sample_lights = light_sampling && !material.is_transmissive();
            if sample_lights {
                radiance += beta * self.sample_emitter(&ray, p, wo, n, material, rng);
            }

            if gen_f32(rng) > survival {
                break;
            }
            let Some(s) = material.sample(wo, n, rng) else {
                break;
            };
            if s.pdf <= 0.0 || s.value == Color::ZERO {
                break;
            }
            beta *= s.value * s.wi.dot(n).abs() / (s.pdf * survival);
            if beta == Color::ZERO {
                break;
            }
            count_emission = !sample_lights || s.specular;

            // Crossing the surface changes the medium the ray travels in.
            let transmitted = s.wi.dot(n) * wo.dot(n) < 0.0;
            ray = if transmitted {
                let medium = if wo.dot(n) > 0.0 {
                    Some(material.coefficients().ior)
                } else {
                    None
                };
                ray.spawn(p, s.wi).with_medium(medium)
            } else {
                ray.spawn(p, s.wi)
            };
        }
        radiance
    }

    /// Unoccluded emitter contribution at `p`, converted from area to solid
    /// angle measure.
    fn sample_emitter(
        &self,
        ray: &Ray,
        p: Vec3,
        wo: Vec3,
        n: Vec3,
        material: &Material,
        rng: &mut dyn RngCore,
    ) -> Color {
        let Some(light) = self.scene.sample_emitter(rng) else {
            return Color::ZERO;
        };
        let to_light = light.point - p;
        let dist2 = to_light.length_squared();
        let dist = dist2.sqrt();
        if dist <= RAY_EPSILON {
            return Color::ZERO;
        }
        let wi = to_light / dist;
        let facing = face_forward(n, wo);
        let cos_surface = wi.dot(facing);
        let cos_light = wi.dot(light.normal).abs();
        if cos_surface <= 0.0 || cos_light <= 0.0 {
            return Color::ZERO;
        }

        let shadow = self
            .scene
            .transmittance(p + facing * RAY_EPSILON, wi, dist - 1e-3, ray.time);
        if shadow == Color::ZERO {
            return Color::ZERO;
        }
        let f = material.evaluate(wi, wo, n);
        light.radiance * f * shadow * (cos_surface * cos_light / (dist2 * light.pdf_area))
    }
}
