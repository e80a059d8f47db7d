//! Fresnel-weighted dielectric that stochastically reflects, refracts or
//! scatters diffusely.

use caustic_math::Vec3;
use rand::RngCore;
use std::f32::consts::PI;

use crate::material::{dielectric_reflectance, BsdfSample, Coefficients, Color};
use crate::sampling::{
    cosine_hemisphere_pdf, cosine_sample_hemisphere, face_forward, gen_f32, local_to_world,
    reflect, refract,
};

/// Below this cosine a delta lobe carries no usable energy.
const MIN_COS: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct FresnelDielectric {
    /// `ior` and the shading coefficients come from here.
    pub base: Coefficients,
    pub albedo: Color,
    pub metallic: f32,
    pub translucency: f32,
    pub roughness: f32,
}

/// Branch probabilities for one outgoing direction.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Lobes {
    specular: f32,
    refract: f32,
    diffuse: f32,
}

impl FresnelDielectric {
    pub fn new(albedo: Color, ior: f32, metallic: f32, translucency: f32, roughness: f32) -> Self {
        Self {
            base: Coefficients {
                ior,
                ..Default::default()
            },
            albedo,
            metallic: metallic.clamp(0.0, 1.0),
            translucency: translucency.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.0, 1.0),
        }
    }

    /// Reflectance seen from `wo` about the outward normal `n`.
    fn reflectance(&self, wo: Vec3, n: Vec3) -> f32 {
        let cos = wo.dot(n);
        let (n1, n2) = if cos >= 0.0 { (1.0, self.base.ior) } else { (self.base.ior, 1.0) };
        dielectric_reflectance(cos.abs(), n1, n2)
    }

    fn lobes(&self, f: f32) -> Lobes {
        let specular = (1.0 - f) * self.metallic + f;
        let refract = (1.0 - f) * (1.0 - self.metallic) * self.translucency;
        Lobes {
            specular,
            refract,
            diffuse: (1.0 - specular - refract).max(0.0),
        }
    }

    /// Only the diffuse lobe has a finite density; delta lobes evaluate to zero.
    pub fn evaluate(&self, wi: Vec3, wo: Vec3, n: Vec3) -> Color {
        if wi.dot(face_forward(n, wo)) <= 0.0 {
            return Color::ZERO;
        }
        let lobes = self.lobes(self.reflectance(wo, n));
        self.albedo * lobes.diffuse / PI
    }

    /// Sample about the outward normal `n`. A `wo` on the outward side means
    /// the ray is about to enter the medium.
    pub fn sample(&self, wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> Option<BsdfSample> {
        self.sample_oriented(wo, face_forward(n, wo), wo.dot(n) >= 0.0, rng)
    }

    /// `n` faces `wo`.
    fn sample_oriented(
        &self,
        wo: Vec3,
        n: Vec3,
        entering: bool,
        rng: &mut dyn RngCore,
    ) -> Option<BsdfSample> {
        let eta = if entering { 1.0 / self.base.ior } else { self.base.ior };
        let (n1, n2) = if entering { (1.0, self.base.ior) } else { (self.base.ior, 1.0) };
        let f = dielectric_reflectance(wo.dot(n).abs(), n1, n2);
        let lobes = self.lobes(f);
        let r = gen_f32(rng);
        let blend = self.roughness * self.roughness;

        let diffuse_local = cosine_sample_hemisphere(rng);
        let diffuse_dir = local_to_world(diffuse_local, n).normalize();

        let delta = |wi: Vec3, prob: f32| -> Option<BsdfSample> {
            let cos = wi.dot(n).abs();
            if cos < MIN_COS || prob <= 0.0 {
                return None;
            }
            Some(BsdfSample {
                wi,
                value: Color::splat(prob / cos),
                pdf: prob,
                specular: true,
            })
        };

        if r < lobes.specular {
            let mirror = reflect(-wo, n);
            let wi = (mirror * (1.0 - blend) + diffuse_dir * blend).normalize_or_zero();
            return delta(wi, lobes.specular);
        }

        if r < lobes.specular + lobes.refract {
            // f < 1 here, so refraction exists
            let t = refract(-wo, n, eta)?;
            let through = -diffuse_dir;
            let wi = (t * (1.0 - blend) + through * blend).normalize_or_zero();
            return delta(wi, lobes.refract);
        }

        if lobes.diffuse <= 0.0 {
            return None;
        }
        Some(BsdfSample {
            wi: diffuse_dir,
            value: self.albedo * lobes.diffuse / PI,
            pdf: lobes.diffuse * cosine_hemisphere_pdf(diffuse_local.z),
            specular: false,
        })
    }
}
