//! Surface materials.
//!
//! A closed set of BSDF variants sharing one interface: `evaluate` the
//! scattering function, importance-`sample` a new direction, and `shade` a
//! hit with direct illumination for the Whitted integrator.

use caustic_math::{Ray, Vec3, RAY_EPSILON};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::ops::{Add, Mul};

use crate::dielectric::FresnelDielectric;
use crate::hit::Intersection;
use crate::light::Light;
use crate::microfacet::Microfacet;
use crate::sampling::{
    cosine_hemisphere_pdf, cosine_sample_hemisphere, face_forward, local_to_world, reflect,
    uniform_sample_sphere,
};
use crate::scene::Scene;
use crate::settings::RenderSettings;

/// Color type alias (linear RGB, nominally 0-1)
pub type Color = Vec3;

/// Coefficient block shared by every material variant.
///
/// Coefficients interpolate linearly, which is how meshes blend per-vertex
/// materials across a face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coefficients {
    pub emissive: Color,
    pub ambient: Color,
    pub specular: Color,
    pub diffuse: Color,
    pub reflective: Color,
    pub transmissive: Color,
    /// Beer's-law absorption per unit distance inside the medium.
    pub absorb: Color,
    /// Phong exponent in `[0, 1]`, scaled by 256 when shading.
    pub shininess: f32,
    pub ior: f32,
    /// Radius of the random perturbation applied to mirror reflections.
    pub glossiness: f32,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            emissive: Color::ZERO,
            ambient: Color::ZERO,
            specular: Color::ZERO,
            diffuse: Color::ZERO,
            reflective: Color::ZERO,
            transmissive: Color::ZERO,
            absorb: Color::ZERO,
            shininess: 0.0,
            ior: 1.0,
            glossiness: 0.0,
        }
    }
}

impl Coefficients {
    /// A plain Lambertian surface.
    pub fn diffuse(kd: Color) -> Self {
        Self {
            diffuse: kd,
            ..Default::default()
        }
    }

    /// A perfect mirror.
    pub fn mirror(kr: Color) -> Self {
        Self {
            reflective: kr,
            ..Default::default()
        }
    }

    /// Clear dielectric with the given index of refraction.
    pub fn glass(ior: f32) -> Self {
        Self {
            transmissive: Color::ONE,
            ior,
            ..Default::default()
        }
    }

    pub fn is_reflective(&self) -> bool {
        self.reflective != Color::ZERO
    }

    pub fn is_transmissive(&self) -> bool {
        self.transmissive != Color::ZERO
    }
}

impl Add for Coefficients {
    type Output = Coefficients;

    fn add(self, o: Coefficients) -> Coefficients {
        Coefficients {
            emissive: self.emissive + o.emissive,
            ambient: self.ambient + o.ambient,
            specular: self.specular + o.specular,
            diffuse: self.diffuse + o.diffuse,
            reflective: self.reflective + o.reflective,
            transmissive: self.transmissive + o.transmissive,
            absorb: self.absorb + o.absorb,
            shininess: self.shininess + o.shininess,
            ior: self.ior + o.ior,
            glossiness: self.glossiness + o.glossiness,
        }
    }
}

impl Mul<f32> for Coefficients {
    type Output = Coefficients;

    fn mul(self, s: f32) -> Coefficients {
        Coefficients {
            emissive: self.emissive * s,
            ambient: self.ambient * s,
            specular: self.specular * s,
            diffuse: self.diffuse * s,
            reflective: self.reflective * s,
            transmissive: self.transmissive * s,
            absorb: self.absorb * s,
            shininess: self.shininess * s,
            ior: self.ior * s,
            glossiness: self.glossiness * s,
        }
    }
}

/// An importance-sampled scattering direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsdfSample {
    /// Unit direction away from the surface.
    pub wi: Vec3,
    /// Scattering value for `wi`.
    pub value: Color,
    /// Probability density of having picked `wi`; positive whenever `value` is non-zero.
    pub pdf: f32,
    /// True for mirror/refraction lobes, where light sampling cannot help.
    pub specular: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    /// Lambert diffuse plus Blinn-Phong highlight.
    Phong(Coefficients),
    /// Cook-Torrance GGX.
    Microfacet(Microfacet),
    /// Stochastic reflect / refract / diffuse routing.
    Dielectric(FresnelDielectric),
}

impl Material {
    pub fn coefficients(&self) -> &Coefficients {
        match self {
            Material::Phong(c) => c,
            Material::Microfacet(m) => &m.base,
            Material::Dielectric(d) => &d.base,
        }
    }

    /// Color used when photons deposit on this surface.
    pub fn diffuse_albedo(&self) -> Color {
        match self {
            Material::Phong(c) => c.diffuse,
            Material::Microfacet(m) => m.albedo,
            Material::Dielectric(d) => d.albedo,
        }
    }

    /// Copy with the diffuse color replaced, e.g. by a solid texture sample.
    pub fn with_diffuse(&self, kd: Color) -> Material {
        let mut out = self.clone();
        match &mut out {
            Material::Phong(c) => c.diffuse = kd,
            Material::Microfacet(m) => m.albedo = kd,
            Material::Dielectric(d) => d.albedo = kd,
        }
        out
    }

    pub fn is_transmissive(&self) -> bool {
        match self {
            Material::Dielectric(d) => d.translucency > 0.0 || d.base.is_transmissive(),
            other => other.coefficients().is_transmissive(),
        }
    }

    /// Color let through by shadow rays and refracted photons.
    pub fn transmission(&self) -> Color {
        match self {
            Material::Dielectric(d) if !d.base.is_transmissive() => {
                Color::splat(d.translucency * (1.0 - d.metallic))
            }
            other => other.coefficients().transmissive,
        }
    }

    /// Schlick reflectance seen from `wo` (pointing away from the surface)
    /// about the outward normal `n`. Returns 1 under total internal reflection.
    pub fn fresnel(&self, wo: Vec3, n: Vec3) -> f32 {
        let ior = self.coefficients().ior;
        let cos = wo.dot(n);
        let (n1, n2) = if cos >= 0.0 { (1.0, ior) } else { (ior, 1.0) };
        dielectric_reflectance(cos.abs(), n1, n2)
    }

    /// `kr + (1 - kr) F` for surfaces that reflect or transmit; plain `kr`
    /// (zero) for everything else.
    pub fn fresnel_reflective(&self, wo: Vec3, n: Vec3) -> Color {
        let c = self.coefficients();
        if !c.is_reflective() && !c.is_transmissive() {
            return c.reflective;
        }
        c.reflective + (Color::ONE - c.reflective) * self.fresnel(wo, n)
    }

    /// Scattering value for light arriving along `wi` and leaving along `wo`,
    /// both pointing away from the surface. `n` is the outward normal; every
    /// variant orients it towards `wo` itself.
    pub fn evaluate(&self, wi: Vec3, wo: Vec3, n: Vec3) -> Color {
        match self {
            Material::Phong(c) => {
                if wi.dot(face_forward(n, wo)) > 0.0 {
                    c.diffuse / PI
                } else {
                    Color::ZERO
                }
            }
            Material::Microfacet(m) => m.evaluate(wi, wo, n),
            Material::Dielectric(d) => d.evaluate(wi, wo, n),
        }
    }

    /// Importance-sample an incoming direction about the outward normal `n`.
    pub fn sample(&self, wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> Option<BsdfSample> {
        match self {
            Material::Phong(_) | Material::Microfacet(_) => {
                let local = cosine_sample_hemisphere(rng);
                let pdf = cosine_hemisphere_pdf(local.z);
                if pdf <= 0.0 {
                    return None;
                }
                let wi = local_to_world(local, face_forward(n, wo)).normalize();
                let value = self.evaluate(wi, wo, n);
                Some(BsdfSample {
                    wi,
                    value,
                    pdf,
                    specular: false,
                })
            }
            Material::Dielectric(d) => d.sample(wo, n, rng),
        }
    }

    /// Direct illumination at `hit` from every scene light.
    pub fn shade(
        &self,
        scene: &Scene,
        ray: &Ray,
        hit: &Intersection,
        settings: &RenderSettings,
        rng: &mut dyn RngCore,
    ) -> Color {
        let wo = -ray.direction;
        match self {
            Material::Phong(c) => {
                let exponent = c.shininess * 256.0;
                let (ambient, direct) = direct_lighting(scene, ray, hit, settings, rng, |wi, n| {
                    let lambert = wi.dot(n).max(0.0);
                    let h = (wi + wo).normalize_or_zero();
                    let highlight = h.dot(n).max(0.0).powf(exponent);
                    c.diffuse * lambert + c.specular * highlight
                });
                c.emissive + c.ambient * ambient + direct
            }
            Material::Microfacet(m) => {
                let (ambient, direct) = direct_lighting(scene, ray, hit, settings, rng, |wi, n| {
                    m.evaluate(wi, wo, n) * wi.dot(n).max(0.0)
                });
                m.base.emissive + m.albedo * ambient + direct
            }
            Material::Dielectric(d) => {
                let (ambient, direct) = direct_lighting(scene, ray, hit, settings, rng, |wi, n| {
                    d.albedo * wi.dot(n).max(0.0)
                });
                d.base.emissive + d.base.ambient * ambient + direct
            }
        }
    }
}

/// Mirror direction of `d` about `n`, optionally perturbed for glossy
/// reflection. Perturbations that dip below the surface fall back to the
/// mirror direction.
pub fn glossy_reflect(d: Vec3, n: Vec3, glossiness: f32, rng: &mut dyn RngCore) -> Vec3 {
    let mirror = reflect(d, n).normalize();
    if glossiness <= 0.0 {
        return mirror;
    }
    let jittered = (mirror + uniform_sample_sphere(rng) * glossiness).normalize_or_zero();
    if jittered.dot(n) * mirror.dot(n) > 0.0 {
        jittered
    } else {
        mirror
    }
}

/// Schlick's approximation with total internal reflection detection.
pub(crate) fn dielectric_reflectance(cos_i: f32, n1: f32, n2: f32) -> f32 {
    let r0 = ((n1 - n2) / (n1 + n2)).powi(2);
    let mut cos = cos_i.clamp(0.0, 1.0);
    if n1 > n2 {
        let eta = n1 / n2;
        let sin2_t = eta * eta * (1.0 - cos * cos);
        if sin2_t > 1.0 {
            return 1.0;
        }
        cos = (1.0 - sin2_t).sqrt();
    }
    r0 + (1.0 - r0) * (1.0 - cos).powi(5)
}

/// Sum of ambient light colors and of `response(wi, n) * light color *
/// attenuation` over every other light. `n` is the shading normal facing
/// the viewer.
fn direct_lighting(
    scene: &Scene,
    ray: &Ray,
    hit: &Intersection,
    settings: &RenderSettings,
    rng: &mut dyn RngCore,
    mut response: impl FnMut(Vec3, Vec3) -> Color,
) -> (Color, Color) {
    let n = hit.facing_normal(ray);
    let p = hit.point(ray) + n * RAY_EPSILON;
    let options = scene.options();
    let mut ambient = Color::ZERO;
    let mut direct = Color::ZERO;

    for light in scene.lights() {
        if let Light::Ambient(a) = light {
            ambient += a.color * options.light_scale;
            continue;
        }

        let samples = light.sample_count(settings);
        let mut acc = Color::ZERO;
        for _ in 0..samples {
            let jitter: Option<&mut dyn RngCore> = if samples > 1 { Some(&mut *rng) } else { None };
            let Some(sample) = light.illuminate(p, jitter) else {
                continue;
            };
            if options.fast_shadows && sample.direction.dot(n) <= 0.0 {
                continue;
            }
            let lambert = sample.direction.dot(n);
            if lambert <= 0.0 || sample.falloff <= 0.0 {
                continue;
            }
            let shadow = light.shadow_attenuation(scene, p, &sample, ray.time);
            if shadow == Color::ZERO {
                continue;
            }
            acc += response(sample.direction, n) * sample.color * shadow * sample.falloff;
        }
        direct += acc * options.light_scale / samples as f32;
    }

    (ambient, direct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_coefficients_interpolate() {
        let a = Coefficients::diffuse(Color::new(1.0, 0.0, 0.0));
        let b = Coefficients::diffuse(Color::new(0.0, 0.0, 1.0));
        let mid = a * 0.5 + b * 0.5;
        assert_eq!(mid.diffuse, Color::new(0.5, 0.0, 0.5));
        assert!((mid.ior - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reflectance_normal_incidence_and_tir() {
        let r = dielectric_reflectance(1.0, 1.0, 1.5);
        assert!((r - 0.04).abs() < 1e-4);
        // Leaving glass at a grazing angle
        assert_eq!(dielectric_reflectance(0.1, 1.5, 1.0), 1.0);
    }

    #[test]
    fn test_fresnel_reflective_only_for_specular_surfaces() {
        let matte = Material::Phong(Coefficients::diffuse(Color::ONE));
        assert_eq!(matte.fresnel_reflective(Vec3::Z, Vec3::Z), Color::ZERO);

        let glass = Material::Phong(Coefficients::glass(1.5));
        let r = glass.fresnel_reflective(Vec3::Z, Vec3::Z);
        assert!((r.x - 0.04).abs() < 1e-4);
        let grazing = glass.fresnel_reflective(Vec3::new(1.0, 0.0, 0.01).normalize(), Vec3::Z);
        assert!(grazing.x > 0.8);
    }

    #[test]
    fn test_phong_sample_pdf_positive_when_value_nonzero() {
        let mat = Material::Phong(Coefficients::diffuse(Color::splat(0.5)));
        let mut rng = StdRng::seed_from_u64(3);
        for wo in [Vec3::Y, -Vec3::Y] {
            for _ in 0..200 {
                let s = mat.sample(wo, Vec3::Y, &mut rng).unwrap();
                assert!((s.wi.length() - 1.0).abs() < 1e-4);
                if s.value != Color::ZERO {
                    assert!(s.pdf > 0.0);
                }
                // Scatters back to the viewer's side
                assert!(s.wi.dot(wo) >= 0.0);
            }
        }
    }

    #[test]
    fn test_lambert_estimator_is_albedo() {
        // E[f cos / pdf] over cosine sampling is the albedo
        let kd = Color::new(0.8, 0.4, 0.2);
        let mat = Material::Phong(Coefficients::diffuse(kd));
        let mut rng = StdRng::seed_from_u64(5);
        let mut sum = Color::ZERO;
        let n = 5000;
        for _ in 0..n {
            if let Some(s) = mat.sample(Vec3::Z, Vec3::Z, &mut rng) {
                sum += s.value * s.wi.dot(Vec3::Z) / s.pdf;
            }
        }
        let mean = sum / n as f32;
        assert!((mean - kd).abs().max_element() < 0.02, "{mean:?}");
    }

    #[test]
    fn test_glossy_reflect_stays_in_hemisphere() {
        let mut rng = StdRng::seed_from_u64(9);
        let d = Vec3::new(1.0, -1.0, 0.0).normalize();
        assert!((glossy_reflect(d, Vec3::Y, 0.0, &mut rng) - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-5);
        for _ in 0..100 {
            assert!(glossy_reflect(d, Vec3::Y, 0.5, &mut rng).y > 0.0);
        }
    }
}
