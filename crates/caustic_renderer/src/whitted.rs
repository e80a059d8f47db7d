//! Recursive Whitted-style ray tracing.

use caustic_math::Ray;
use rand::RngCore;

use crate::hit::Intersection;
use crate::material::{glossy_reflect, Color, Material};
use crate::photon::PhotonMap;
use crate::scene::Scene;
use crate::settings::RenderSettings;

/// Direct lighting plus mirror reflection and refraction, optionally with
/// caustics gathered from a photon map.
///
/// Holds only borrowed, read-only state; every call is a pure function of
/// the scene, the ray and the random stream.
#[derive(Debug, Clone, Copy)]
pub struct WhittedIntegrator<'a> {
    scene: &'a Scene,
    settings: &'a RenderSettings,
    photons: Option<&'a PhotonMap>,
}

impl<'a> WhittedIntegrator<'a> {
    pub fn new(scene: &'a Scene, settings: &'a RenderSettings) -> Self {
        Self {
            scene,
            settings,
            photons: None,
        }
    }

    /// Add caustic irradiance to diffuse surfaces.
    pub fn with_photon_map(mut self, photons: &'a PhotonMap) -> Self {
        self.photons = Some(photons);
        self
    }

    pub fn radiance(&self, ray: &Ray, rng: &mut dyn RngCore) -> Color {
        self.trace(ray, 0, Color::ONE, rng)
    }

    fn trace(&self, ray: &Ray, depth: u32, weight: Color, rng: &mut dyn RngCore) -> Color {
        if depth > self.settings.max_depth || weight.cmplt(self.settings.threshold).all() {
            return Color::ZERO;
        }
        let Some(hit) = self.scene.intersect(ray) else {
            return self.settings.background;
        };

        let material = self.scene.material_at(&hit);
        let coefficients = material.coefficients();
        let mut color = material.shade(self.scene, ray, &hit, self.settings, rng);
        if let Some(emission) = self.scene.emission(&hit) {
            color += emission;
        }

        if let Some(photons) = self.photons {
            if !coefficients.is_reflective() && !material.is_transmissive() {
                color += photons.irradiance(hit.point(ray)) * material.diffuse_albedo();
            }
        }

        let kr = material.fresnel_reflective(-ray.direction, hit.normal);
        if kr != Color::ZERO {
            color += kr * self.reflection(ray, &hit, material, depth, weight * kr, rng);
        }

        if material.is_transmissive() {
            let kt = material.transmission() * (Color::ONE - kr);
            if let Some(refracted) = hit.refracted(ray, coefficients.ior) {
                color += kt * self.trace(&refracted, depth + 1, weight * kt, rng);
            }
        }

        // The segment up to this hit ran inside the medium.
        if !hit.is_entering(ray) && coefficients.absorb != Color::ZERO {
            color *= (-coefficients.absorb * hit.t).exp();
        }
        color
    }

    /// Mirror reflection, or the average of `child_rays` glossy samples when
    /// distributed rays are on.
    fn reflection(
        &self,
        ray: &Ray,
        hit: &Intersection,
        material: &Material,
        depth: u32,
        weight: Color,
        rng: &mut dyn RngCore,
    ) -> Color {
        let glossiness = material.coefficients().glossiness;
        if !self.settings.distributed || glossiness <= 0.0 {
            return self.trace(&hit.reflected(ray), depth + 1, weight, rng);
        }

        let n = hit.facing_normal(ray);
        let p = hit.point(ray);
        let samples = self.settings.child_rays.max(1);
        let mut sum = Color::ZERO;
        for _ in 0..samples {
            let dir = glossy_reflect(ray.direction, n, glossiness, rng);
            sum += self.trace(&ray.spawn(p, dir), depth + 1, weight, rng);
        }
        sum / samples as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{AmbientLight, Light, PointLight};
    use crate::material::Coefficients;
    use crate::primitive::{Primitive, Shape};
    use crate::scene::SceneBuilder;
    use crate::sphere::Sphere;
    use caustic_math::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn single_sphere(coefficients: Coefficients, lights: Vec<Light>) -> Scene {
        let mut b = SceneBuilder::new();
        let m = b.add_material(Material::Phong(coefficients));
        b.add_primitive(Primitive::new("ball", Shape::Sphere(Sphere), m)).unwrap();
        for light in lights {
            b.add_light(light).unwrap();
        }
        b.build().unwrap()
    }

    #[test]
    fn test_miss_returns_background() {
        let scene = single_sphere(Coefficients::diffuse(Vec3::ONE), vec![]);
        let settings = RenderSettings::default().with_background(Vec3::new(0.1, 0.2, 0.3));
        let mut rng = StdRng::seed_from_u64(0);
        let c = WhittedIntegrator::new(&scene, &settings).radiance(&Ray::new(Vec3::Y * 5.0, Vec3::Y), &mut rng);
        assert_eq!(c, Vec3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_ambient_only_sphere() {
        let mut c = Coefficients::diffuse(Vec3::new(0.9, 0.9, 0.9));
        c.ambient = Vec3::new(0.2, 0.4, 0.6);
        let scene = single_sphere(c, vec![Light::Ambient(AmbientLight { color: Vec3::splat(0.5) })]);
        let settings = RenderSettings::default();
        let mut rng = StdRng::seed_from_u64(0);
        let color = WhittedIntegrator::new(&scene, &settings)
            .radiance(&Ray::new(Vec3::Z * 5.0, -Vec3::Z), &mut rng);
        assert!((color - Vec3::new(0.1, 0.2, 0.3)).length() < 1e-5);
    }

    #[test]
    fn test_depth_limit_stops_mirror_recursion() {
        // Camera inside a mirror sphere: every bounce hits the sphere again
        let scene = single_sphere(
            Coefficients::mirror(Vec3::splat(0.5)),
            vec![Light::Ambient(AmbientLight { color: Vec3::ONE })],
        );
        let mut rng = StdRng::seed_from_u64(0);
        let shallow = RenderSettings::default().with_depth(0, Vec3::ZERO).with_background(Vec3::ONE);
        let deep = RenderSettings::default().with_depth(6, Vec3::ZERO).with_background(Vec3::ONE);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(WhittedIntegrator::new(&scene, &shallow).radiance(&ray, &mut rng), Vec3::ZERO);
        assert_eq!(WhittedIntegrator::new(&scene, &deep).radiance(&ray, &mut rng), Vec3::ZERO);
    }

    #[test]
    fn test_threshold_terminates_weak_rays() {
        let scene = single_sphere(Coefficients::mirror(Vec3::splat(0.1)), vec![]);
        let settings = RenderSettings::default()
            .with_depth(10, Vec3::splat(0.5))
            .with_background(Vec3::ONE);
        let mut rng = StdRng::seed_from_u64(0);
        // The reflected ray carries weight 0.1 and is cut off
        let c = WhittedIntegrator::new(&scene, &settings).radiance(&Ray::new(Vec3::X * 5.0, -Vec3::X), &mut rng);
        assert_eq!(c, Vec3::ZERO);
    }

    #[test]
    fn test_glass_sphere_shows_background_through_it() {
        let scene = single_sphere(Coefficients::glass(1.5), vec![]);
        let settings = RenderSettings::default().with_depth(5, Vec3::ZERO).with_background(Vec3::ONE);
        let mut rng = StdRng::seed_from_u64(0);
        let c = WhittedIntegrator::new(&scene, &settings).radiance(&Ray::new(Vec3::Z * 5.0, -Vec3::Z), &mut rng);
        // Head-on: mostly transmitted, about 4% reflected at each interface
        assert!(c.x > 0.85 && c.x <= 1.0 + 1e-4, "{c:?}");
    }

    #[test]
    fn test_absorption_darkens_transmitted_light() {
        let mut glass = Coefficients::glass(1.0);
        glass.absorb = Vec3::new(1.0, 0.0, 0.0);
        let scene = single_sphere(glass, vec![]);
        let settings = RenderSettings::default().with_depth(5, Vec3::ZERO).with_background(Vec3::ONE);
        let mut rng = StdRng::seed_from_u64(0);
        let c = WhittedIntegrator::new(&scene, &settings).radiance(&Ray::new(Vec3::Z * 5.0, -Vec3::Z), &mut rng);
        // Two units of travel inside
        assert!((c.x - (-2.0f32).exp()).abs() < 1e-3, "{c:?}");
        assert!((c.y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_point_light_lights_facing_side() {
        let scene = single_sphere(
            Coefficients::diffuse(Vec3::ONE),
            vec![Light::Point(PointLight::new(Vec3::Z * 3.0, Vec3::ONE))],
        );
        let settings = RenderSettings::default();
        let mut rng = StdRng::seed_from_u64(0);
        let integrator = WhittedIntegrator::new(&scene, &settings);
        let lit = integrator.radiance(&Ray::new(Vec3::Z * 5.0, -Vec3::Z), &mut rng);
        let dark = integrator.radiance(&Ray::new(-Vec3::Z * 5.0, Vec3::Z), &mut rng);
        assert!(lit.x > 0.2);
        assert_eq!(dark, Vec3::ZERO);
    }
}
