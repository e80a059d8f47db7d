//! Rendering driver.
//!
//! Owns the assembled scene, the camera and an optional photon map, and turns
//! pixel coordinates into colors with the selected integrator. Whole frames
//! are rendered bucket by bucket on the rayon pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;

use crate::bucket::{generate_buckets, render_bucket, DEFAULT_BUCKET_SIZE};
use crate::camera::Camera;
use crate::error::SceneError;
use crate::material::Color;
use crate::path::PathIntegrator;
use crate::photon::PhotonMap;
use crate::sampling::gen_f32;
use crate::scene::{Scene, SceneBuilder};
use crate::settings::{IntegratorMode, PhotonSettings, RenderSettings};
use crate::whitted::WhittedIntegrator;

/// Standard multisample positions in 1/16 pixel units, indexed by the
/// antialiasing exponent.
const MSAA_1: [(i8, i8); 1] = [(0, 0)];
const MSAA_2: [(i8, i8); 2] = [(4, 4), (-4, -4)];
const MSAA_4: [(i8, i8); 4] = [(-2, -6), (6, -2), (-6, 2), (2, 6)];
const MSAA_8: [(i8, i8); 8] = [(1, -3), (-1, 3), (5, 1), (-3, -5), (-5, 5), (-7, -1), (3, 7), (7, -7)];
const MSAA_16: [(i8, i8); 16] = [
    (1, 1), (-1, -3), (-3, 2), (4, -1), (-5, -2), (2, 5), (5, 3), (3, -5),
    (-2, 6), (0, -7), (-4, -6), (-6, 4), (-8, 0), (7, -4), (6, 7), (-7, -8),
];
const MSAA_32: [(i8, i8); 32] = [
    (-4, -7), (-7, -5), (-3, -5), (-5, -4), (-1, -4), (-2, -2), (-6, -1), (-4, 0),
    (-7, 1), (-1, 2), (-6, 3), (-3, 3), (-7, 6), (-3, 6), (-5, 7), (-1, 7),
    (5, -7), (1, -6), (6, -5), (4, -4), (2, -3), (7, -2), (1, -1), (4, -1),
    (2, 1), (6, 2), (0, 4), (4, 4), (2, 5), (7, 5), (5, 6), (3, 7),
];

fn msaa_pattern(samples: u32) -> Option<&'static [(i8, i8)]> {
    match samples {
        1 => Some(&MSAA_1),
        2 => Some(&MSAA_2),
        4 => Some(&MSAA_4),
        8 => Some(&MSAA_8),
        16 => Some(&MSAA_16),
        32 => Some(&MSAA_32),
        _ => None,
    }
}

/// One 8-bit RGB pixel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Clamp a value to [0, 1] range.
#[inline]
pub fn clamp_01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Quantize a linear color to 8 bits per channel.
pub fn color_to_rgb8(color: Color) -> Rgb8 {
    Rgb8 {
        r: (255.0 * clamp_01(color.x)) as u8,
        g: (255.0 * clamp_01(color.y)) as u8,
        b: (255.0 * clamp_01(color.z)) as u8,
    }
}

/// Row-major linear color buffer. Row 0 is the top of the image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; (width * height) as usize],
        }
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    pub fn to_rgb8(&self) -> Vec<Rgb8> {
        self.pixels.iter().map(|c| color_to_rgb8(*c)).collect()
    }

    /// Flat `r, g, b, r, g, b, ...` bytes for the display layer.
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(self.to_rgb8().as_slice()).to_vec()
    }
}

/// The light-transport core: scene, camera and the optional caustic map.
#[derive(Debug)]
pub struct Renderer {
    scene: Scene,
    camera: Camera,
    settings: RenderSettings,
    photons: Option<PhotonMap>,
}

impl Renderer {
    /// Validate the tunables, set up the camera and assemble the scene.
    pub fn initialize(
        builder: SceneBuilder,
        mut camera: Camera,
        settings: RenderSettings,
    ) -> Result<Self, SceneError> {
        settings.validate()?;
        camera.initialize()?;
        let scene = builder.build()?;
        Ok(Self {
            scene,
            camera,
            settings,
            photons: None,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn photon_map(&self) -> Option<&PhotonMap> {
        self.photons.as_ref()
    }

    /// Emit, trace and index caustic photons. Replaces any previous map.
    pub fn build_photon_map(&mut self, photon_settings: &PhotonSettings) -> Result<&PhotonMap, SceneError> {
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let map = PhotonMap::build(&self.scene, photon_settings, &mut rng)?;
        Ok(self.photons.insert(map))
    }

    /// Radiance along the camera ray through image-plane point `(s, t)`.
    ///
    /// Photon-mapped mode without a built map shades like plain Whitted.
    pub fn trace(&self, s: f32, t: f32, mode: IntegratorMode, rng: &mut dyn RngCore) -> Color {
        let ray = self.camera.ray_through(s, t, rng);
        match mode {
            IntegratorMode::Whitted => WhittedIntegrator::new(&self.scene, &self.settings).radiance(&ray, rng),
            IntegratorMode::PathTrace => PathIntegrator::new(&self.scene, &self.settings).radiance(&ray, rng),
            IntegratorMode::PhotonMapped => {
                let mut integrator = WhittedIntegrator::new(&self.scene, &self.settings);
                if let Some(photons) = &self.photons {
                    integrator = integrator.with_photon_map(photons);
                }
                integrator.radiance(&ray, rng)
            }
        }
    }

    /// Average of `samples` traces spread over pixel `(x, y)`.
    pub fn render_pixel(&self, x: u32, y: u32, mode: IntegratorMode, samples: u32, rng: &mut dyn RngCore) -> Color {
        let samples = samples.max(1);
        let width = self.settings.width as f32;
        let height = self.settings.height as f32;
        let center = (x as f32 + 0.5, y as f32 + 0.5);

        let pattern = if self.settings.jitter { None } else { msaa_pattern(samples) };
        let mut pixel_color = Color::ZERO;
        for i in 0..samples as usize {
            let (dx, dy) = match pattern {
                Some(offsets) => (offsets[i].0 as f32 / 16.0, offsets[i].1 as f32 / 16.0),
                None => (gen_f32(rng) - 0.5, gen_f32(rng) - 0.5),
            };
            let s = (center.0 + dx) / width;
            let t = (center.1 + dy) / height;
            pixel_color += self.trace(s, t, mode, rng);
        }
        pixel_color / samples as f32
    }

    /// Render a whole frame in parallel with the configured seed.
    ///
    /// Returns `None` when `stop` was raised before every bucket finished.
    pub fn render_frame(&self, mode: IntegratorMode, stop: &AtomicBool) -> Option<ImageBuffer> {
        self.render_pass(mode, self.settings.seed, stop)
    }

    /// Render a whole frame in parallel, seeding each bucket from `seed`.
    pub fn render_pass(&self, mode: IntegratorMode, seed: u64, stop: &AtomicBool) -> Option<ImageBuffer> {
        let start = Instant::now();
        let width = self.settings.width;
        let height = self.settings.height;
        let buckets = generate_buckets(width, height, DEFAULT_BUCKET_SIZE);
        log::debug!("Rendering {}x{} in {} buckets ({:?})", width, height, buckets.len(), mode);

        let results: Option<Vec<_>> = buckets
            .par_iter()
            .map(|bucket| render_bucket(self, bucket, mode, seed, stop))
            .collect();

        let Some(results) = results else {
            log::info!("Render cancelled after {:.2?}", start.elapsed());
            return None;
        };

        let mut image = ImageBuffer::new(width, height);
        for result in results {
            let b = result.bucket;
            for (i, color) in result.pixels.into_iter().enumerate() {
                let i = i as u32;
                image.set(b.x + i % b.width, b.y + i / b.width, color);
            }
        }
        log::info!("Rendered {}x{} frame in {:.2?}", width, height, start.elapsed());
        Some(image)
    }

    /// Whether a render should stop.
    pub(crate) fn should_stop(stop: &AtomicBool) -> bool {
        stop.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{AmbientLight, Light, PointLight};
    use crate::material::{Coefficients, Material};
    use crate::primitive::{Primitive, Shape};
    use crate::sphere::Sphere;
    use caustic_math::{Mat4, Transform, Vec3};

    fn ball_scene(settings: RenderSettings) -> Renderer {
        let mut builder = SceneBuilder::new();
        let mut coeffs = Coefficients::diffuse(Color::new(0.8, 0.2, 0.2));
        coeffs.ambient = Color::new(0.4, 0.1, 0.1);
        let material = builder.add_material(Material::Phong(coeffs));
        builder
            .add_primitive(Primitive::new("ball", Shape::Sphere(Sphere), material))
            .unwrap();
        builder
            .add_light(Light::Ambient(AmbientLight { color: Color::ONE }))
            .unwrap();
        let camera = Camera::new()
            .with_position(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
            .with_fov(45.0);
        Renderer::initialize(builder, camera, settings).unwrap()
    }

    #[test]
    fn test_color_to_rgb8() {
        assert_eq!(color_to_rgb8(Color::ZERO), Rgb8 { r: 0, g: 0, b: 0 });
        assert_eq!(color_to_rgb8(Color::new(1.0, 2.0, -1.0)), Rgb8 { r: 255, g: 255, b: 0 });
        assert_eq!(color_to_rgb8(Color::splat(0.5)).r, 127);
    }

    #[test]
    fn test_image_bytes_are_row_major() {
        let mut image = ImageBuffer::new(2, 2);
        image.set(1, 0, Color::X);
        let bytes = image.to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[3..6], &[255, 0, 0]);
    }

    #[test]
    fn test_msaa_patterns() {
        for exponent in 0..=5 {
            let samples = 1u32 << exponent;
            let pattern = msaa_pattern(samples).unwrap();
            assert_eq!(pattern.len(), samples as usize);
            assert!(pattern.iter().all(|(x, y)| (-8..8).contains(x) && (-8..8).contains(y)));
        }
        assert!(msaa_pattern(3).is_none());
    }

    #[test]
    fn test_initialize_rejects_bad_camera() {
        let camera = Camera::new().with_aspect(-1.0);
        let err = Renderer::initialize(SceneBuilder::new(), camera, RenderSettings::default()).unwrap_err();
        assert_eq!(err, SceneError::InvalidAspectRatio(-1.0));
    }

    #[test]
    fn test_render_pixel_center_and_corner() {
        let settings = RenderSettings::default()
            .with_resolution(16, 16)
            .with_antialiasing(2, false)
            .with_background(Color::new(0.1, 0.2, 0.3));
        let renderer = ball_scene(settings);
        let mut rng = StdRng::seed_from_u64(1);

        let center = renderer.render_pixel(8, 8, IntegratorMode::Whitted, 4, &mut rng);
        assert!((center - Color::new(0.4, 0.1, 0.1)).length() < 1e-4);

        let corner = renderer.render_pixel(0, 0, IntegratorMode::Whitted, 4, &mut rng);
        assert_eq!(corner, Color::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_photon_mode_without_map_matches_whitted() {
        let renderer = ball_scene(RenderSettings::default().with_resolution(8, 8));
        let mut rng = StdRng::seed_from_u64(2);
        let a = renderer.trace(0.5, 0.5, IntegratorMode::Whitted, &mut rng);
        let b = renderer.trace(0.5, 0.5, IntegratorMode::PhotonMapped, &mut rng);
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_frame_is_deterministic() {
        let settings = RenderSettings::default().with_resolution(24, 20).with_seed(9);
        let mut builder = SceneBuilder::new();
        let material = builder.add_material(Material::Phong(Coefficients::diffuse(Color::splat(0.7))));
        builder
            .add_primitive(
                Primitive::new("ball", Shape::Sphere(Sphere), material)
                    .with_transform(Transform::from_matrix(Mat4::from_scale(Vec3::splat(1.5)))),
            )
            .unwrap();
        builder
            .add_light(Light::Point(PointLight::new(Vec3::new(0.0, 5.0, 5.0), Color::ONE)))
            .unwrap();
        let camera = Camera::new()
            .with_position(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
            .with_aspect(24.0 / 20.0);
        let renderer = Renderer::initialize(builder, camera, settings).unwrap();

        let stop = AtomicBool::new(false);
        let a = renderer.render_frame(IntegratorMode::PathTrace, &stop).unwrap();
        let b = renderer.render_frame(IntegratorMode::PathTrace, &stop).unwrap();
        assert_eq!(a.pixels.len(), 24 * 20);
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_frame_cancelled() {
        let renderer = ball_scene(RenderSettings::default().with_resolution(8, 8));
        let stop = AtomicBool::new(true);
        assert!(renderer.render_frame(IntegratorMode::Whitted, &stop).is_none());
    }
}
