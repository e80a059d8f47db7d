//! Progressive path tracing.
//!
//! Each iteration renders one full path-traced pass, folds it into a running
//! average, and publishes the result as a new 8-bit front frame. Publishing
//! swaps a single `Arc`, so a display thread calling [`ProgressiveRender::front`]
//! always sees a complete frame.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::material::Color;
use crate::renderer::{color_to_rgb8, Renderer, Rgb8};
use crate::settings::IntegratorMode;

#[derive(Debug)]
struct Accumulator {
    sum: Vec<Color>,
    iterations: u32,
}

#[derive(Debug)]
pub struct ProgressiveRender {
    width: u32,
    height: u32,
    back: Mutex<Accumulator>,
    front: RwLock<Arc<Vec<Rgb8>>>,
}

impl ProgressiveRender {
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = (width * height) as usize;
        Self {
            width,
            height,
            back: Mutex::new(Accumulator {
                sum: vec![Color::ZERO; pixels],
                iterations: 0,
            }),
            front: RwLock::new(Arc::new(vec![Rgb8::default(); pixels])),
        }
    }

    /// Sized to the renderer's output resolution.
    pub fn for_renderer(renderer: &Renderer) -> Self {
        let settings = renderer.settings();
        Self::new(settings.width, settings.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Completed iterations folded into the current front frame.
    pub fn iterations(&self) -> u32 {
        self.back.lock().unwrap_or_else(PoisonError::into_inner).iterations
    }

    /// The most recently published frame.
    pub fn front(&self) -> Arc<Vec<Rgb8>> {
        Arc::clone(&self.front.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run one path-traced pass and publish the new average.
    ///
    /// Returns `false` without touching the accumulated image when `stop` is
    /// raised mid-pass or the renderer resolution does not match.
    pub fn iterate(&self, renderer: &Renderer, stop: &AtomicBool) -> bool {
        let settings = renderer.settings();
        if settings.width != self.width || settings.height != self.height {
            log::warn!(
                "Progressive buffer is {}x{} but renderer outputs {}x{}",
                self.width,
                self.height,
                settings.width,
                settings.height
            );
            return false;
        }

        let mut back = self.back.lock().unwrap_or_else(PoisonError::into_inner);
        let seed = settings.seed.wrapping_add(back.iterations as u64);
        let Some(pass) = renderer.render_pass(IntegratorMode::PathTrace, seed, stop) else {
            return false;
        };

        back.iterations += 1;
        let scale = 1.0 / back.iterations as f32;
        for (sum, color) in back.sum.iter_mut().zip(&pass.pixels) {
            *sum += *color;
        }
        let frame: Vec<Rgb8> = back.sum.iter().map(|sum| color_to_rgb8(*sum * scale)).collect();

        *self.front.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(frame);
        log::debug!("Progressive iteration {} published", back.iterations);
        true
    }

    /// Drop the accumulated passes, e.g. after the camera moved.
    pub fn reset(&self) {
        let mut back = self.back.lock().unwrap_or_else(PoisonError::into_inner);
        back.sum.fill(Color::ZERO);
        back.iterations = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::material::{Coefficients, Material};
    use crate::primitive::{Primitive, Shape};
    use crate::sphere::Sphere;
    use crate::scene::SceneBuilder;
    use crate::settings::RenderSettings;
    use caustic_math::Vec3;

    fn emitter_renderer() -> Renderer {
        let mut builder = SceneBuilder::new();
        let material = builder.add_material(Material::Phong(Coefficients::diffuse(Color::splat(0.5))));
        builder
            .add_primitive(Primitive::new("lamp", Shape::Sphere(Sphere), material).with_emission(Color::ONE))
            .unwrap();
        let camera = Camera::new()
            .with_position(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
            .with_fov(30.0);
        let settings = RenderSettings::default()
            .with_resolution(8, 8)
            .with_background(Color::new(0.0, 0.0, 1.0));
        Renderer::initialize(builder, camera, settings).unwrap()
    }

    #[test]
    fn test_iterations_publish_frames() {
        let renderer = emitter_renderer();
        let progressive = ProgressiveRender::for_renderer(&renderer);
        let stop = AtomicBool::new(false);

        let before = progressive.front();
        assert!(progressive.iterate(&renderer, &stop));
        assert!(progressive.iterate(&renderer, &stop));
        assert_eq!(progressive.iterations(), 2);

        let after = progressive.front();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.len(), 64);
        // Corner sees the background, center sees the lamp
        assert_eq!(after[0], Rgb8 { r: 0, g: 0, b: 255 });
        assert_eq!(after[4 * 8 + 4], Rgb8 { r: 255, g: 255, b: 255 });
    }

    #[test]
    fn test_cancelled_iteration_keeps_front() {
        let renderer = emitter_renderer();
        let progressive = ProgressiveRender::for_renderer(&renderer);
        let before = progressive.front();
        assert!(!progressive.iterate(&renderer, &AtomicBool::new(true)));
        assert_eq!(progressive.iterations(), 0);
        assert!(Arc::ptr_eq(&before, &progressive.front()));
    }

    #[test]
    fn test_reset_and_resolution_mismatch() {
        let renderer = emitter_renderer();
        let progressive = ProgressiveRender::for_renderer(&renderer);
        assert!(progressive.iterate(&renderer, &AtomicBool::new(false)));
        progressive.reset();
        assert_eq!(progressive.iterations(), 0);

        let wrong = ProgressiveRender::new(4, 4);
        assert!(!wrong.iterate(&renderer, &AtomicBool::new(false)));
    }
}
