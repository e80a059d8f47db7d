//! Camera for ray generation.

use caustic_math::{Ray, Vec3};
use rand::RngCore;

use crate::error::SceneError;
use crate::sampling::{concentric_sample_disk, gen_f32};

/// Pinhole or thin-lens camera.
///
/// Rays are generated for normalized image-plane coordinates: `(0, 0)` is
/// the top-left corner of the image and `(1, 1)` the bottom-right.
#[derive(Debug, Clone)]
pub struct Camera {
    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    // Lens settings
    vfov: f32,           // Vertical field of view in degrees
    aspect_ratio: f32,   // Width over height
    aperture: f32,       // Lens diameter, 0 for a pinhole
    focus_dist: f32,     // Distance from camera to plane of perfect focus
    shutter: (f32, f32), // Shutter open and close times

    // Cached computed values (set by initialize())
    u: Vec3,
    v: Vec3,
    w: Vec3,
    upper_left: Vec3,
    horizontal: Vec3,
    vertical: Vec3,
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self {
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 90.0,
            aspect_ratio: 1.0,
            aperture: 0.0,
            focus_dist: 1.0,
            shutter: (0.0, 0.0),
            u: Vec3::X,
            v: Vec3::Y,
            w: Vec3::Z,
            upper_left: Vec3::ZERO,
            horizontal: Vec3::ZERO,
            vertical: Vec3::ZERO,
        }
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Vertical field of view, degrees.
    pub fn with_fov(mut self, vfov: f32) -> Self {
        self.vfov = vfov;
        self
    }

    pub fn with_aspect(mut self, aspect_ratio: f32) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Thin lens for depth of field.
    pub fn with_lens(mut self, aperture: f32, focus_dist: f32) -> Self {
        self.aperture = aperture;
        self.focus_dist = focus_dist;
        self
    }

    /// Shutter interval for motion blur.
    pub fn with_shutter(mut self, open: f32, close: f32) -> Self {
        self.shutter = (open, close);
        self
    }

    pub fn eye(&self) -> Vec3 {
        self.look_from
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    /// Initialize the camera (must be called before generating rays).
    pub fn initialize(&mut self) -> Result<(), SceneError> {
        if !(self.aspect_ratio > 0.0 && self.aspect_ratio.is_finite()) {
            return Err(SceneError::InvalidAspectRatio(self.aspect_ratio));
        }
        let focus_dist = if self.focus_dist > 0.0 { self.focus_dist } else { 1.0 };

        // Calculate viewport dimensions
        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * focus_dist;
        let viewport_width = viewport_height * self.aspect_ratio;

        // Calculate camera basis vectors
        self.w = (self.look_from - self.look_at).normalize_or_zero();
        self.u = self.vup.cross(self.w).normalize_or_zero();
        self.v = self.w.cross(self.u);

        self.horizontal = viewport_width * self.u;
        self.vertical = -viewport_height * self.v;
        self.upper_left = self.look_from - focus_dist * self.w - self.horizontal / 2.0 - self.vertical / 2.0;
        Ok(())
    }

    /// Ray through the image-plane point `(s, t)`.
    ///
    /// The random stream is only consumed for depth of field and motion blur.
    pub fn ray_through(&self, s: f32, t: f32, rng: &mut dyn RngCore) -> Ray {
        let target = self.upper_left + s * self.horizontal + t * self.vertical;

        let origin = if self.aperture <= 0.0 {
            self.look_from
        } else {
            let p = concentric_sample_disk(rng) * (self.aperture / 2.0);
            self.look_from + p.x * self.u + p.y * self.v
        };

        let (open, close) = self.shutter;
        let time = if close > open {
            open + gen_f32(rng) * (close - open)
        } else {
            open
        };

        Ray::new(origin, target - origin).with_time(time)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_camera_rejects_bad_aspect() {
        let mut camera = Camera::new().with_aspect(0.0);
        assert_eq!(camera.initialize(), Err(SceneError::InvalidAspectRatio(0.0)));
        let mut camera = Camera::new().with_aspect(-1.5);
        assert!(camera.initialize().is_err());
    }

    #[test]
    fn test_camera_ray_directions() {
        let mut camera = Camera::new()
            .with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_fov(90.0);
        camera.initialize().unwrap();

        let mut rng = StdRng::seed_from_u64(42);

        let center = camera.ray_through(0.5, 0.5, &mut rng);
        assert!((center.direction - -Vec3::Z).length() < 1e-5);

        // Top-left corner of a 90 degree square frustum
        let corner = camera.ray_through(0.0, 0.0, &mut rng);
        assert!((corner.direction - Vec3::new(-1.0, 1.0, -1.0).normalize()).length() < 1e-5);
        assert_eq!(corner.time, 0.0);
    }

    #[test]
    fn test_thin_lens_focuses_on_plane() {
        let mut camera = Camera::new()
            .with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_lens(0.5, 4.0);
        camera.initialize().unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let ray = camera.ray_through(0.5, 0.5, &mut rng);
            assert!(ray.origin.length() <= 0.25 + 1e-5);
            // Every lens sample converges on the focus point
            let t = -4.0 / ray.direction.z;
            assert!((ray.at(t) - Vec3::new(0.0, 0.0, -4.0)).length() < 1e-4);
        }
    }

    #[test]
    fn test_shutter_times() {
        let mut camera = Camera::new().with_shutter(1.0, 2.0);
        camera.initialize().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let ray = camera.ray_through(0.2, 0.7, &mut rng);
            assert!((1.0..=2.0).contains(&ray.time));
        }
    }
}
