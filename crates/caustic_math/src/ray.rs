use crate::{Vec3, RAY_EPSILON};

/// A ray in 3D space.
///
/// The direction is normalized at construction time; a zero direction stays
/// zero and such a ray intersects nothing. `time` selects the instant inside
/// the camera shutter for motion blur, and `medium_ior` records the index of
/// refraction of the volume the ray currently travels through (`None` means
/// vacuum/air) so nested transmissive volumes refract correctly.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub time: f32,
    pub medium_ior: Option<f32>,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            time: 0.0,
            medium_ior: None,
        }
    }

    /// Same ray sampled at a different shutter time.
    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    pub fn with_medium(mut self, ior: Option<f32>) -> Self {
        self.medium_ior = ior;
        self
    }

    /// Spawn a secondary ray from `origin`, keeping time and medium.
    ///
    /// The origin is nudged along the new direction so the ray does not
    /// immediately re-hit the surface it starts on.
    pub fn spawn(&self, origin: Vec3, direction: Vec3) -> Ray {
        let direction = direction.normalize_or_zero();
        Ray {
            origin: origin + direction * RAY_EPSILON,
            direction,
            time: self.time,
            medium_ior: self.medium_ior,
        }
    }

    /// Index of refraction of the medium the ray travels through.
    pub fn current_ior(&self) -> f32 {
        self.medium_ior.unwrap_or(1.0)
    }

    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    pub fn is_degenerate(&self) -> bool {
        self.direction == Vec3::ZERO
    }
}
