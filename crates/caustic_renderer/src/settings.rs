//! Render, photon-map and scene tunables.
//!
//! Plain structs with defaults and `with_*` builders. Drivers may persist
//! them through serde; values are checked with `validate()` before use.

use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::material::Color;

/// Highest supported antialiasing exponent (`2^5 = 32` samples per pixel).
pub const MAX_AA_EXPONENT: u32 = 5;

/// Which integrator turns camera rays into radiance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IntegratorMode {
    #[default]
    Whitted,
    PathTrace,
    /// Whitted plus caustic irradiance from the photon map.
    PhotonMapped,
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    /// Whitted recursion limit
    pub max_depth: u32,
    /// Whitted stops recursing once every channel of the path weight drops below this
    pub threshold: Color,
    /// `2^aa_exponent` samples per pixel
    pub aa_exponent: u32,
    /// Uniform random offsets instead of the fixed multisample pattern
    pub jitter: bool,
    /// Russian-roulette survival probability for path tracing
    pub survival_probability: f32,
    pub max_bounces: u32,
    /// Distributed rays for glossy reflection and soft area-light shadows
    pub distributed: bool,
    pub child_rays: u32,
    pub background: Color,
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            max_depth: 3,
            threshold: Color::ZERO,
            aa_exponent: 0,
            jitter: false,
            survival_probability: 0.7,
            max_bounces: 32,
            distributed: false,
            child_rays: 10,
            background: Color::ZERO,
            seed: 0,
        }
    }
}

impl RenderSettings {
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_depth(mut self, max_depth: u32, threshold: Color) -> Self {
        self.max_depth = max_depth;
        self.threshold = threshold;
        self
    }

    pub fn with_antialiasing(mut self, exponent: u32, jitter: bool) -> Self {
        self.aa_exponent = exponent;
        self.jitter = jitter;
        self
    }

    pub fn with_path_tracing(mut self, survival_probability: f32, max_bounces: u32) -> Self {
        self.survival_probability = survival_probability;
        self.max_bounces = max_bounces;
        self
    }

    pub fn with_distributed(mut self, enabled: bool, child_rays: u32) -> Self {
        self.distributed = enabled;
        self.child_rays = child_rays;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Samples per pixel implied by the antialiasing exponent.
    pub fn samples_per_pixel(&self) -> u32 {
        1 << self.aa_exponent.min(MAX_AA_EXPONENT)
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        if self.width == 0 {
            return Err(invalid("width", self.width));
        }
        if self.height == 0 {
            return Err(invalid("height", self.height));
        }
        if self.aa_exponent > MAX_AA_EXPONENT {
            return Err(invalid("aa_exponent", self.aa_exponent));
        }
        if !(self.survival_probability > 0.0 && self.survival_probability <= 1.0) {
            return Err(invalid("survival_probability", self.survival_probability));
        }
        if self.max_bounces == 0 {
            return Err(invalid("max_bounces", self.max_bounces));
        }
        if self.child_rays == 0 {
            return Err(invalid("child_rays", self.child_rays));
        }
        if !self.threshold.is_finite() || self.threshold.min_element() < 0.0 {
            return Err(invalid("threshold", format!("{:?}", self.threshold)));
        }
        Ok(())
    }
}

/// Photon-map configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotonSettings {
    /// Photons to store
    pub photon_count: usize,
    /// Neighbours gathered per irradiance estimate
    pub neighbors: usize,
    /// Largest gather radius
    pub max_radius: f32,
    /// Bounces traced per photon before it is dropped
    pub max_bounces: u32,
    /// Multiplier on every photon's power
    pub flux_scale: f32,
    /// Emission stops after `photon_count * emission_budget` photons
    pub emission_budget: usize,
}

impl Default for PhotonSettings {
    fn default() -> Self {
        Self {
            photon_count: 40_000,
            neighbors: 50,
            max_radius: 1.0,
            max_bounces: 16,
            flux_scale: 1.0,
            emission_budget: 64,
        }
    }
}

impl PhotonSettings {
    pub fn new(photon_count: usize, neighbors: usize, max_radius: f32) -> Self {
        Self {
            photon_count,
            neighbors,
            max_radius,
            ..Default::default()
        }
    }

    pub fn with_flux_scale(mut self, flux_scale: f32) -> Self {
        self.flux_scale = flux_scale;
        self
    }

    pub fn with_max_bounces(mut self, max_bounces: u32) -> Self {
        self.max_bounces = max_bounces;
        self
    }

    pub fn with_emission_budget(mut self, budget: usize) -> Self {
        self.emission_budget = budget;
        self
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        if self.photon_count == 0 {
            return Err(invalid("photon_count", self.photon_count));
        }
        if self.neighbors == 0 {
            return Err(invalid("neighbors", self.neighbors));
        }
        if !(self.max_radius > 0.0 && self.max_radius.is_finite()) {
            return Err(invalid("max_radius", self.max_radius));
        }
        if self.max_bounces == 0 {
            return Err(invalid("photon max_bounces", self.max_bounces));
        }
        if !(self.flux_scale >= 0.0 && self.flux_scale.is_finite()) {
            return Err(invalid("flux_scale", self.flux_scale));
        }
        if self.emission_budget == 0 {
            return Err(invalid("emission_budget", self.emission_budget));
        }
        Ok(())
    }
}

/// Scene-wide options supplied by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    /// Multiplies every light's color
    pub light_scale: f32,
    /// Skip shadow rays towards lights behind the shading normal
    pub fast_shadows: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            light_scale: 1.0,
            fast_shadows: false,
        }
    }
}

impl SceneOptions {
    pub fn with_light_scale(mut self, scale: f32) -> Self {
        self.light_scale = scale;
        self
    }

    pub fn with_fast_shadows(mut self, enabled: bool) -> Self {
        self.fast_shadows = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        if !(self.light_scale >= 0.0 && self.light_scale.is_finite()) {
            return Err(invalid("light_scale", self.light_scale));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, value: impl ToString) -> SceneError {
    SceneError::InvalidParameter {
        name,
        value: value.to_string(),
    }
}
