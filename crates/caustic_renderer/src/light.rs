//! Light sources.
//!
//! Lights answer four questions about a shading point: which way the light
//! is, what color it is, how much distance (or cone) attenuation applies,
//! and how much of it survives occluders. Lights that take part in photon
//! mapping can also emit photons.

use caustic_math::Vec3;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::material::Color;
use crate::photon::ProjectionMap;
use crate::sampling::{cosine_sample_hemisphere, gen_f32, local_to_world, uniform_sample_sphere};
use crate::scene::Scene;
use crate::settings::RenderSettings;

/// `min(1, 1 / (c0 + c1 d + c2 d^2))` distance falloff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Falloff {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Falloff {
    fn default() -> Self {
        Self {
            constant: 0.01,
            linear: 0.0,
            quadratic: 1.0,
        }
    }
}

impl Falloff {
    pub fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Self {
            constant,
            linear,
            quadratic,
        }
    }

    pub fn attenuate(&self, distance: f32) -> f32 {
        let denom = self.constant + self.linear * distance + self.quadratic * distance * distance;
        if denom <= 0.0 {
            return 1.0;
        }
        (1.0 / denom).min(1.0)
    }
}

/// Parallel light travelling along `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Color,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Color) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Color,
    pub falloff: Falloff,
}

impl PointLight {
    pub fn new(position: Vec3, color: Color) -> Self {
        Self {
            position,
            color,
            falloff: Falloff::default(),
        }
    }

    pub fn with_falloff(mut self, falloff: Falloff) -> Self {
        self.falloff = falloff;
        self
    }
}

/// Cone of light with a smooth penumbra and a hard range cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Color,
    /// Half angle of the cone, degrees.
    pub cone_angle: f32,
    /// Width of the soft edge inside the cone, degrees.
    pub penumbra: f32,
    pub cutoff_distance: f32,
    pub falloff: Falloff,
}

impl SpotLight {
    pub fn new(position: Vec3, target: Vec3, color: Color, cone_angle: f32, penumbra: f32) -> Self {
        Self {
            position,
            direction: (target - position).normalize_or_zero(),
            color,
            cone_angle,
            penumbra: penumbra.clamp(0.0, cone_angle.max(0.0)),
            cutoff_distance: f32::INFINITY,
            falloff: Falloff::default(),
        }
    }

    pub fn with_cutoff(mut self, distance: f32) -> Self {
        self.cutoff_distance = distance;
        self
    }

    fn cone_factor(&self, p: Vec3) -> f32 {
        let to_p = (p - self.position).normalize_or_zero();
        let cos = self.direction.dot(to_p);
        let outer = self.cone_angle.to_radians().cos();
        let inner = (self.cone_angle - self.penumbra).to_radians().cos();
        if cos <= outer {
            0.0
        } else if cos >= inner {
            1.0
        } else {
            let x = (cos - outer) / (inner - outer);
            x * x * (3.0 - 2.0 * x)
        }
    }
}

/// One-sided parallelogram emitter `corner + s u + t v`, facing `u x v`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaLight {
    pub corner: Vec3,
    pub u: Vec3,
    pub v: Vec3,
    pub color: Color,
    pub falloff: Falloff,
}

impl AreaLight {
    pub fn new(corner: Vec3, u: Vec3, v: Vec3, color: Color) -> Self {
        Self {
            corner,
            u,
            v,
            color,
            falloff: Falloff::default(),
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.u.cross(self.v).normalize_or_zero()
    }

    pub fn area(&self) -> f32 {
        self.u.cross(self.v).length()
    }

    pub fn center(&self) -> Vec3 {
        self.corner + 0.5 * (self.u + self.v)
    }

    /// Uniform point on the emitting surface.
    pub fn sample_point(&self, rng: &mut dyn RngCore) -> Vec3 {
        self.corner + gen_f32(rng) * self.u + gen_f32(rng) * self.v
    }

    /// Falloff times the emitter-side cosine for light leaving `q` towards `p`.
    fn attenuation_from(&self, q: Vec3, p: Vec3) -> f32 {
        let d = p - q;
        let dist = d.length();
        if dist <= 0.0 {
            return 0.0;
        }
        let cos = self.normal().dot(d / dist).max(0.0);
        self.falloff.attenuate(dist) * cos
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
    Area(AreaLight),
    Ambient(AmbientLight),
}

/// Light arriving at a shading point from one sample of a light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// Unit direction from the shading point towards the light.
    pub direction: Vec3,
    /// Distance to the sampled point, infinite for directional lights.
    pub distance: f32,
    pub color: Color,
    /// Distance and cone attenuation in `[0, 1]`.
    pub falloff: f32,
}

/// A photon leaving a light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmittedPhoton {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Total power of the light; divided by the emitted count later.
    pub power: Color,
}

impl Light {
    /// Intensity before attenuation. Scene light scale is applied by callers.
    pub fn color(&self) -> Color {
        match self {
            Light::Directional(l) => l.color,
            Light::Point(l) => l.color,
            Light::Spot(l) => l.color,
            Light::Area(l) => l.color,
            Light::Ambient(l) => l.color,
        }
    }

    /// Unit direction from `p` towards the light (towards the centre for area
    /// lights). Zero for ambient light.
    pub fn direction_to(&self, p: Vec3) -> Vec3 {
        match self {
            Light::Directional(l) => -l.direction,
            Light::Point(l) => (l.position - p).normalize_or_zero(),
            Light::Spot(l) => (l.position - p).normalize_or_zero(),
            Light::Area(l) => (l.center() - p).normalize_or_zero(),
            Light::Ambient(_) => Vec3::ZERO,
        }
    }

    pub fn distance_to(&self, p: Vec3) -> f32 {
        match self {
            Light::Directional(_) | Light::Ambient(_) => f32::INFINITY,
            Light::Point(l) => l.position.distance(p),
            Light::Spot(l) => l.position.distance(p),
            Light::Area(l) => l.center().distance(p),
        }
    }

    pub fn distance_attenuation(&self, p: Vec3) -> f32 {
        match self {
            Light::Directional(_) | Light::Ambient(_) => 1.0,
            Light::Point(l) => l.falloff.attenuate(l.position.distance(p)),
            Light::Spot(l) => {
                let d = l.position.distance(p);
                if d > l.cutoff_distance {
                    0.0
                } else {
                    l.falloff.attenuate(d) * l.cone_factor(p)
                }
            }
            Light::Area(l) => l.attenuation_from(l.center(), p),
        }
    }

    /// Fraction of `sample` reaching `p` past occluders; transmissive
    /// occluders tint it, opaque ones block it. Ambient light is never
    /// shadowed.
    pub fn shadow_attenuation(&self, scene: &Scene, p: Vec3, sample: &LightSample, time: f32) -> Color {
        match self {
            Light::Ambient(_) => Color::ONE,
            _ => scene.transmittance(p, sample.direction, sample.distance, time),
        }
    }

    /// Shadow rays per shading point: area lights spread `child_rays`
    /// samples over their surface when distributed rays are on.
    pub fn sample_count(&self, settings: &RenderSettings) -> u32 {
        match self {
            Light::Area(_) if settings.distributed => settings.child_rays.max(1),
            _ => 1,
        }
    }

    /// Light arriving at `p`. With `jitter`, area lights are sampled at a
    /// random point; otherwise at their centre. `None` for ambient light.
    pub fn illuminate(&self, p: Vec3, jitter: Option<&mut dyn RngCore>) -> Option<LightSample> {
        match (self, jitter) {
            (Light::Ambient(_), _) => None,
            (Light::Area(l), Some(rng)) => {
                let q = l.sample_point(rng);
                let to_light = q - p;
                let distance = to_light.length();
                if distance <= 0.0 {
                    return None;
                }
                Some(LightSample {
                    direction: to_light / distance,
                    distance,
                    color: l.color,
                    falloff: l.attenuation_from(q, p),
                })
            }
            _ => Some(LightSample {
                direction: self.direction_to(p),
                distance: self.distance_to(p),
                color: self.color(),
                falloff: self.distance_attenuation(p),
            }),
        }
    }

    /// Spot and ambient lights do not emit photons.
    pub fn emits_photons(&self) -> bool {
        matches!(self, Light::Directional(_) | Light::Point(_) | Light::Area(_))
    }

    /// Total emitted power. A directional light only counts the part of
    /// its beam that falls on the projection map's footprint.
    pub fn power(&self, projection: Option<&ProjectionMap>) -> Color {
        match self {
            Light::Point(l) => l.color * 4.0 * PI,
            Light::Area(l) => l.color * PI * l.area(),
            Light::Directional(l) => projection.map_or(Color::ZERO, |m| l.color * m.footprint_area()),
            Light::Spot(_) | Light::Ambient(_) => Color::ZERO,
        }
    }

    /// Emit one photon. Directional lights need a projection map of the
    /// scene and emit nothing without one (or when it covers nothing).
    pub fn emit_photon(
        &self,
        projection: Option<&ProjectionMap>,
        rng: &mut dyn RngCore,
    ) -> Option<EmittedPhoton> {
        let (origin, direction) = match self {
            Light::Point(l) => (l.position, uniform_sample_sphere(rng)),
            Light::Area(l) => {
                let n = l.normal();
                if n == Vec3::ZERO {
                    return None;
                }
                let origin = l.sample_point(rng);
                (origin, local_to_world(cosine_sample_hemisphere(rng), n).normalize())
            }
            Light::Directional(l) => (projection?.sample_origin(rng)?, l.direction),
            Light::Spot(_) | Light::Ambient(_) => return None,
        };
        Some(EmittedPhoton {
            origin,
            direction,
            power: self.power(projection),
        })
    }
}
