//! Cook-Torrance microfacet BRDF with a GGX distribution.

use caustic_math::Vec3;
use std::f32::consts::PI;

use crate::material::{Coefficients, Color};
use crate::sampling::face_forward;

/// Keeps the specular denominator finite at grazing angles.
const DENOM_EPSILON: f32 = 1e-4;

/// Smallest squared alpha; a perfectly smooth lobe collapses D to 0/0.
const MIN_ALPHA2: f32 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
pub struct Microfacet {
    pub base: Coefficients,
    pub albedo: Color,
    pub roughness: f32,
    pub metallic: f32,
    /// `roughness^4`, the squared GGX alpha.
    alpha2: f32,
    /// Schlick-GGX remapping `(roughness + 1)^2 / 8`.
    k: f32,
}

impl Microfacet {
    pub fn new(albedo: Color, roughness: f32, metallic: f32) -> Self {
        let roughness = roughness.clamp(0.0, 1.0);
        let r2 = roughness * roughness;
        Self {
            base: Coefficients::default(),
            albedo,
            roughness,
            metallic: metallic.clamp(0.0, 1.0),
            alpha2: (r2 * r2).max(MIN_ALPHA2),
            k: (roughness + 1.0) * (roughness + 1.0) / 8.0,
        }
    }

    pub fn with_base(mut self, base: Coefficients) -> Self {
        self.base = base;
        self
    }

    /// Trowbridge-Reitz normal distribution.
    fn distribution(&self, n_dot_h: f32) -> f32 {
        let denom = n_dot_h * n_dot_h * (self.alpha2 - 1.0) + 1.0;
        self.alpha2 / (PI * denom * denom)
    }

    /// Schlick-GGX masking for one direction.
    fn geometry(&self, cos: f32) -> f32 {
        cos / (cos * (1.0 - self.k) + self.k)
    }

    fn fresnel(&self, cos: f32) -> Color {
        let f0 = Color::splat(0.04) * (1.0 - self.metallic) + self.albedo * self.metallic;
        f0 + (Color::ONE - f0) * (1.0 - cos).clamp(0.0, 1.0).powi(5)
    }

    pub fn evaluate(&self, wi: Vec3, wo: Vec3, n: Vec3) -> Color {
        let n = face_forward(n, wo);
        let n_dot_l = n.dot(wi);
        let n_dot_v = n.dot(wo);
        if n_dot_l <= 0.0 || n_dot_v <= 0.0 {
            return Color::ZERO;
        }
        let h = (wi + wo).normalize_or_zero();
        let v_dot_h = wo.dot(h).max(0.0);
        let n_dot_h = n.dot(h).max(0.0);

        let specular = self.fresnel(v_dot_h)
            * self.distribution(n_dot_h)
            * self.geometry(n_dot_l)
            * self.geometry(n_dot_v)
            / (4.0 * n_dot_l * n_dot_v + DENOM_EPSILON);
        self.albedo / PI + specular
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precomputed_terms() {
        let m = Microfacet::new(Color::ONE, 0.5, 0.0);
        assert!((m.alpha2 - 0.0625).abs() < 1e-6);
        assert!((m.k - 2.25 / 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_surface_stays_finite_at_normal_incidence() {
        let m = Microfacet::new(Color::ONE, 0.0, 0.0);
        let f = m.evaluate(Vec3::Z, Vec3::Z, Vec3::Z);
        assert!(f.is_finite(), "{f:?}");
        assert!(f.x > 0.0);
    }

    #[test]
    fn test_below_horizon_is_black() {
        let m = Microfacet::new(Color::ONE, 0.3, 0.5);
        assert_eq!(m.evaluate(-Vec3::Z, Vec3::Z, Vec3::Z), Color::ZERO);
        assert_eq!(m.evaluate(Vec3::Z, -Vec3::Z, Vec3::Z), Color::ZERO);
    }

    #[test]
    fn test_highlight_peaks_at_mirror_direction() {
        let m = Microfacet::new(Color::splat(0.5), 0.2, 1.0);
        let wo = Vec3::new(1.0, 0.0, 1.0).normalize();
        let mirror = Vec3::new(-1.0, 0.0, 1.0).normalize();
        let off = Vec3::new(-0.2, 0.0, 1.0).normalize();
        assert!(m.evaluate(mirror, wo, Vec3::Z).x > m.evaluate(off, wo, Vec3::Z).x);
    }

    #[test]
    fn test_metallic_tints_fresnel() {
        let m = Microfacet::new(Color::new(1.0, 0.5, 0.0), 0.5, 1.0);
        let f = m.fresnel(1.0);
        assert!((f - Color::new(1.0, 0.5, 0.0)).length() < 1e-5);
    }
}
