//! Random sampling helpers shared by the integrators, materials and lights.
//!
//! All functions take `&mut dyn RngCore` so render workers can hand in their
//! own seeded generator.

use caustic_math::Vec3;
use rand::{Rng, RngCore};
use std::f32::consts::PI;

/// Uniform float in `[0, 1)`.
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}

/// Uniform direction on the unit sphere.
pub fn uniform_sample_sphere(rng: &mut dyn RngCore) -> Vec3 {
    let z = 1.0 - 2.0 * gen_f32(rng);
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * gen_f32(rng);
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Uniform direction on the `+z` hemisphere. pdf = 1 / 2pi.
pub fn uniform_sample_hemisphere(rng: &mut dyn RngCore) -> Vec3 {
    let z = gen_f32(rng);
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * gen_f32(rng);
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Cosine-weighted direction on the `+z` hemisphere. pdf = cos(theta) / pi.
pub fn cosine_sample_hemisphere(rng: &mut dyn RngCore) -> Vec3 {
    let d = concentric_sample_disk(rng);
    let z = (1.0 - d.x * d.x - d.y * d.y).max(0.0).sqrt();
    Vec3::new(d.x, d.y, z)
}

/// Uniform point on the unit disk (z = 0), Shirley-Chiu concentric mapping.
pub fn concentric_sample_disk(rng: &mut dyn RngCore) -> Vec3 {
    let ux = 2.0 * gen_f32(rng) - 1.0;
    let uy = 2.0 * gen_f32(rng) - 1.0;
    if ux == 0.0 && uy == 0.0 {
        return Vec3::ZERO;
    }
    let (r, theta) = if ux.abs() > uy.abs() {
        (ux, (PI / 4.0) * (uy / ux))
    } else {
        (uy, PI / 2.0 - (PI / 4.0) * (ux / uy))
    };
    Vec3::new(r * theta.cos(), r * theta.sin(), 0.0)
}

/// Pdf of [`cosine_sample_hemisphere`] for a direction with the given cosine.
#[inline]
pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta.max(0.0) / PI
}

/// Build an orthonormal basis from a unit normal (Duff et al. 2017).
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let sign = if n.z >= 0.0 { 1.0 } else { -1.0 };
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;

    let tangent = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let bitangent = Vec3::new(b, sign + n.y * n.y * a, -n.y);

    (tangent, bitangent)
}

/// Rotate a `+z`-hemisphere sample into the frame around `n`.
pub fn local_to_world(v: Vec3, n: Vec3) -> Vec3 {
    let (t, b) = orthonormal_basis(n);
    v.x * t + v.y * b + v.z * n
}

/// `n` flipped, if needed, onto the same side as `v`.
#[inline]
pub fn face_forward(n: Vec3, v: Vec3) -> Vec3 {
    if n.dot(v) < 0.0 {
        -n
    } else {
        n
    }
}

/// Mirror `v` about `n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Snell refraction of the incident unit direction `v` through a surface
/// with unit normal `n` facing against `v`, where `eta = n_incident / n_transmitted`.
///
/// Returns `None` on total internal reflection.
pub fn refract(v: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = (-v).dot(n).min(1.0);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i).max(0.0);
    if sin2_t > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some((eta * v + (eta * cos_i - cos_t) * n).normalize())
}
