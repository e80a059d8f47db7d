//! Procedural solid textures evaluated at world-space points.

use caustic_math::Vec3;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt::Debug;

use crate::material::Color;
use crate::sampling::uniform_sample_sphere;

/// A color field over space. A primitive carrying one uses it as the
/// diffuse color of whatever material it is shaded with.
pub trait SolidTexture: Debug + Send + Sync {
    fn sample(&self, p: Vec3) -> Color;
}

const POINT_COUNT: usize = 256;

/// Marble-like Perlin turbulence: `0.5 (1 + sin(scale z + 10 turb(p)))`.
#[derive(Debug, Clone)]
pub struct PerlinNoise {
    gradients: Vec<Vec3>,
    perm_x: Vec<usize>,
    perm_y: Vec<usize>,
    perm_z: Vec<usize>,
    scale: f32,
    depth: u32,
}

impl PerlinNoise {
    /// Lattice drawn from `seed`, so a texture is reproducible.
    pub fn new(scale: f32, depth: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let gradients = (0..POINT_COUNT).map(|_| uniform_sample_sphere(&mut rng)).collect();
        let mut perm = || {
            let mut p: Vec<usize> = (0..POINT_COUNT).collect();
            p.shuffle(&mut rng);
            p
        };
        let (perm_x, perm_y, perm_z) = (perm(), perm(), perm());
        Self {
            gradients,
            perm_x,
            perm_y,
            perm_z,
            scale,
            depth: depth.max(1),
        }
    }

    /// Gradient noise in roughly `[-1, 1]`, zero on lattice points.
    pub fn noise(&self, p: Vec3) -> f32 {
        let cell = p.floor();
        let f = p - cell;
        let (i, j, k) = (cell.x as i64, cell.y as i64, cell.z as i64);
        let smooth = f * f * (Vec3::splat(3.0) - 2.0 * f);
        let wrap = |v: i64| (v & (POINT_COUNT as i64 - 1)) as usize;

        let mut sum = 0.0;
        for di in 0..2i64 {
            for dj in 0..2i64 {
                for dk in 0..2i64 {
                    let g = self.gradients
                        [self.perm_x[wrap(i + di)] ^ self.perm_y[wrap(j + dj)] ^ self.perm_z[wrap(k + dk)]];
                    let (fi, fj, fk) = (di as f32, dj as f32, dk as f32);
                    let weight = Vec3::new(f.x - fi, f.y - fj, f.z - fk);
                    sum += (fi * smooth.x + (1.0 - fi) * (1.0 - smooth.x))
                        * (fj * smooth.y + (1.0 - fj) * (1.0 - smooth.y))
                        * (fk * smooth.z + (1.0 - fk) * (1.0 - smooth.z))
                        * g.dot(weight);
                }
            }
        }
        sum
    }

    /// Sum of `depth` octaves of `|noise|`-weighted noise.
    pub fn turbulence(&self, p: Vec3) -> f32 {
        let mut sum = 0.0;
        let mut weight = 1.0;
        let mut q = p;
        for _ in 0..self.depth {
            sum += weight * self.noise(q);
            q *= 2.0;
            weight *= 0.5;
        }
        sum.abs()
    }
}

impl SolidTexture for PerlinNoise {
    fn sample(&self, p: Vec3) -> Color {
        Color::splat(0.5 * (1.0 + (self.scale * p.z + 10.0 * self.turbulence(p)).sin()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_vanishes_on_lattice() {
        let perlin = PerlinNoise::new(4.0, 7, 3);
        for p in [Vec3::ZERO, Vec3::new(3.0, -2.0, 7.0), Vec3::splat(255.0)] {
            assert!(perlin.noise(p).abs() < 1e-6);
        }
        assert!(perlin.noise(Vec3::new(0.3, 0.6, 0.2)).abs() <= 2.0);
    }

    #[test]
    fn test_same_seed_same_texture() {
        let a = PerlinNoise::new(4.0, 7, 11);
        let b = PerlinNoise::new(4.0, 7, 11);
        let p = Vec3::new(1.3, 0.7, -2.1);
        assert_eq!(a.sample(p), b.sample(p));
    }

    #[test]
    fn test_samples_are_grey_and_in_range() {
        let perlin = PerlinNoise::new(4.0, 7, 5);
        for i in 0..50 {
            let c = perlin.sample(Vec3::new(i as f32 * 0.37, i as f32 * 0.11, i as f32 * -0.23));
            assert!(c.x >= 0.0 && c.x <= 1.0);
            assert_eq!(c.x, c.y);
            assert_eq!(c.y, c.z);
        }
    }
}
