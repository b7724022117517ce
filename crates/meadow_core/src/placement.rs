//! Candidate generators.
//!
//! Fill the candidate buffer once per configuration: a terrain-following
//! grid for grass and a ring scatter for props. Both are deterministic for a
//! given seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::FieldConfig;
use crate::error::{CullError, CullResult};
use crate::instance::BladeInstance;

/// Row-major height samples in `0..=1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    width: u32,
    height: u32,
    samples: Vec<f32>,
}

impl Heightmap {
    /// Wraps a sample grid.
    ///
    /// # Errors
    ///
    /// [`CullError::InvalidConfig`] if the grid is empty or `samples` has
    /// the wrong length.
    pub fn new(width: u32, height: u32, samples: Vec<f32>) -> CullResult<Self> {
        let expected = width as usize * height as usize;
        if expected == 0 || samples.len() != expected {
            return Err(CullError::InvalidConfig(format!(
                "heightmap {width}x{height} needs {expected} samples, got {}",
                samples.len()
            )));
        }
        Ok(Self { width, height, samples })
    }

    /// A 1x1 map at height zero.
    #[must_use]
    pub fn flat() -> Self {
        Self {
            width: 1,
            height: 1,
            samples: vec![0.0],
        }
    }

    /// Builds a map from `f(x, y)`.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self { width, height, samples }
    }

    /// Sample columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Sample rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn texel(&self, x: u32, y: u32) -> f32 {
        self.samples[(y * self.width + x) as usize]
    }

    /// Bilinear sample at `(u, v)` in `0..=1`, clamped at the edges.
    #[must_use]
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let fx = u.clamp(0.0, 1.0) * (self.width - 1) as f32;
        let fy = v.clamp(0.0, 1.0) * (self.height - 1) as f32;

        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let top = self.texel(x0, y0) * (1.0 - tx) + self.texel(x1, y0) * tx;
        let bottom = self.texel(x0, y1) * (1.0 - tx) + self.texel(x1, y1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

/// Square grid of blades covering the terrain, centred on the origin.
#[derive(Debug, Clone)]
pub struct FieldGenerator {
    config: FieldConfig,
}

impl FieldGenerator {
    /// Creates a generator.
    #[must_use]
    pub const fn new(config: FieldConfig) -> Self {
        Self { config }
    }

    /// Generates `field_size²` blades, row by row.
    ///
    /// # Errors
    ///
    /// See [`FieldConfig::instance_count`].
    pub fn generate(&self, heightmap: &Heightmap) -> CullResult<Vec<BladeInstance>> {
        let count = self.config.instance_count()?;
        let side = self.config.field_size()?;
        let spacing = self.config.spacing()?;
        let terrain = self.config.terrain_size;
        let half = terrain * 0.5;
        let jitter = self.config.jitter * spacing;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let mut blades = Vec::with_capacity(count as usize);
        for row in 0..side {
            for col in 0..side {
                let (jx, jz) = if jitter > 0.0 {
                    (rng.gen_range(-0.5f32..0.5) * jitter, rng.gen_range(-0.5f32..0.5) * jitter)
                } else {
                    (0.0, 0.0)
                };
                let x = (col as f32 + 0.5) * spacing + jx - half;
                let z = (row as f32 + 0.5) * spacing + jz - half;
                let y = heightmap.sample((x + half) / terrain, (z + half) / terrain) * self.config.height_scale;
                blades.push(BladeInstance::new([x, y, z], self.config.blade_scale));
            }
        }

        tracing::debug!(count, side, spacing, "generated field");
        Ok(blades)
    }
}

/// Ring scatter of small props around the origin.
#[derive(Debug, Clone, Copy)]
pub struct ScatterGenerator {
    count: u32,
    seed: u64,
}

impl ScatterGenerator {
    /// Inner ring radius.
    pub const MIN_RADIUS: f32 = 20.0;
    /// Outer ring radius (exclusive).
    pub const MAX_RADIUS: f32 = 100.0;
    /// Height range half-extent.
    pub const HEIGHT_RANGE: f32 = 2.0;
    /// Smallest prop size.
    pub const MIN_SIZE: f32 = 0.05;
    /// Largest prop size (exclusive).
    pub const MAX_SIZE: f32 = 0.25;

    /// Creates a generator for `count` props.
    #[must_use]
    pub const fn new(count: u32, seed: u64) -> Self {
        Self { count, seed }
    }

    /// Generates the props.
    #[must_use]
    pub fn generate(&self) -> Vec<BladeInstance> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        (0..self.count)
            .map(|_| {
                let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                let radius = rng.gen_range(Self::MIN_RADIUS..Self::MAX_RADIUS);
                let height = rng.gen_range(-Self::HEIGHT_RANGE..Self::HEIGHT_RANGE);
                let size = rng.gen_range(Self::MIN_SIZE..Self::MAX_SIZE);
                BladeInstance::new([angle.cos() * radius, height, angle.sin() * radius], size)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bilinear_midpoint() {
        let map = Heightmap::new(2, 2, vec![0.0, 1.0, 0.0, 1.0]).unwrap();
        assert!((map.sample(0.5, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(map.sample(-1.0, 0.0), 0.0);
        assert_eq!(map.sample(2.0, 2.0), 1.0);
    }

    #[test]
    fn test_heightmap_size_checked() {
        assert!(Heightmap::new(3, 3, vec![0.0; 8]).is_err());
        assert!(Heightmap::new(0, 3, Vec::new()).is_err());
    }

    #[test]
    fn test_field_grid() {
        let config = FieldConfig {
            terrain_size: 32.0,
            density: 2,
            height_scale: 10.0,
            ..FieldConfig::default()
        };
        let blades = FieldGenerator::new(config).generate(&Heightmap::from_fn(4, 4, |_, _| 0.5)).unwrap();

        // 32 / 16 * 2 = 4 per side, spacing 8
        assert_eq!(blades.len(), 16);
        assert_eq!(blades[0].position(), [-12.0, 5.0, -12.0]);
        assert_eq!(blades[15].position(), [12.0, 5.0, 12.0]);
    }

    #[test]
    fn test_jitter_is_deterministic_and_bounded() {
        let config = FieldConfig {
            terrain_size: 64.0,
            jitter: 1.0,
            ..FieldConfig::default()
        };
        let a = FieldGenerator::new(config.clone()).generate(&Heightmap::flat()).unwrap();
        let b = FieldGenerator::new(config).generate(&Heightmap::flat()).unwrap();
        assert_eq!(a, b);

        // Cell centres at 8, 24, ...; jitter at most half a 16-unit cell
        let p = a[0].position();
        assert!((p[0] - -24.0).abs() <= 8.0);
        assert!((p[2] - -24.0).abs() <= 8.0);
    }

    #[test]
    fn test_scatter_ranges() {
        let props = ScatterGenerator::new(500, 7).generate();
        assert_eq!(props.len(), 500);
        for prop in &props {
            let p = prop.position();
            let r = (p[0] * p[0] + p[2] * p[2]).sqrt();
            assert!(r >= ScatterGenerator::MIN_RADIUS - 1e-3 && r < ScatterGenerator::MAX_RADIUS + 1e-3);
            assert!(p[1].abs() <= ScatterGenerator::HEIGHT_RANGE);
            assert!(prop.position_size[3] >= ScatterGenerator::MIN_SIZE);
        }
        assert_eq!(props, ScatterGenerator::new(500, 7).generate());
    }
}
