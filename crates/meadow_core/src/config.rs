//! # Configuration
//!
//! Startup configuration, read once from TOML. Nothing here is consulted
//! per frame; changing the field or pipeline tables means reallocating.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CullError, CullResult};
use crate::frustum::CullMode;
use crate::layout::{DispatchLayout, DEFAULT_BLOCK_SIZE, DEFAULT_GROUP_CAPACITY};

/// World units covered by one grid cell at density 1.
pub const CELL_UNITS: u32 = 16;

/// Highest accepted field density.
pub const MAX_DENSITY: u32 = 20;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeadowConfig {
    /// `[pipeline]` table.
    pub pipeline: PipelineConfig,
    /// `[field]` table.
    pub field: FieldConfig,
    /// `[cull]` table.
    pub cull: CullSettings,
}

impl MeadowConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`CullError::InvalidConfig`] on malformed TOML or out-of-range values.
    pub fn from_toml_str(text: &str) -> CullResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| CullError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`CullError::Io`] if the file cannot be read, otherwise as
    /// [`MeadowConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> CullResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CullError::Io(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            instances = config.field.instance_count().unwrap_or(0),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Checks every table.
    ///
    /// # Errors
    ///
    /// The first violation found.
    pub fn validate(&self) -> CullResult<()> {
        self.pipeline.validate()?;
        self.field.validate()?;
        self.cull.validate()?;
        // The derived layout must fit the scan tiers
        self.layout().map(|_| ())
    }

    /// Dispatch layout for the configured field.
    ///
    /// # Errors
    ///
    /// See [`FieldConfig::instance_count`] and [`DispatchLayout::new`].
    pub fn layout(&self) -> CullResult<DispatchLayout> {
        let n = self.field.instance_count()?;
        DispatchLayout::new(n, self.pipeline.block_size, self.pipeline.group_capacity)
    }
}

/// `[pipeline]`: scan constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-block capacity (B).
    pub block_size: u32,
    /// Single-pass group-scan capacity.
    pub group_capacity: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            group_capacity: DEFAULT_GROUP_CAPACITY,
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> CullResult<()> {
        // Reuse the layout checks on a trivial instance count
        DispatchLayout::new(0, self.block_size, self.group_capacity).map(|_| ())
    }
}

/// `[field]`: the placement grid feeding the candidate buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Side length of the square terrain in world units.
    pub terrain_size: f32,
    /// Instances per 16 world units, 1..=20.
    pub density: u32,
    /// Heightmap sample to world height multiplier.
    pub height_scale: f32,
    /// Random offset as a fraction of a cell, 0..=1.
    pub jitter: f32,
    /// Size written into every payload.
    pub blade_scale: f32,
    /// Seed for jitter.
    pub seed: u64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            terrain_size: 512.0,
            density: 1,
            height_scale: 60.0,
            jitter: 0.0,
            blade_scale: 1.0,
            seed: 42,
        }
    }
}

impl FieldConfig {
    /// Instances along one side of the grid.
    ///
    /// # Errors
    ///
    /// [`CullError::TooManyInstances`] if the side does not fit in `u32`.
    pub fn field_size(&self) -> CullResult<u32> {
        let whole = if self.terrain_size.is_finite() && self.terrain_size > 0.0 {
            self.terrain_size.floor() as u64
        } else {
            0
        };
        let side = (whole / u64::from(CELL_UNITS)).saturating_mul(u64::from(self.density));
        u32::try_from(side).map_err(|_| CullError::TooManyInstances {
            requested: side.saturating_mul(side),
            max: u64::from(u32::MAX),
        })
    }

    /// World distance between neighbouring grid points.
    ///
    /// # Errors
    ///
    /// See [`FieldConfig::field_size`].
    pub fn spacing(&self) -> CullResult<f32> {
        Ok(match self.field_size()? {
            0 => 0.0,
            n => self.terrain_size / n as f32,
        })
    }

    /// Total instance count (N = field size squared).
    ///
    /// # Errors
    ///
    /// - [`CullError::EmptyField`] if N would be zero.
    /// - [`CullError::TooManyInstances`] if N does not fit in `u32`.
    pub fn instance_count(&self) -> CullResult<u32> {
        let side = u64::from(self.field_size()?);
        if side == 0 {
            return Err(CullError::EmptyField {
                terrain_size: self.terrain_size.max(0.0) as u32,
                density: self.density,
            });
        }
        let total = side * side;
        u32::try_from(total).map_err(|_| CullError::TooManyInstances {
            requested: total,
            max: u64::from(u32::MAX),
        })
    }

    fn validate(&self) -> CullResult<()> {
        if !(1..=MAX_DENSITY).contains(&self.density) {
            return Err(CullError::InvalidConfig(format!(
                "field.density {} outside 1..={MAX_DENSITY}",
                self.density
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(CullError::InvalidConfig(format!("field.jitter {} outside 0..=1", self.jitter)));
        }
        if !self.height_scale.is_finite() {
            return Err(CullError::InvalidConfig(format!("field.height_scale {} must be finite", self.height_scale)));
        }
        if !self.blade_scale.is_finite() || self.blade_scale < 0.0 {
            return Err(CullError::InvalidConfig(format!("field.blade_scale {} must be >= 0", self.blade_scale)));
        }
        self.instance_count().map(|_| ())
    }
}

/// `[cull]`: predicate settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullSettings {
    /// Maximum camera distance.
    pub distance: f32,
    /// Enables the frustum test; off means distance only.
    pub frustum: bool,
}

impl Default for CullSettings {
    fn default() -> Self {
        Self {
            distance: 250.0,
            frustum: true,
        }
    }
}

impl CullSettings {
    /// Predicate mode selected by these settings.
    #[must_use]
    pub const fn mode(&self) -> CullMode {
        if self.frustum {
            CullMode::DistanceAndFrustum
        } else {
            CullMode::DistanceOnly
        }
    }

    fn validate(&self) -> CullResult<()> {
        if self.distance.is_nan() || self.distance < 0.0 {
            return Err(CullError::InvalidConfig(format!("cull.distance {} must be >= 0", self.distance)));
        }
        Ok(())
    }
}
