//! Calculator configuration: the two named inputs plus tuning knobs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoverageError, Result};

/// Pixel value meaning "water" in the classified raster.
pub const WATER_SENTINEL: f64 = 0.0;

/// What to do when boundary and raster both declare a CRS and they differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrsPolicy {
    /// Fail with `CrsMismatch`.
    #[default]
    Check,
    /// Trust the caller; compute anyway.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Boundary polygons (`.shp`, `.geojson`, `.json`).
    pub boundary: PathBuf,
    /// Classified GeoTIFF.
    pub raster: PathBuf,
    #[serde(default = "default_water_value")]
    pub water_value: f64,
    /// 1-based band index.
    #[serde(default = "default_band")]
    pub band: usize,
    /// Drop pixels equal to the raster's nodata value from the denominator.
    #[serde(default)]
    pub exclude_nodata: bool,
    #[serde(default)]
    pub crs_policy: CrsPolicy,
}

fn default_water_value() -> f64 {
    WATER_SENTINEL
}

fn default_band() -> usize {
    1
}

impl CoverageConfig {
    pub fn new(boundary: impl Into<PathBuf>, raster: impl Into<PathBuf>) -> Self {
        Self {
            boundary: boundary.into(),
            raster: raster.into(),
            water_value: WATER_SENTINEL,
            band: 1,
            exclude_nodata: false,
            crs_policy: CrsPolicy::Check,
        }
    }

    /// Read a JSON config file. Relative input paths are resolved against the
    /// config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CoverageError::file_access(path, e))?;
        let mut config: CoverageConfig = serde_json::from_str(&text)
            .map_err(|e| CoverageError::config(format!("{}: {e}", path.display())))?;
        if let Some(base) = path.parent() {
            config.boundary = resolve(base, &config.boundary);
            config.raster = resolve(base, &config.raster);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.band == 0 {
            return Err(CoverageError::config("band index is 1-based; 0 is not a band"));
        }
        if !self.water_value.is_finite() {
            return Err(CoverageError::config("water_value must be finite"));
        }
        if self.boundary.as_os_str().is_empty() || self.raster.as_os_str().is_empty() {
            return Err(CoverageError::config("both boundary and raster paths are required"));
        }
        Ok(())
    }
}

fn resolve(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}
