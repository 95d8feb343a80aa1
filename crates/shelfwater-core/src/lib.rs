//! Water coverage of classified rasters inside polygon boundaries.
//!
//! Typical use is an ice-shelf outline (shapefile or GeoJSON) over a
//! water/ice classification GeoTIFF where 0 marks water.

pub mod boundary;
pub mod config;
pub mod coverage;
pub mod crs;
pub mod error;
pub mod mask;
pub mod raster;
pub mod transform;

pub use boundary::{Boundary, BoundaryFormat};
pub use config::{CoverageConfig, CrsPolicy, WATER_SENTINEL};
pub use coverage::{
    calculate_coverage, compute_water_coverage, format_failure, format_headline, try_coverage, CoverageReport, Tally,
};
pub use crs::Crs;
pub use error::{CoverageError, Result};
pub use mask::{geometry_mask, InclusionMask};
pub use raster::{BandData, ClassRaster};
pub use transform::GeoTransform;
