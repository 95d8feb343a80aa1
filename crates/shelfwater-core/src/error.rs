//! Error types for coverage computation.

use std::path::PathBuf;

use thiserror::Error;

use crate::crs::Crs;

/// Everything that can go wrong between opening the inputs and producing a
/// coverage figure.
#[derive(Error, Debug)]
pub enum CoverageError {
    /// A file could not be opened or read.
    #[error("cannot read {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The boundary file extension is not one we know how to parse.
    #[error("unsupported boundary format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// The shapefile reader rejected the file.
    #[error("invalid shapefile {}: {message}", .path.display())]
    Shapefile { path: PathBuf, message: String },

    /// The GeoJSON parser rejected the file.
    #[error("invalid GeoJSON {}: {message}", .path.display())]
    GeoJson { path: PathBuf, message: String },

    /// The TIFF decoder rejected the file.
    #[error("invalid GeoTIFF {}: {source}", .path.display())]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    /// Decoded sample buffer does not fit the declared image layout.
    #[error("invalid raster layout in {}: {message}", .path.display())]
    InvalidRaster { path: PathBuf, message: String },

    /// The decoder produced a sample type we do not classify.
    #[error("unsupported sample type {kind} in {}", .path.display())]
    UnsupportedSampleType { path: PathBuf, kind: &'static str },

    /// Requested band does not exist in the image.
    #[error("band {band} requested but the raster has {available} band(s)")]
    BandOutOfRange { band: usize, available: usize },

    /// A ring or polygon could not be turned into a usable geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The boundary source yielded no polygons at all.
    #[error("no polygon geometries found in {}", .path.display())]
    EmptyGeometry { path: PathBuf },

    /// Mask and raster grids disagree on dimensions.
    #[error("mask shape {mask_rows}x{mask_cols} does not match raster shape {raster_rows}x{raster_cols}")]
    ShapeMismatch {
        mask_rows: usize,
        mask_cols: usize,
        raster_rows: usize,
        raster_cols: usize,
    },

    /// The raster's affine transform cannot be inverted.
    #[error("raster transform is not invertible")]
    DegenerateTransform,

    /// Boundary and raster declare different coordinate reference systems.
    #[error("boundary CRS {boundary} does not match raster CRS {raster}")]
    CrsMismatch { boundary: Crs, raster: Crs },

    /// Configuration file missing fields or holding bad values.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CoverageError {
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    pub fn tiff(path: impl Into<PathBuf>, source: tiff::TiffError) -> Self {
        Self::Tiff {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for conditions a caller can fix by changing settings rather than
    /// inputs (pick another band, relax the CRS policy).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CrsMismatch { .. } | Self::BandOutOfRange { .. })
    }
}

/// Result type for coverage operations.
pub type Result<T> = std::result::Result<T, CoverageError>;
