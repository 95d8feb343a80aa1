//! Affine pixel-to-map transform.
//!
//! Six coefficients, row-major:
//!   x = a·col + b·row + c
//!   y = d·col + e·row + f
//! where (col, row) are continuous pixel coordinates with (0, 0) at the
//! upper-left corner of the upper-left pixel.

use serde::Serialize;

use crate::error::{CoverageError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Pixel space is map space. Used for images without georeferencing.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// North-up grid anchored at its upper-left corner.
    pub fn from_origin(west: f64, north: f64, x_size: f64, y_size: f64) -> Self {
        Self::new(x_size, 0.0, west, 0.0, -y_size, north)
    }

    /// Build from GeoTIFF `ModelTiepointTag` + `ModelPixelScaleTag`.
    ///
    /// Only the first tiepoint is used; multi-tiepoint (GCP) rasters are not
    /// affine and are out of reach here.
    pub fn from_tiepoint(tiepoint: &[f64], pixel_scale: &[f64]) -> Option<Self> {
        if tiepoint.len() < 6 || pixel_scale.len() < 2 {
            return None;
        }
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        let (sx, sy) = (pixel_scale[0], pixel_scale[1]);
        Some(Self::new(sx, 0.0, x - i * sx, 0.0, -sy, y + j * sy))
    }

    /// Build from the 4x4 row-major GeoTIFF `ModelTransformationTag`.
    pub fn from_model_transformation(m: &[f64]) -> Option<Self> {
        if m.len() < 16 {
            return None;
        }
        Some(Self::new(m[0], m[1], m[3], m[4], m[5], m[7]))
    }

    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Map-to-pixel transform.
    pub fn inverse(&self) -> Result<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(CoverageError::DegenerateTransform);
        }
        let ia = self.e / det;
        let ib = -self.b / det;
        let id = -self.d / det;
        let ie = self.a / det;
        Ok(Self::new(
            ia,
            ib,
            -ia * self.c - ib * self.f,
            id,
            ie,
            -id * self.c - ie * self.f,
        ))
    }

    /// Move the anchor from a pixel centre to its upper-left corner.
    ///
    /// GeoTIFFs tagged `RasterPixelIsPoint` georeference the centre of the
    /// tiepoint pixel; the pixel grid here always starts at a corner.
    pub fn point_to_area(&self) -> Self {
        Self::new(
            self.a,
            self.b,
            self.c - 0.5 * self.a - 0.5 * self.b,
            self.d,
            self.e,
            self.f - 0.5 * self.d - 0.5 * self.e,
        )
    }

    /// Map-space bounds (min_x, min_y, max_x, max_y) of a width×height grid.
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(w, 0.0),
            self.apply(0.0, h),
            self.apply(w, h),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::identity()
    }
}
