//! Water coverage inside a boundary.
//!
//! Pipeline: load boundary → open raster → rasterize boundary onto the
//! raster grid (inside = true) → count masked pixels and masked water
//! pixels → percentage.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::boundary::Boundary;
use crate::config::{CoverageConfig, CrsPolicy};
use crate::crs::Crs;
use crate::error::{CoverageError, Result};
use crate::mask::geometry_mask;
use crate::raster::ClassRaster;

/// Pixel counts over the masked area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Masked pixels that count toward the denominator.
    pub total: usize,
    /// Of those, pixels equal to the water value.
    pub water: usize,
    /// Masked pixels equal to the raster's nodata value (whether or not they
    /// were excluded from `total`).
    pub nodata: usize,
}

impl Tally {
    /// `water / total` as a percentage; 0.0 when nothing was selected.
    pub fn percent(&self) -> f64 {
        if self.total > 0 {
            self.water as f64 / self.total as f64 * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub boundary: PathBuf,
    pub raster: PathBuf,
    pub width: usize,
    pub height: usize,
    pub polygons: usize,
    pub water_value: f64,
    pub total_pixels: usize,
    pub water_pixels: usize,
    pub nodata_pixels: usize,
    /// 0–100.
    pub percent: f64,
    pub boundary_crs: Crs,
    pub raster_crs: Crs,
}

impl CoverageReport {
    /// The boundary selected no pixels (no overlap, or sub-pixel slivers).
    pub fn is_empty_selection(&self) -> bool {
        self.total_pixels == 0
    }

    pub fn headline(&self) -> String {
        format_headline(self.percent)
    }
}

pub fn format_headline(percent: f64) -> String {
    format!("Water coverage within ice shelf boundary: {percent:.2}%")
}

/// Compute coverage with typed errors.
pub fn calculate_coverage(config: &CoverageConfig) -> Result<CoverageReport> {
    config.validate()?;

    let boundary = Boundary::load(&config.boundary)?;
    let raster = ClassRaster::open(&config.raster, config.band)?;
    check_crs(&boundary.crs, &raster.crs, config.crs_policy)?;

    coverage_of(&boundary, &raster, config).map(|tally| {
        let report = CoverageReport {
            boundary: config.boundary.clone(),
            raster: config.raster.clone(),
            width: raster.width,
            height: raster.height,
            polygons: boundary.len(),
            water_value: config.water_value,
            total_pixels: tally.total,
            water_pixels: tally.water,
            nodata_pixels: tally.nodata,
            percent: tally.percent(),
            boundary_crs: boundary.crs.clone(),
            raster_crs: raster.crs.clone(),
        };
        info!(
            total = report.total_pixels,
            water = report.water_pixels,
            percent = report.percent,
            "coverage computed"
        );
        report
    })
}

/// Mask + tally for already loaded inputs.
///
/// A boundary whose extent misses the raster selects nothing and skips
/// rasterization.
pub fn coverage_of(boundary: &Boundary, raster: &ClassRaster, config: &CoverageConfig) -> Result<Tally> {
    let Some(rect) = boundary.bounding_rect() else {
        return Ok(Tally::default());
    };
    let (min_x, min_y, max_x, max_y) = raster.transform.bounds(raster.width, raster.height);
    if !(rect.min().x < max_x && rect.max().x > min_x && rect.min().y < max_y && rect.max().y > min_y) {
        debug!("boundary extent does not overlap the raster");
        return Ok(Tally::default());
    }

    let mask = geometry_mask(&boundary.polygons, raster.width, raster.height, &raster.transform, true)?;
    debug!(selected = mask.count(), "inclusion mask built");
    raster.tally(&mask, config.water_value, config.exclude_nodata)
}

fn check_crs(boundary: &Crs, raster: &Crs, policy: CrsPolicy) -> Result<()> {
    if policy == CrsPolicy::Ignore {
        return Ok(());
    }
    match boundary.compatible(raster) {
        Some(true) => Ok(()),
        Some(false) => Err(CoverageError::CrsMismatch {
            boundary: boundary.clone(),
            raster: raster.clone(),
        }),
        None => {
            warn!(%boundary, %raster, "cannot verify that boundary and raster share a CRS");
            Ok(())
        }
    }
}

/// Catch-all wrapper: any failure is printed to stdout as
/// `An error occurred: <message>` and turned into `None`.
pub fn try_coverage(config: &CoverageConfig) -> Option<CoverageReport> {
    match calculate_coverage(config) {
        Ok(report) => Some(report),
        Err(e) => {
            debug!(error = ?e, recoverable = e.is_recoverable(), "coverage failed");
            println!("{}", format_failure(&e));
            None
        }
    }
}

/// The one-line failure report printed in place of a coverage figure.
pub fn format_failure(err: impl std::fmt::Display) -> String {
    format!("An error occurred: {err}")
}

/// Percentage of water pixels inside the boundary, with default settings.
pub fn compute_water_coverage(boundary: &Path, raster: &Path) -> Option<f64> {
    try_coverage(&CoverageConfig::new(boundary, raster)).map(|r| r.percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::BandData;
    use crate::transform::GeoTransform;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn grid(values: Vec<u8>, width: usize, height: usize) -> ClassRaster {
        ClassRaster::new(
            BandData::U8(values),
            width,
            height,
            GeoTransform::from_origin(0.0, height as f64, 1.0, 1.0),
        )
        .unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> geo::Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]
    }

    fn cfg() -> CoverageConfig {
        CoverageConfig::new("mem.geojson", "mem.tif")
    }

    #[test]
    fn three_pixels_two_water() {
        // 3×3 grid; middle row is [0, 0, 5].
        let raster = grid(vec![9, 9, 9, 0, 0, 5, 9, 9, 9], 3, 3);
        let boundary = Boundary::new(vec![rect(0.0, 1.0, 3.0, 2.0)], Crs::Unknown);
        let tally = coverage_of(&boundary, &raster, &cfg()).unwrap();
        assert_eq!((tally.total, tally.water), (3, 2));
        assert_relative_eq!(tally.percent(), 200.0 / 3.0);
        assert_eq!(format_headline(tally.percent()), "Water coverage within ice shelf boundary: 66.67%");
    }

    #[test]
    fn all_water_and_no_water() {
        let boundary = Boundary::new(vec![rect(1.0, 1.0, 3.0, 3.0)], Crs::Unknown);
        let wet = coverage_of(&boundary, &grid(vec![0; 16], 4, 4), &cfg()).unwrap();
        assert_eq!(wet.percent(), 100.0);
        let dry = coverage_of(&boundary, &grid(vec![7; 16], 4, 4), &cfg()).unwrap();
        assert_eq!(dry.percent(), 0.0);
        assert_eq!(dry.total, 4);
    }

    #[test]
    fn disjoint_boundary_is_zero_not_error() {
        let boundary = Boundary::new(vec![rect(50.0, 50.0, 60.0, 60.0)], Crs::Unknown);
        let tally = coverage_of(&boundary, &grid(vec![0; 16], 4, 4), &cfg()).unwrap();
        assert_eq!(tally, Tally::default());
        assert_eq!(tally.percent(), 0.0);
    }

    #[test]
    fn polygon_order_does_not_matter() {
        let raster = grid((0..16).map(|i| (i % 3) as u8).collect(), 4, 4);
        let a = rect(0.0, 0.0, 2.0, 3.0);
        let b = rect(1.0, 2.0, 4.0, 4.0);
        let ab = coverage_of(&Boundary::new(vec![a.clone(), b.clone()], Crs::Unknown), &raster, &cfg()).unwrap();
        let ba = coverage_of(&Boundary::new(vec![b, a], Crs::Unknown), &raster, &cfg()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn custom_water_value() {
        let raster = grid(vec![1, 1, 2, 2], 2, 2);
        let boundary = Boundary::new(vec![rect(0.0, 0.0, 2.0, 2.0)], Crs::Unknown);
        let mut config = cfg();
        config.water_value = 2.0;
        assert_eq!(coverage_of(&boundary, &raster, &config).unwrap().percent(), 50.0);
    }

    #[test]
    fn crs_policy() {
        assert!(check_crs(&Crs::Epsg(3031), &Crs::Epsg(3031), CrsPolicy::Check).is_ok());
        assert!(check_crs(&Crs::Epsg(3031), &Crs::Unknown, CrsPolicy::Check).is_ok());
        assert!(matches!(
            check_crs(&Crs::Epsg(4326), &Crs::Epsg(3031), CrsPolicy::Check),
            Err(CoverageError::CrsMismatch { .. })
        ));
        assert!(check_crs(&Crs::Epsg(4326), &Crs::Epsg(3031), CrsPolicy::Ignore).is_ok());
    }

    #[test]
    fn empty_boundary_selects_nothing() {
        let boundary = Boundary::new(Vec::new(), Crs::Unknown);
        let tally = coverage_of(&boundary, &grid(vec![0; 4], 2, 2), &cfg()).unwrap();
        assert_eq!(tally, Tally::default());
    }

    #[test]
    fn failure_line() {
        let err = CoverageError::EmptyGeometry {
            path: "shelf.geojson".into(),
        };
        assert_eq!(
            format_failure(&err),
            "An error occurred: no polygon geometries found in shelf.geojson"
        );
    }

    #[test]
    fn missing_inputs_yield_none() {
        assert_eq!(
            compute_water_coverage(Path::new("/nonexistent/shelf.shp"), Path::new("/nonexistent/c.tif")),
            None
        );
    }

    #[test]
    fn empty_selection_flag() {
        let report = CoverageReport {
            boundary: "b".into(),
            raster: "r".into(),
            width: 1,
            height: 1,
            polygons: 1,
            water_value: 0.0,
            total_pixels: 0,
            water_pixels: 0,
            nodata_pixels: 0,
            percent: 0.0,
            boundary_crs: Crs::Unknown,
            raster_crs: Crs::Unknown,
        };
        assert!(report.is_empty_selection());
        assert_eq!(report.headline(), "Water coverage within ice shelf boundary: 0.00%");
    }
}
