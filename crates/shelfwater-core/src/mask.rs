//! Polygon → pixel mask rasterization.
//!
//! A pixel belongs to a polygon when its centre lies inside it. Rings are
//! mapped into pixel space through the inverse transform and each row is
//! scanline-filled at `y = row + 0.5`, so rotated and sheared grids need no
//! special casing.
//!
//! Fill rule: even-odd within one polygon (exterior plus holes), union
//! across polygons. Overlapping polygons therefore never cancel out.

use geo::{LineString, MultiPolygon, Polygon};
#[cfg(feature = "threading")]
use rayon::prelude::*;
use tracing::debug;

use crate::error::{CoverageError, Result};
use crate::transform::GeoTransform;

/// Boolean grid with the same row-major layout as the raster it was built for.
#[derive(Debug, Clone, PartialEq)]
pub struct InclusionMask {
    cells: Vec<bool>,
    width: usize,
    height: usize,
}

impl InclusionMask {
    pub fn new(width: usize, height: usize, fill: bool) -> Self {
        Self {
            cells: vec![fill; width * height],
            width,
            height,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.width + col]
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// (rows, cols), the same order numpy reports.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    /// Number of `true` cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn invert(&mut self) {
        for c in &mut self.cells {
            *c = !*c;
        }
    }
}

/// One edge of a ring, in pixel coordinates.
#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

/// A polygon already mapped into pixel space.
struct PixelPolygon {
    edges: Vec<Edge>,
    row_start: usize,
    row_end: usize,
}

impl PixelPolygon {
    fn new(poly: &Polygon<f64>, inverse: &GeoTransform, height: usize) -> Option<Self> {
        let mut edges = Vec::new();
        push_ring(&mut edges, poly.exterior(), inverse);
        for hole in poly.interiors() {
            push_ring(&mut edges, hole, inverse);
        }
        if edges.is_empty() {
            return None;
        }

        let (min_y, max_y) = edges.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| {
            (lo.min(e.y0).min(e.y1), hi.max(e.y0).max(e.y1))
        });
        if !min_y.is_finite() || !max_y.is_finite() {
            return None;
        }
        let row_start = (min_y - 0.5).floor().clamp(0.0, height as f64) as usize;
        let row_end = (max_y - 0.5).ceil().clamp(0.0, height as f64) as usize;
        if row_start >= row_end {
            return None;
        }
        Some(Self {
            edges,
            row_start,
            row_end,
        })
    }

    /// OR this polygon's coverage of `row` into `cells`.
    fn fill_row(&self, row: usize, cells: &mut [bool], xs: &mut Vec<f64>) {
        if row < self.row_start || row >= self.row_end {
            return;
        }
        let y = row as f64 + 0.5;
        xs.clear();
        for e in &self.edges {
            // Half-open crossing test: a vertex exactly on the scanline is
            // counted once, by the edge that continues above it.
            if (e.y0 <= y) != (e.y1 <= y) {
                xs.push(e.x0 + (y - e.y0) * (e.x1 - e.x0) / (e.y1 - e.y0));
            }
        }
        xs.sort_by(f64::total_cmp);

        let width = cells.len() as f64;
        for pair in xs.chunks_exact(2) {
            let first = (pair[0] - 0.5).ceil().clamp(0.0, width) as usize;
            let last = (pair[1] - 0.5).ceil().clamp(0.0, width) as usize;
            for cell in cells.iter_mut().take(last).skip(first) {
                *cell = true;
            }
        }
    }
}

fn push_ring(edges: &mut Vec<Edge>, ring: &LineString<f64>, inverse: &GeoTransform) {
    let pts: Vec<(f64, f64)> = ring.coords().map(|c| inverse.apply(c.x, c.y)).collect();
    if pts.len() < 3 {
        return;
    }
    for w in pts.windows(2) {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        if y0 != y1 {
            edges.push(Edge { x0, y0, x1, y1 });
        }
    }
    // geo closes rings on construction, but be tolerant of open input.
    let (first, last) = (pts[0], pts[pts.len() - 1]);
    if first != last && first.1 != last.1 {
        edges.push(Edge {
            x0: last.0,
            y0: last.1,
            x1: first.0,
            y1: first.1,
        });
    }
}

/// Rasterize `polygons` onto a `width`×`height` grid described by `transform`.
///
/// With `invert = false` the result is true *outside* the geometry (a mask of
/// pixels to hide); pass `invert = true` to get true inside.
pub fn geometry_mask(
    polygons: &MultiPolygon<f64>,
    width: usize,
    height: usize,
    transform: &GeoTransform,
    invert: bool,
) -> Result<InclusionMask> {
    let inverse = transform.inverse()?;
    let mut mask = InclusionMask::new(width, height, false);

    let shapes: Vec<PixelPolygon> = polygons
        .iter()
        .filter_map(|p| PixelPolygon::new(p, &inverse, height))
        .collect();
    debug!(
        polygons = polygons.0.len(),
        in_extent = shapes.len(),
        width,
        height,
        "rasterizing boundary"
    );

    if width > 0 && !shapes.is_empty() {
        fill_rows(&shapes, &mut mask.cells, width);
    }

    if !invert {
        mask.invert();
    }
    Ok(mask)
}

#[cfg(not(feature = "threading"))]
fn fill_rows(shapes: &[PixelPolygon], cells: &mut [bool], width: usize) {
    let mut xs = Vec::new();
    for (row, line) in cells.chunks_mut(width).enumerate() {
        for shape in shapes {
            shape.fill_row(row, line, &mut xs);
        }
    }
}

#[cfg(feature = "threading")]
fn fill_rows(shapes: &[PixelPolygon], cells: &mut [bool], width: usize) {
    cells
        .par_chunks_mut(width)
        .enumerate()
        .for_each_init(Vec::new, |xs, (row, line)| {
            for shape in shapes {
                shape.fill_row(row, line, xs);
            }
        });
}

/// Check that a mask was built for a grid of `rows`×`cols`.
pub fn ensure_shape(mask: &InclusionMask, rows: usize, cols: usize) -> Result<()> {
    if mask.shape() != (rows, cols) {
        return Err(CoverageError::ShapeMismatch {
            mask_rows: mask.height,
            mask_cols: mask.width,
            raster_rows: rows,
            raster_cols: cols,
        });
    }
    Ok(())
}
