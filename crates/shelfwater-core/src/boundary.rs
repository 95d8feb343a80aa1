//! Boundary polygon loading (ESRI shapefile or GeoJSON).
//!
//! Every polygonal geometry in the source is kept; together they form one
//! region. Null shapes are dropped silently, other non-polygonal shapes are
//! dropped with a warning.

use std::fs;
use std::path::Path;

use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Point, Polygon, Rect};
use geojson::{GeoJson, Geometry, JsonObject, Value};
use shapefile::{PolygonRing, Shape, ShapeReader};
use tracing::{debug, info, warn};

use crate::crs::{Crs, EPSG_WGS84};
use crate::error::{CoverageError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryFormat {
    Shapefile,
    GeoJson,
}

impl BoundaryFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "shp" => Some(Self::Shapefile),
            "geojson" | "json" => Some(Self::GeoJson),
            _ => None,
        }
    }
}

/// The region of interest.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub polygons: MultiPolygon<f64>,
    pub crs: Crs,
    /// Non-polygonal geometries that were ignored.
    pub skipped: usize,
}

impl Boundary {
    pub fn new(polygons: Vec<Polygon<f64>>, crs: Crs) -> Self {
        Self {
            polygons: MultiPolygon(polygons),
            crs,
            skipped: 0,
        }
    }

    /// Load every polygon from `path`. Fails with `EmptyGeometry` if none
    /// are found.
    pub fn load(path: &Path) -> Result<Self> {
        let format = BoundaryFormat::from_path(path).ok_or_else(|| CoverageError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let boundary = match format {
            BoundaryFormat::Shapefile => read_shapefile(path)?,
            BoundaryFormat::GeoJson => read_geojson(path)?,
        };
        if boundary.is_empty() {
            return Err(CoverageError::EmptyGeometry {
                path: path.to_path_buf(),
            });
        }
        info!(
            path = %path.display(),
            polygons = boundary.len(),
            skipped = boundary.skipped,
            crs = %boundary.crs,
            "loaded boundary"
        );
        Ok(boundary)
    }

    pub fn len(&self) -> usize {
        self.polygons.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty()
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.polygons.bounding_rect()
    }
}

// ── Shapefile ────────────────────────────────────────────────────────────────

fn read_shapefile(path: &Path) -> Result<Boundary> {
    // Surface a missing file as an access error rather than a format error.
    fs::metadata(path).map_err(|e| CoverageError::file_access(path, e))?;

    let shp_err = |e: shapefile::Error| CoverageError::Shapefile {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let reader = ShapeReader::from_path(path).map_err(shp_err)?;
    let shapes = reader.read().map_err(shp_err)?;
    debug!(path = %path.display(), records = shapes.len(), "read shapefile records");

    let mut polygons = Vec::new();
    let mut skipped = 0usize;
    for (idx, shape) in shapes.iter().enumerate() {
        let rings = match shape {
            Shape::Polygon(p) => classify_rings(p.rings(), |pt| Coord { x: pt.x, y: pt.y })?,
            Shape::PolygonM(p) => classify_rings(p.rings(), |pt| Coord { x: pt.x, y: pt.y })?,
            Shape::PolygonZ(p) => classify_rings(p.rings(), |pt| Coord { x: pt.x, y: pt.y })?,
            Shape::NullShape => continue,
            _ => {
                warn!(record = idx, "skipping non-polygon shapefile record");
                skipped += 1;
                continue;
            }
        };
        polygons.extend(assemble(rings));
    }

    Ok(Boundary {
        polygons: MultiPolygon(polygons),
        crs: read_prj(path)?,
        skipped,
    })
}

/// A ring tagged by the shapefile reader's winding-order classification.
enum Ring {
    Outer(LineString<f64>),
    Inner(LineString<f64>),
}

fn classify_rings<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> Coord<f64>) -> Result<Vec<Ring>> {
    rings
        .iter()
        .map(|ring| match ring {
            PolygonRing::Outer(pts) => ring_from(pts.iter().map(&xy).collect()).map(Ring::Outer),
            PolygonRing::Inner(pts) => ring_from(pts.iter().map(&xy).collect()).map(Ring::Inner),
        })
        .collect()
}

/// Group rings into polygons: each outer ring starts a polygon, each inner
/// ring becomes a hole of the outer ring that contains it.
fn assemble(rings: Vec<Ring>) -> Vec<Polygon<f64>> {
    let mut shells: Vec<(Polygon<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        match ring {
            Ring::Outer(ls) => shells.push((Polygon::new(ls, vec![]), Vec::new())),
            Ring::Inner(ls) => {
                let Some(anchor) = ls.0.first().copied() else {
                    continue;
                };
                let owner = shells
                    .iter()
                    .rposition(|(shell, _)| shell.intersects(&Point::from(anchor)))
                    .or_else(|| shells.len().checked_sub(1));
                match owner {
                    Some(i) => shells[i].1.push(ls),
                    None => {
                        // Wound the wrong way with no shell before it: treat as a shell.
                        warn!("inner ring without an enclosing outer ring, promoting to outer");
                        shells.push((Polygon::new(ls, vec![]), Vec::new()));
                    }
                }
            }
        }
    }
    shells
        .into_iter()
        .map(|(shell, holes)| {
            let (exterior, _) = shell.into_inner();
            Polygon::new(exterior, holes)
        })
        .collect()
}

/// CRS from the sidecar `.prj`. A missing sidecar is `Unknown`; one that
/// exists but cannot be read is an error. Non-UTF-8 bytes are replaced.
fn read_prj(shp: &Path) -> Result<Crs> {
    let prj = shp.with_extension("prj");
    match fs::read(&prj) {
        Ok(bytes) => Ok(Crs::from_wkt(&String::from_utf8_lossy(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %prj.display(), "no .prj sidecar");
            Ok(Crs::Unknown)
        }
        Err(e) => Err(CoverageError::file_access(prj, e)),
    }
}

// ── GeoJSON ──────────────────────────────────────────────────────────────────

fn read_geojson(path: &Path) -> Result<Boundary> {
    let text = fs::read_to_string(path).map_err(|e| CoverageError::file_access(path, e))?;
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| CoverageError::GeoJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let (geometries, members): (Vec<Geometry>, Option<JsonObject>) = match geojson {
        GeoJson::FeatureCollection(fc) => (
            fc.features.into_iter().filter_map(|f| f.geometry).collect(),
            fc.foreign_members,
        ),
        GeoJson::Feature(f) => (f.geometry.into_iter().collect(), f.foreign_members),
        GeoJson::Geometry(g) => {
            let members = g.foreign_members.clone();
            (vec![g], members)
        }
    };

    let mut polygons = Vec::new();
    let mut skipped = 0usize;
    for geometry in geometries {
        collect_polygons(geometry.value, &mut polygons, &mut skipped)?;
    }

    Ok(Boundary {
        polygons: MultiPolygon(polygons),
        crs: members.as_ref().map(crs_member).unwrap_or(Crs::Epsg(EPSG_WGS84)),
        skipped,
    })
}

fn collect_polygons(value: Value, out: &mut Vec<Polygon<f64>>, skipped: &mut usize) -> Result<()> {
    match value {
        Value::Polygon(rings) => out.push(polygon_from(rings)?),
        Value::MultiPolygon(polys) => {
            for rings in polys {
                out.push(polygon_from(rings)?);
            }
        }
        Value::GeometryCollection(members) => {
            for g in members {
                collect_polygons(g.value, out, skipped)?;
            }
        }
        _ => {
            warn!("skipping non-polygon GeoJSON geometry");
            *skipped += 1;
        }
    }
    Ok(())
}

fn polygon_from(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon<f64>> {
    let mut rings = rings.into_iter().map(|ring| {
        let coords = ring
            .into_iter()
            .map(|pos| match pos.as_slice() {
                [x, y, ..] => Ok(Coord { x: *x, y: *y }),
                _ => Err(CoverageError::invalid_geometry("position with fewer than two ordinates")),
            })
            .collect::<Result<Vec<_>>>()?;
        ring_from(coords)
    });
    let exterior = rings
        .next()
        .ok_or_else(|| CoverageError::invalid_geometry("polygon without an exterior ring"))??;
    let holes = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

/// Legacy `"crs": {"type": "name", "properties": {"name": "EPSG:3031"}}`.
fn crs_member(members: &JsonObject) -> Crs {
    members
        .get("crs")
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(|name| name.as_str())
        .map(Crs::from_name)
        .unwrap_or(Crs::Epsg(EPSG_WGS84))
}

fn ring_from(coords: Vec<Coord<f64>>) -> Result<LineString<f64>> {
    if coords.len() < 3 {
        return Err(CoverageError::invalid_geometry(format!(
            "ring has {} vertices, need at least 3",
            coords.len()
        )));
    }
    Ok(LineString(coords))
}
