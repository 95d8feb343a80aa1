//! Fixture writers shared by the integration tests.
#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

pub const SOUTH_POLAR_WKT: &str = r#"PROJCS["WGS 84 / Antarctic Polar Stereographic",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],AUTHORITY["EPSG","4326"]],PROJECTION["Polar_Stereographic"],UNIT["metre",1],AUTHORITY["EPSG","3031"]]"#;

/// Georeferencing for a north-up grid.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    pub west: f64,
    pub north: f64,
    pub pixel: f64,
    pub epsg: Option<u16>,
    pub nodata: Option<u8>,
}

impl Grid {
    /// Unit pixels with the top-left corner at `(0, height)`.
    pub fn unit(height: u32) -> Self {
        Self {
            west: 0.0,
            north: height as f64,
            pixel: 1.0,
            epsg: None,
            nodata: None,
        }
    }
}

pub fn write_classes(dir: &Path, name: &str, width: u32, height: u32, data: &[u8], grid: Grid) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    let mut tiff = TiffEncoder::new(&mut file).unwrap();
    let mut image = tiff.new_image::<colortype::Gray8>(width, height).unwrap();
    {
        let enc = image.encoder();
        enc.write_tag(Tag::ModelPixelScaleTag, &[grid.pixel, grid.pixel, 0.0][..])
            .unwrap();
        enc.write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, grid.west, grid.north, 0.0][..])
            .unwrap();
        if let Some(code) = grid.epsg {
            let key = if code == 4326 { 2048 } else { 3072 };
            enc.write_tag(Tag::GeoKeyDirectoryTag, &[1u16, 1, 0, 1, key, 0, 1, code][..])
                .unwrap();
        }
        if let Some(nodata) = grid.nodata {
            enc.write_tag(Tag::GdalNodata, nodata.to_string().as_str()).unwrap();
        }
    }
    image.write_data(data).unwrap();
    path
}

/// Closed ring through the rectangle's corners, clockwise in a y-up frame.
pub fn rect_cw(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<(f64, f64)> {
    vec![(x0, y0), (x0, y1), (x1, y1), (x1, y0), (x0, y0)]
}

/// Closed ring through the rectangle's corners, counter-clockwise in a y-up frame.
pub fn rect_ccw(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<(f64, f64)> {
    vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]
}

// ── Shapefile writer ─────────────────────────────────────────────────────────

const SHAPE_POLYGON: i32 = 5;
const HEADER_BYTES: usize = 100;

fn bbox<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> [f64; 4] {
    points.fold(
        [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
        |[x0, y0, x1, y1], &(x, y)| [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
    )
}

fn header(file_bytes: usize, bounds: [f64; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_BYTES);
    out.extend_from_slice(&9994i32.to_be_bytes());
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&((file_bytes / 2) as i32).to_be_bytes());
    out.extend_from_slice(&1000i32.to_le_bytes());
    out.extend_from_slice(&SHAPE_POLYGON.to_le_bytes());
    for v in bounds {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&[0u8; 32]);
    out
}

fn polygon_content(rings: &[Vec<(f64, f64)>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&SHAPE_POLYGON.to_le_bytes());
    for v in bbox(rings.iter().flatten()) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    let n_points: usize = rings.iter().map(Vec::len).sum();
    out.extend_from_slice(&(rings.len() as i32).to_le_bytes());
    out.extend_from_slice(&(n_points as i32).to_le_bytes());
    let mut start = 0i32;
    for ring in rings {
        out.extend_from_slice(&start.to_le_bytes());
        start += ring.len() as i32;
    }
    for &(x, y) in rings.iter().flatten() {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    out
}

/// Write `<stem>.shp` and `<stem>.shx` with one polygon record per entry of
/// `records`; each record is a list of closed rings (outer rings clockwise).
pub fn write_polygon_shapefile(dir: &Path, stem: &str, records: &[Vec<Vec<(f64, f64)>>]) -> PathBuf {
    let bounds = bbox(records.iter().flatten().flatten());

    let mut body = Vec::new();
    let mut index = Vec::new();
    for (i, rings) in records.iter().enumerate() {
        let content = polygon_content(rings);
        let offset = HEADER_BYTES + body.len();
        index.extend_from_slice(&((offset / 2) as i32).to_be_bytes());
        index.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());

        body.extend_from_slice(&(i as i32 + 1).to_be_bytes());
        body.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());
        body.extend_from_slice(&content);
    }

    let shp = dir.join(format!("{stem}.shp"));
    let mut bytes = header(HEADER_BYTES + body.len(), bounds);
    bytes.extend_from_slice(&body);
    fs::write(&shp, bytes).unwrap();

    let mut shx = header(HEADER_BYTES + index.len(), bounds);
    shx.extend_from_slice(&index);
    fs::write(dir.join(format!("{stem}.shx")), shx).unwrap();

    shp
}

pub fn write_prj(shp: &Path, wkt: &str) {
    fs::write(shp.with_extension("prj"), wkt).unwrap();
}

/// FeatureCollection of single-ring polygons.
pub fn write_geojson(dir: &Path, name: &str, rings: &[Vec<(f64, f64)>], crs: Option<&str>) -> PathBuf {
    let features: Vec<serde_json::Value> = rings
        .iter()
        .map(|ring| {
            let coords: Vec<[f64; 2]> = ring.iter().map(|&(x, y)| [x, y]).collect();
            serde_json::json!({
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Polygon", "coordinates": [coords] }
            })
        })
        .collect();
    let mut doc = serde_json::json!({ "type": "FeatureCollection", "features": features });
    if let Some(name) = crs {
        doc["crs"] = serde_json::json!({ "type": "name", "properties": { "name": name } });
    }
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
    path
}
