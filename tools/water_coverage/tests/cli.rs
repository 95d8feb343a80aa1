//! Runs the built binary and checks what it prints and how it exits.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tiff::encoder::{colortype, TiffEncoder};

fn water_coverage(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_water_coverage"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8(out.stdout.clone()).unwrap()
}

/// 2×2 plain TIFF, so map coordinates are pixel coordinates (y grows with row).
fn write_plain_tiff(dir: &Path, data: &[u8]) -> PathBuf {
    let path = dir.join("classes.tif");
    let mut file = File::create(&path).unwrap();
    let mut tiff = TiffEncoder::new(&mut file).unwrap();
    tiff.write_image::<colortype::Gray8>(2, 2, data).unwrap();
    path
}

/// Covers row 0 of the plain 2×2 grid.
fn write_top_row_boundary(dir: &Path) -> PathBuf {
    let path = dir.join("shelf.geojson");
    let doc = serde_json::json!({
        "type": "Polygon",
        "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
    });
    std::fs::write(&path, doc.to_string()).unwrap();
    path
}

#[test]
fn prints_headline() {
    let dir = tempfile::tempdir().unwrap();
    let tif = write_plain_tiff(dir.path(), &[0, 5, 0, 0]);
    let shelf = write_top_row_boundary(dir.path());

    let out = water_coverage(&["-b", shelf.to_str().unwrap(), "-r", tif.to_str().unwrap()]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "Water coverage within ice shelf boundary: 50.00%\n");
}

#[test]
fn json_report() {
    let dir = tempfile::tempdir().unwrap();
    let tif = write_plain_tiff(dir.path(), &[0, 5, 0, 0]);
    let shelf = write_top_row_boundary(dir.path());

    let out = water_coverage(&["-b", shelf.to_str().unwrap(), "-r", tif.to_str().unwrap(), "--json"]);
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(report["total_pixels"], 2);
    assert_eq!(report["water_pixels"], 1);
    assert_eq!(report["percent"], 50.0);
    assert_eq!(report["width"], 2);
    assert_eq!(report["boundary_crs"], "EPSG:4326");
    assert!(report["raster_crs"].is_null());
}

#[test]
fn missing_raster_reports_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let shelf = write_top_row_boundary(dir.path());
    let missing = dir.path().join("nope.tif");

    let out = water_coverage(&["-b", shelf.to_str().unwrap(), "-r", missing.to_str().unwrap()]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.starts_with("An error occurred: cannot read "), "got: {text}");
    assert!(text.contains("nope.tif"), "got: {text}");
    assert_eq!(text.lines().count(), 1);
}

#[test]
fn bad_flag_value_reports_and_exits_zero() {
    let out = water_coverage(&["--band", "x", "-b", "a.shp", "-r", "b.tif"]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.starts_with("An error occurred: "), "got: {text}");
    assert!(text.contains("--band"), "got: {text}");
    assert_eq!(text.lines().count(), 1);
}
