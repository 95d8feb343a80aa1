/// Water coverage tool: percentage of water pixels (value 0) of a classified
/// GeoTIFF that fall inside an ice-shelf boundary.
///
/// Prints exactly one line on stdout, either the coverage or the error, and
/// always exits 0. Logs go to stderr.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use shelfwater_core::{format_failure, try_coverage, CoverageConfig, CoverageReport, CrsPolicy};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "water_coverage",
    about = "Percentage of water-classified pixels inside an ice-shelf boundary"
)]
struct Args {
    /// Boundary polygons (.shp or .geojson)
    #[arg(short, long)]
    boundary: Option<PathBuf>,

    /// Classified GeoTIFF (0 = water)
    #[arg(short, long)]
    raster: Option<PathBuf>,

    /// JSON config file; flags given on the command line override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pixel value that means water
    #[arg(long, allow_negative_numbers = true)]
    water_value: Option<f64>,

    /// 1-based raster band to read
    #[arg(long)]
    band: Option<usize>,

    /// Leave nodata pixels out of the denominator
    #[arg(long)]
    exclude_nodata: bool,

    /// Skip the boundary/raster CRS comparison
    #[arg(long)]
    ignore_crs: bool,

    /// Print the full report as JSON instead of the one-line summary
    #[arg(long)]
    json: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

// ── Config resolution ────────────────────────────────────────────────────────

fn resolve_config(args: &Args) -> Result<CoverageConfig> {
    let mut config = match &args.config {
        Some(path) => CoverageConfig::load(path)
            .with_context(|| format!("Cannot load config {}", path.display()))?,
        None => CoverageConfig::new(
            args.boundary.clone().context("--boundary is required without --config")?,
            args.raster.clone().context("--raster is required without --config")?,
        ),
    };

    if let Some(boundary) = &args.boundary {
        config.boundary = boundary.clone();
    }
    if let Some(raster) = &args.raster {
        config.raster = raster.clone();
    }
    if let Some(water) = args.water_value {
        config.water_value = water;
    }
    if let Some(band) = args.band {
        config.band = band;
    }
    if args.exclude_nodata {
        config.exclude_nodata = true;
    }
    if args.ignore_crs {
        config.crs_policy = CrsPolicy::Ignore;
    }
    Ok(config)
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let config = resolve_config(args)?;
    info!(
        boundary = %config.boundary.display(),
        raster = %config.raster.display(),
        band = config.band,
        "computing water coverage"
    );

    let Some(report) = try_coverage(&config) else {
        return Ok(());
    };
    if report.is_empty_selection() {
        warn!("boundary selects no raster pixels; reporting 0%");
    }
    println!("{}", render(&report, args.json)?);
    Ok(())
}

fn render(report: &CoverageReport, json: bool) -> Result<String> {
    if json {
        serde_json::to_string_pretty(report).context("Failed to serialise report")
    } else {
        Ok(report.headline())
    }
}

/// First line of a clap error without its `error: ` prefix.
fn usage_error(e: &clap::Error) -> String {
    let text = e.to_string();
    let line = text.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).to_string()
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            println!("{}", format_failure(usage_error(&e)));
            return;
        }
    };
    init_tracing(&args.log_level);

    if let Err(e) = run(&args) {
        println!("{}", format_failure(format!("{e:#}")));
    }
}
