//! Coordinate reference system identification.
//!
//! Only identifies; no reprojection is performed anywhere in the crate.
//! Boundary and raster must already share a CRS, and [`Crs::compatible`]
//! lets the caller verify that when both sides carry enough metadata.

use std::fmt;

use serde::{Serialize, Serializer};

/// EPSG code for WGS 84 geographic coordinates, the GeoJSON default.
pub const EPSG_WGS84: u32 = 4326;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Crs {
    /// Resolved to an EPSG code.
    Epsg(u32),
    /// Well-known text that carries no top-level EPSG authority.
    Wkt(String),
    /// No CRS metadata found.
    #[default]
    Unknown,
}

impl Crs {
    /// Identify a CRS from WKT (WKT1 `AUTHORITY[...]` or WKT2 `ID[...]`).
    ///
    /// Only the authority attached to the outermost object counts; nested
    /// datum, unit and axis authorities are ignored.
    pub fn from_wkt(wkt: &str) -> Self {
        let wkt = wkt.trim();
        if wkt.is_empty() {
            return Crs::Unknown;
        }
        match top_level_epsg(wkt) {
            Some(code) => Crs::Epsg(code),
            None => Crs::Wkt(wkt.to_string()),
        }
    }

    /// Parse the short names used by GeoJSON `crs` members and CLI users:
    /// `EPSG:3031`, `urn:ogc:def:crs:EPSG::3031`, `urn:ogc:def:crs:OGC:1.3:CRS84`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        let upper = name.to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Crs::Epsg(EPSG_WGS84);
        }
        if let Some(idx) = upper.rfind("EPSG:") {
            let tail = upper[idx + 5..].trim_start_matches(':');
            if let Ok(code) = tail.parse::<u32>() {
                return Crs::Epsg(code);
            }
        }
        Crs::Unknown
    }

    /// `Some(true)` when both sides provably agree, `Some(false)` when they
    /// provably differ, `None` when there is not enough metadata to say.
    pub fn compatible(&self, other: &Crs) -> Option<bool> {
        match (self, other) {
            (Crs::Epsg(a), Crs::Epsg(b)) => Some(a == b),
            (Crs::Wkt(a), Crs::Wkt(b)) if squash(a) == squash(b) => Some(true),
            _ => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Wkt(wkt) => {
                // First WKT token is the object name, e.g. PROJCS["WGS_1984_..."].
                let head: String = wkt.chars().take_while(|&c| c != ',').collect();
                write!(f, "{head}]")
            }
            Crs::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for Crs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Crs::Unknown => serializer.serialize_none(),
            other => serializer.collect_str(other),
        }
    }
}

fn squash(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Scan `wkt` for an `AUTHORITY` / `ID` clause sitting directly inside the
/// outermost brackets and return its EPSG code.
fn top_level_epsg(wkt: &str) -> Option<u32> {
    let bytes = wkt.as_bytes();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' => in_quotes = !in_quotes,
            b'[' | b'(' if !in_quotes => {
                depth += 1;
                if depth == 2 {
                    let keyword = keyword_before(wkt, i);
                    if keyword.eq_ignore_ascii_case("AUTHORITY") || keyword.eq_ignore_ascii_case("ID") {
                        if let Some(code) = parse_epsg_clause(&wkt[i + 1..]) {
                            return Some(code);
                        }
                    }
                }
            }
            b']' | b')' if !in_quotes => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Keyword ending at byte `bracket`. Scans bytes so that non-ASCII text
/// before the keyword never splits a character.
fn keyword_before(wkt: &str, bracket: usize) -> &str {
    let start = wkt.as_bytes()[..bracket]
        .iter()
        .rposition(|&b| !b.is_ascii_alphanumeric() && b != b'_')
        .map_or(0, |p| p + 1);
    &wkt[start..bracket]
}

/// Parse `"EPSG","3031"]` or `"EPSG",3031]`.
fn parse_epsg_clause(body: &str) -> Option<u32> {
    let end = body.find([']', ')'])?;
    let mut parts = body[..end].split(',');
    let authority = parts.next()?.trim().trim_matches('"');
    if !authority.eq_ignore_ascii_case("EPSG") {
        return None;
    }
    parts.next()?.trim().trim_matches('"').parse().ok()
}
