//! Classified GeoTIFF loading.
//!
//! Pixel values are kept in the file's native sample type; comparisons
//! against the water sentinel and nodata are done in f64.
//!
//! TIFF storage order: row 0 = northernmost for north-up rasters. No row
//! flipping is done here; the transform carries the orientation.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use num_traits::AsPrimitive;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{debug, info, warn};

use crate::coverage::Tally;
use crate::crs::Crs;
use crate::error::{CoverageError, Result};
use crate::mask::{ensure_shape, InclusionMask};
use crate::transform::GeoTransform;

/// GeoKey ids (GeoTIFF 1.1 §7).
const RASTER_TYPE_KEY: u32 = 1025;
const GEOGRAPHIC_TYPE_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_KEY: u32 = 3072;
const USER_DEFINED: u32 = 32767;
const RASTER_PIXEL_IS_POINT: u32 = 2;

/// One band of samples in its native type, row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum BandData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! each_band {
    ($band:expr, $v:ident => $body:expr) => {
        match $band {
            BandData::U8($v) => $body,
            BandData::U16($v) => $body,
            BandData::U32($v) => $body,
            BandData::U64($v) => $body,
            BandData::I8($v) => $body,
            BandData::I16($v) => $body,
            BandData::I32($v) => $body,
            BandData::I64($v) => $body,
            BandData::F32($v) => $body,
            BandData::F64($v) => $body,
        }
    };
}

impl BandData {
    pub fn len(&self) -> usize {
        each_band!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BandData::U8(_) => "u8",
            BandData::U16(_) => "u16",
            BandData::U32(_) => "u32",
            BandData::U64(_) => "u64",
            BandData::I8(_) => "i8",
            BandData::I16(_) => "i16",
            BandData::I32(_) => "i32",
            BandData::I64(_) => "i64",
            BandData::F32(_) => "f32",
            BandData::F64(_) => "f64",
        }
    }

    /// Count masked samples. With `exclude` set, nodata samples are left out
    /// of `total`.
    fn tally(&self, mask: &[bool], water: f64, nodata: Option<f64>, exclude: bool) -> Tally {
        each_band!(self, v => tally_samples(v, mask, water, nodata, exclude))
    }

    /// Split interleaved samples and keep `band` (1-based).
    fn select_band(self, samples: usize, band: usize) -> Self {
        if samples == 1 {
            return self;
        }
        macro_rules! pick {
            ($variant:ident, $v:expr) => {
                BandData::$variant($v.into_iter().skip(band - 1).step_by(samples).collect())
            };
        }
        match self {
            BandData::U8(v) => pick!(U8, v),
            BandData::U16(v) => pick!(U16, v),
            BandData::U32(v) => pick!(U32, v),
            BandData::U64(v) => pick!(U64, v),
            BandData::I8(v) => pick!(I8, v),
            BandData::I16(v) => pick!(I16, v),
            BandData::I32(v) => pick!(I32, v),
            BandData::I64(v) => pick!(I64, v),
            BandData::F32(v) => pick!(F32, v),
            BandData::F64(v) => pick!(F64, v),
        }
    }
}

fn tally_samples<T: AsPrimitive<f64>>(
    values: &[T],
    mask: &[bool],
    water: f64,
    nodata: Option<f64>,
    exclude: bool,
) -> Tally {
    let mut tally = Tally::default();
    for (&v, _) in values.iter().zip(mask).filter(|(_, &inside)| inside) {
        let v = AsPrimitive::<f64>::as_(v);
        let is_nodata = nodata.is_some_and(|nd| v == nd || (nd.is_nan() && v.is_nan()));
        if is_nodata {
            tally.nodata += 1;
            if exclude {
                continue;
            }
        }
        tally.total += 1;
        if v == water {
            tally.water += 1;
        }
    }
    tally
}

/// A single classified band plus its georeferencing.
#[derive(Debug, Clone)]
pub struct ClassRaster {
    pub band: BandData,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
    pub nodata: Option<f64>,
}

impl ClassRaster {
    /// Wrap an in-memory band. `band.len()` must equal `width * height`.
    pub fn new(band: BandData, width: usize, height: usize, transform: GeoTransform) -> Result<Self> {
        if band.len() != width * height {
            return Err(CoverageError::InvalidRaster {
                path: "<memory>".into(),
                message: format!("{} samples for a {}x{} grid", band.len(), height, width),
            });
        }
        Ok(Self {
            band,
            width,
            height,
            transform,
            crs: Crs::Unknown,
            nodata: None,
        })
    }

    /// Decode band `band` (1-based) of the GeoTIFF at `path`.
    ///
    /// The file handle lives only for the duration of this call.
    pub fn open(path: &Path, band: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| CoverageError::file_access(path, e))?;
        let tiff_err = |e: tiff::TiffError| CoverageError::tiff(path, e);
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(tiff_err)?
            .with_limits(Limits::unlimited());

        let (w, h) = decoder.dimensions().map_err(tiff_err)?;
        let (width, height) = (w as usize, h as usize);
        if width == 0 || height == 0 {
            return Err(CoverageError::InvalidRaster {
                path: path.to_path_buf(),
                message: format!("zero-sized image {width}x{height}"),
            });
        }

        let keys = read_geokeys(&mut decoder).map_err(tiff_err)?;
        let transform = match read_transform(&mut decoder).map_err(tiff_err)? {
            Some(t) if keys.pixel_is_point() => {
                debug!("PixelIsPoint raster, shifting origin by half a pixel");
                t.point_to_area()
            }
            Some(t) => t,
            None => {
                warn!(path = %path.display(), "no georeferencing tags, using pixel coordinates");
                GeoTransform::identity()
            }
        };
        let crs = keys.crs();
        let nodata = read_nodata(&mut decoder).map_err(tiff_err)?;

        let data = match decoder.read_image().map_err(tiff_err)? {
            DecodingResult::U8(v) => BandData::U8(v),
            DecodingResult::U16(v) => BandData::U16(v),
            DecodingResult::U32(v) => BandData::U32(v),
            DecodingResult::U64(v) => BandData::U64(v),
            DecodingResult::I8(v) => BandData::I8(v),
            DecodingResult::I16(v) => BandData::I16(v),
            DecodingResult::I32(v) => BandData::I32(v),
            DecodingResult::I64(v) => BandData::I64(v),
            DecodingResult::F32(v) => BandData::F32(v),
            DecodingResult::F64(v) => BandData::F64(v),
            #[allow(unreachable_patterns)]
            _ => {
                return Err(CoverageError::UnsupportedSampleType {
                    path: path.to_path_buf(),
                    kind: "unrecognised",
                })
            }
        };

        let pixels = width * height;
        if data.len() % pixels != 0 {
            return Err(CoverageError::InvalidRaster {
                path: path.to_path_buf(),
                message: format!("{} samples do not divide into {} pixels", data.len(), pixels),
            });
        }
        let samples = data.len() / pixels;
        if band == 0 || band > samples {
            return Err(CoverageError::BandOutOfRange {
                band,
                available: samples,
            });
        }
        debug!(samples, kind = data.kind(), "decoded image");
        let data = data.select_band(samples, band);

        info!(
            path = %path.display(),
            width,
            height,
            band,
            kind = data.kind(),
            crs = %crs,
            "loaded raster"
        );
        Ok(Self {
            band: data,
            width,
            height,
            transform,
            crs,
            nodata,
        })
    }

    /// (rows, cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Count the pixels selected by `mask`, and those among them equal to
    /// `water`.
    pub fn tally(&self, mask: &InclusionMask, water: f64, exclude_nodata: bool) -> Result<Tally> {
        ensure_shape(mask, self.height, self.width)?;
        Ok(self.band.tally(mask.cells(), water, self.nodata, exclude_nodata))
    }
}

fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> tiff::TiffResult<Option<GeoTransform>> {
    if let Some(m) = decoder.find_tag(Tag::ModelTransformationTag)? {
        return Ok(GeoTransform::from_model_transformation(&m.into_f64_vec()?));
    }
    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?;
    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?;
    match (tiepoint, scale) {
        (Some(tp), Some(sc)) => Ok(GeoTransform::from_tiepoint(&tp.into_f64_vec()?, &sc.into_f64_vec()?)),
        _ => Ok(None),
    }
}

/// The GeoKeys this crate acts on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct GeoKeys {
    raster_type: Option<u32>,
    projected: Option<u32>,
    geographic: Option<u32>,
}

impl GeoKeys {
    /// Decode a GeoKeyDirectory: header of four shorts, then (key id, tag
    /// location, count, value) quadruples. Only inline values (location 0)
    /// are read.
    fn parse(keys: &[u32]) -> Self {
        let mut out = Self::default();
        if keys.len() < 4 {
            return out;
        }
        let declared = keys[3] as usize;
        for entry in keys[4..].chunks_exact(4).take(declared) {
            if entry[1] != 0 {
                continue;
            }
            match entry[0] {
                RASTER_TYPE_KEY => out.raster_type = Some(entry[3]),
                PROJECTED_CS_TYPE_KEY => out.projected = Some(entry[3]),
                GEOGRAPHIC_TYPE_KEY => out.geographic = Some(entry[3]),
                _ => {}
            }
        }
        out
    }

    /// Projected code wins; a user-defined projection does not fall back to
    /// its geographic base.
    fn epsg(&self) -> Option<u32> {
        let usable = |code: u32| (code != 0 && code != USER_DEFINED).then_some(code);
        match self.projected {
            Some(code) => usable(code),
            None => self.geographic.and_then(usable),
        }
    }

    fn crs(&self) -> Crs {
        self.epsg().map_or(Crs::Unknown, Crs::Epsg)
    }

    fn pixel_is_point(&self) -> bool {
        self.raster_type == Some(RASTER_PIXEL_IS_POINT)
    }
}

fn read_geokeys<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> tiff::TiffResult<GeoKeys> {
    match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        Some(keys) => Ok(GeoKeys::parse(&keys.into_u32_vec()?)),
        None => Ok(GeoKeys::default()),
    }
}

fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> tiff::TiffResult<Option<f64>> {
    let Some(value) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    Ok(parse_nodata(&text))
}

fn parse_nodata(text: &str) -> Option<f64> {
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match text.to_ascii_lowercase().as_str() {
        "nan" | "-nan" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}
