use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::{Array3, ArrayView2, Axis};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("opening {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding TIFF {}", .path.display())]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },
    #[error("{}: {samples} samples do not fill a {width}x{height} grid", .path.display())]
    Layout {
        path: PathBuf,
        samples: usize,
        width: usize,
        height: usize,
    },
    #[error("writing {}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// Storage type of the samples in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::U8 => "uint8",
            SampleType::U16 => "uint16",
            SampleType::U32 => "uint32",
            SampleType::U64 => "uint64",
            SampleType::I8 => "int8",
            SampleType::I16 => "int16",
            SampleType::I32 => "int32",
            SampleType::I64 => "int64",
            SampleType::F32 => "float32",
            SampleType::F64 => "float64",
        };
        write!(f, "{name}")
    }
}

/// GeoTIFF model tags, when the file carries them.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    pub pixel_scale: [f64; 3],
    /// `(i, j, k, x, y, z)`: raster point `(i, j)` sits at model point `(x, y)`.
    pub tiepoint: [f64; 6],
}

/// A decoded raster, `(bands, height, width)` as `f32`.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub path: PathBuf,
    pub sample_type: SampleType,
    pub data: Array3<f32>,
    pub geo: Option<GeoReference>,
}

impl RasterImage {
    /// Decode a TIFF or GeoTIFF of any sample type and band count.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RasterError> {
        let path = path.as_ref().to_path_buf();
        let tiff_err = |source| RasterError::Tiff {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(|source| RasterError::Io {
            path: path.clone(),
            source,
        })?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(tiff_err)?
            .with_limits(Limits::unlimited());
        let (width, height) = decoder.dimensions().map_err(tiff_err)?;
        let geo = read_georeference(&mut decoder).map_err(tiff_err)?;
        let (sample_type, samples) = flatten(decoder.read_image().map_err(tiff_err)?);

        let (width, height) = (width as usize, height as usize);
        let pixels = width * height;
        if pixels == 0 || samples.len() % pixels != 0 {
            return Err(RasterError::Layout {
                path,
                samples: samples.len(),
                width,
                height,
            });
        }
        let bands = samples.len() / pixels;

        // TIFF stores pixels interleaved; move bands to the front.
        let data = Array3::from_shape_vec((height, width, bands), samples)?
            .permuted_axes([2, 0, 1])
            .as_standard_layout()
            .into_owned();

        let raster = Self {
            path,
            sample_type,
            data,
            geo,
        };
        debug!("opened {raster}");
        Ok(raster)
    }

    pub fn bands(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn band(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), index)
    }

    /// Smallest and largest finite value of each band.
    pub fn band_ranges(&self) -> Vec<(f32, f32)> {
        self.data
            .outer_iter()
            .map(|band| {
                band.iter()
                    .copied()
                    .filter(|v| v.is_finite())
                    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(v), hi.max(v))
                    })
            })
            .collect()
    }

    /// Key/value rows describing the raster.
    pub fn summary(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("path".to_string(), self.path.display().to_string()),
            (
                "size".to_string(),
                format!("{}x{}", self.width(), self.height()),
            ),
            ("bands".to_string(), self.bands().to_string()),
            ("sample type".to_string(), self.sample_type.to_string()),
        ];
        for (i, (lo, hi)) in self.band_ranges().into_iter().enumerate() {
            rows.push((format!("band {}", i + 1), format!("{lo} .. {hi}")));
        }
        match &self.geo {
            Some(geo) => {
                rows.push((
                    "pixel size".to_string(),
                    format!("{} x {}", geo.pixel_scale[0], geo.pixel_scale[1]),
                ));
                rows.push((
                    "origin".to_string(),
                    format!("{}, {}", geo.tiepoint[3], geo.tiepoint[4]),
                ));
            }
            None => rows.push(("georeference".to_string(), "none".to_string())),
        }
        rows
    }
}

impl fmt::Display for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{}, {} band(s), {})",
            self.path.display(),
            self.width(),
            self.height(),
            self.bands(),
            self.sample_type
        )
    }
}

fn read_georeference<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> tiff::TiffResult<Option<GeoReference>> {
    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?;
    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?;
    let (Some(scale), Some(tiepoint)) = (scale, tiepoint) else {
        return Ok(None);
    };
    let scale = scale.into_f64_vec()?;
    let tiepoint = tiepoint.into_f64_vec()?;
    if scale.len() < 3 || tiepoint.len() < 6 {
        return Ok(None);
    }
    let geo = GeoReference {
        pixel_scale: [scale[0], scale[1], scale[2]],
        tiepoint: [
            tiepoint[0],
            tiepoint[1],
            tiepoint[2],
            tiepoint[3],
            tiepoint[4],
            tiepoint[5],
        ],
    };
    debug!("georeferenced raster: pixel scale {:?}", geo.pixel_scale);
    Ok(Some(geo))
}

fn flatten(decoded: DecodingResult) -> (SampleType, Vec<f32>) {
    fn cast<T: Copy + Into<f64>>(v: Vec<T>) -> Vec<f32> {
        v.into_iter().map(|x| x.into() as f32).collect()
    }
    match decoded {
        DecodingResult::U8(v) => (SampleType::U8, cast(v)),
        DecodingResult::U16(v) => (SampleType::U16, cast(v)),
        DecodingResult::U32(v) => (SampleType::U32, cast(v)),
        DecodingResult::U64(v) => (SampleType::U64, v.into_iter().map(|x| x as f32).collect()),
        DecodingResult::I8(v) => (SampleType::I8, cast(v)),
        DecodingResult::I16(v) => (SampleType::I16, cast(v)),
        DecodingResult::I32(v) => (SampleType::I32, cast(v)),
        DecodingResult::I64(v) => (SampleType::I64, v.into_iter().map(|x| x as f32).collect()),
        DecodingResult::F32(v) => (SampleType::F32, v),
        DecodingResult::F64(v) => (SampleType::F64, v.into_iter().map(|x| x as f32).collect()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::BufWriter;
    use tiff::encoder::{colortype, TiffEncoder};

    pub(crate) fn write_gray16(path: &Path, width: u32, height: u32, data: &[u16]) {
        let file = BufWriter::new(File::create(path).unwrap());
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray16>(width, height, data)
            .unwrap();
    }

    pub(crate) fn write_gray32f(path: &Path, width: u32, height: u32, data: &[f32]) {
        let file = BufWriter::new(File::create(path).unwrap());
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(width, height, data)
            .unwrap();
    }

    pub(crate) fn write_rgb8(path: &Path, width: u32, height: u32, data: &[u8]) {
        let file = BufWriter::new(File::create(path).unwrap());
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::RGB8>(width, height, data)
            .unwrap();
    }

    #[test]
    fn reads_single_band_u16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S2A_MSIL2A_20170613T101031_0_45_B01.tif");
        let data: Vec<u16> = (0..20 * 20).map(|i| i as u16).collect();
        write_gray16(&path, 20, 20, &data);

        let raster = RasterImage::open(&path).unwrap();
        assert_eq!(raster.sample_type, SampleType::U16);
        assert_eq!(raster.data.dim(), (1, 20, 20));
        assert_eq!(raster.band(0)[[1, 3]], 23.0);
        assert!(raster.geo.is_none());
    }

    #[test]
    fn deinterleaves_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        // 2x1 image: red pixel then blue pixel
        write_rgb8(&path, 2, 1, &[255, 0, 0, 0, 0, 255]);

        let raster = RasterImage::open(&path).unwrap();
        assert_eq!(raster.data.dim(), (3, 1, 2));
        assert_eq!(raster.band(0).to_owned().into_raw_vec_and_offset().0, vec![255.0, 0.0]);
        assert_eq!(raster.band(2).to_owned().into_raw_vec_and_offset().0, vec![0.0, 255.0]);
    }

    #[test]
    fn reads_float_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vv.tif");
        write_gray32f(&path, 2, 2, &[-12.5, -3.0, f32::NAN, 0.5]);

        let raster = RasterImage::open(&path).unwrap();
        assert_eq!(raster.sample_type, SampleType::F32);
        assert_eq!(raster.band_ranges(), vec![(-12.5, 0.5)]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RasterImage::open("does/not/exist.tif").unwrap_err();
        assert!(matches!(err, RasterError::Io { .. }));
    }

    #[test]
    fn garbage_is_tiff_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.tif");
        std::fs::write(&path, b"definitely not a tiff").unwrap();
        assert!(matches!(
            RasterImage::open(&path).unwrap_err(),
            RasterError::Tiff { .. }
        ));
    }

    #[test]
    fn summary_lists_bands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        write_rgb8(&path, 1, 1, &[1, 2, 3]);
        let rows = RasterImage::open(&path).unwrap().summary();
        assert!(rows.iter().any(|(k, v)| k == "bands" && v == "3"));
        assert!(rows.iter().any(|(k, v)| k == "georeference" && v == "none"));
    }
}
