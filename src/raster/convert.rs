use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use log::info;
use ndarray::{Array2, ArrayView2};

use super::reader::{RasterError, RasterImage, SampleType};

/// Percentiles used when stretching wide sample types into 8 bits.
pub const STRETCH_LOW: f64 = 0.02;
pub const STRETCH_HIGH: f64 = 0.98;

/// How band values become 0..=255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scaling {
    /// Values are already bytes; clamp and round.
    Passthrough,
    /// Linear stretch between two percentiles of all channel values.
    Percentile { low: f64, high: f64 },
}

impl Scaling {
    pub fn default_stretch() -> Self {
        Scaling::Percentile {
            low: STRETCH_LOW,
            high: STRETCH_HIGH,
        }
    }
}

/// Value at quantile `q` of the finite entries, `None` when there are none.
pub fn percentile(values: &[f32], q: f64) -> Option<f32> {
    let mut finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f32::total_cmp);
    let rank = ((finite.len() - 1) as f64 * q.clamp(0.0, 1.0)).round() as usize;
    Some(finite[rank])
}

/// Build an 8-bit RGB image from three equally sized channels.
pub fn compose_rgb(channels: [ArrayView2<'_, f32>; 3], scaling: Scaling) -> RgbImage {
    let (height, width) = channels[0].dim();

    let map: Box<dyn Fn(f32) -> u8> = match scaling {
        Scaling::Passthrough => Box::new(|v: f32| v.round().clamp(0.0, 255.0) as u8),
        Scaling::Percentile { low, high } => {
            let all: Vec<f32> = channels.iter().flat_map(|c| c.iter().copied()).collect();
            match (percentile(&all, low), percentile(&all, high)) {
                (Some(lo), Some(hi)) if hi > lo => {
                    let range = hi - lo;
                    Box::new(move |v: f32| {
                        if v.is_finite() {
                            ((v - lo) / range * 255.0).round().clamp(0.0, 255.0) as u8
                        } else {
                            0
                        }
                    })
                }
                _ => Box::new(|_: f32| 0u8),
            }
        }
    };

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (row, col) = (y as usize, x as usize);
        image::Rgb([
            map(channels[0][[row, col]]),
            map(channels[1][[row, col]]),
            map(channels[2][[row, col]]),
        ])
    })
}

/// Convert a raster to RGB for display.
///
/// One or two bands become grey (first band replicated); otherwise the first
/// three bands are used. 8-bit data is kept as is, wider types are stretched.
pub fn to_rgb(raster: &RasterImage) -> RgbImage {
    let channels = if raster.bands() >= 3 {
        [raster.band(0), raster.band(1), raster.band(2)]
    } else {
        [raster.band(0), raster.band(0), raster.band(0)]
    };
    let scaling = match raster.sample_type {
        SampleType::U8 => Scaling::Passthrough,
        _ => Scaling::default_stretch(),
    };
    compose_rgb(channels, scaling)
}

/// One-line description of an RGB image.
pub fn describe(rgb: &RgbImage) -> String {
    format!("RgbImage mode=RGB size={}x{}", rgb.width(), rgb.height())
}

pub fn save_jpeg(rgb: &RgbImage, path: &Path, quality: u8) -> Result<(), RasterError> {
    let encode_err = |source| RasterError::Encode {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(|source| RasterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality.clamp(1, 100));
    encoder.encode_image(rgb).map_err(encode_err)?;
    info!("wrote {} ({})", path.display(), describe(rgb));
    Ok(())
}

/// Bilinear resampling with pixel centres aligned.
pub fn resample_bilinear(src: ArrayView2<'_, f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (h, w) = src.dim();
    if (h, w) == (out_h, out_w) {
        return src.to_owned();
    }
    if h == 0 || w == 0 {
        return Array2::zeros((out_h, out_w));
    }
    let scale_y = h as f32 / out_h as f32;
    let scale_x = w as f32 / out_w as f32;
    let max_y = (h - 1) as f32;
    let max_x = (w - 1) as f32;

    Array2::from_shape_fn((out_h, out_w), |(i, j)| {
        let y = ((i as f32 + 0.5) * scale_y - 0.5).clamp(0.0, max_y);
        let x = ((j as f32 + 0.5) * scale_x - 0.5).clamp(0.0, max_x);
        let (y0, x0) = (y.floor() as usize, x.floor() as usize);
        let (y1, x1) = ((y0 + 1).min(h - 1), (x0 + 1).min(w - 1));
        let (fy, fx) = (y - y0 as f32, x - x0 as f32);

        let top = src[[y0, x0]] * (1.0 - fx) + src[[y0, x1]] * fx;
        let bottom = src[[y1, x0]] * (1.0 - fx) + src[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::reader::tests::{write_gray16, write_rgb8};
    use ndarray::array;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(0.5, 3.0)]
    #[case(1.0, 5.0)]
    fn picks_percentiles(#[case] q: f64, #[case] expected: f32) {
        let values = [5.0, f32::NAN, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(percentile(&values, q), Some(expected));
    }

    #[test]
    fn percentile_of_nothing() {
        assert_eq!(percentile(&[f32::NAN], 0.5), None);
    }

    #[test]
    fn rgb_passthrough_keeps_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("satellite.tif");
        write_rgb8(&path, 2, 1, &[10, 20, 30, 40, 50, 60]);
        let rgb = to_rgb(&RasterImage::open(&path).unwrap());
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(rgb.get_pixel(1, 0).0, [40, 50, 60]);
    }

    #[test]
    fn single_band_u16_is_stretched_grey() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");
        let data: Vec<u16> = (0..100).map(|i| i * 100).collect();
        write_gray16(&path, 10, 10, &data);

        let rgb = to_rgb(&RasterImage::open(&path).unwrap());
        assert_eq!(rgb.dimensions(), (10, 10));
        let first = rgb.get_pixel(0, 0).0;
        let last = rgb.get_pixel(9, 9).0;
        assert_eq!(first, [0, 0, 0]);
        assert_eq!(last, [255, 255, 255]);
        assert_eq!(first[0], first[1]);
    }

    #[test]
    fn constant_image_maps_to_black() {
        let band = Array2::from_elem((3, 3), 1234.0f32);
        let rgb = compose_rgb([band.view(), band.view(), band.view()], Scaling::default_stretch());
        assert!(rgb.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn describes_like_an_image_repr() {
        let rgb = RgbImage::new(120, 80);
        assert_eq!(describe(&rgb), "RgbImage mode=RGB size=120x80");
    }

    #[test]
    fn writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let rgb = RgbImage::from_pixel(16, 16, image::Rgb([200, 100, 50]));
        save_jpeg(&rgb, &path, 90).unwrap();
        let back = image::open(&path).unwrap();
        assert_eq!((back.width(), back.height()), (16, 16));
    }

    #[test]
    fn resample_keeps_constant_field() {
        let band = Array2::from_elem((20, 20), 7.0f32);
        let up = resample_bilinear(band.view(), 120, 120);
        assert_eq!(up.dim(), (120, 120));
        assert!(up.iter().all(|v| (v - 7.0).abs() < 1e-5));
    }

    #[test]
    fn resample_preserves_corners() {
        let band = array![[0.0f32, 10.0], [20.0, 30.0]];
        let up = resample_bilinear(band.view(), 4, 4);
        assert_eq!(up[[0, 0]], 0.0);
        assert_eq!(up[[0, 3]], 10.0);
        assert_eq!(up[[3, 0]], 20.0);
        assert_eq!(up[[3, 3]], 30.0);
        assert!(up[[1, 1]] > 0.0 && up[[1, 1]] < 30.0);
    }
}
