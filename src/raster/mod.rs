/// Image inspector: decode TIFF/GeoTIFF rasters and turn them into RGB previews.

pub mod convert;
pub mod reader;

pub use convert::{describe, save_jpeg, to_rgb};
pub use reader::{RasterError, RasterImage};
