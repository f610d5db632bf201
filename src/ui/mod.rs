pub mod map;
pub mod panels;
pub mod plot;
pub mod raster_view;

use eframe::egui::ColorImage;
use image::RgbImage;

/// Copy an `image` RGB buffer into something egui can upload as a texture.
pub fn rgb_to_color_image(rgb: &RgbImage) -> ColorImage {
    ColorImage::from_rgb([rgb.width() as usize, rgb.height() as usize], rgb.as_raw())
}
