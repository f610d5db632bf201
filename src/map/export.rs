use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops, RgbaImage};
use log::{info, warn};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use super::fetch::TileSource;
use super::tiles::{MapView, HALF_EARTH};

/// EPSG code of Web Mercator.
const EPSG_WEB_MERCATOR: u16 = 3857;

/// Tiles of a view composed into one image.
pub struct Mosaic {
    pub image: RgbaImage,
    /// Global pixel of the image's top-left corner at `zoom`.
    pub top_left: (f64, f64),
    pub zoom: u8,
    pub meters_per_pixel: f64,
}

impl Mosaic {
    /// Web Mercator coordinates of the image's top-left corner.
    pub fn origin_meters(&self) -> (f64, f64) {
        (
            self.top_left.0 * self.meters_per_pixel - HALF_EARTH,
            HALF_EARTH - self.top_left.1 * self.meters_per_pixel,
        )
    }
}

/// Fetch and paste every tile covering a `width` x `height` window.
///
/// Tiles that fail are left transparent.
pub fn render_mosaic(
    view: &MapView,
    width: u32,
    height: u32,
    source: &mut dyn TileSource,
) -> Mosaic {
    let mut image = RgbaImage::new(width, height);
    let placed = view.visible_tiles(width as f64, height as f64);
    let mut missing = 0usize;

    for tile in &placed {
        match source.tile(tile.coord) {
            Ok(pixels) => imageops::overlay(
                &mut image,
                pixels.as_ref(),
                tile.offset.0.round() as i64,
                tile.offset.1.round() as i64,
            ),
            Err(e) => {
                warn!("skipping tile {}: {:#}", tile.coord, anyhow::Error::from(e));
                missing += 1;
            }
        }
    }
    info!(
        "mosaic {width}x{height} at zoom {}: {} tiles, {missing} missing",
        view.zoom,
        placed.len()
    );

    Mosaic {
        image,
        top_left: view.top_left_pixel(width as f64, height as f64),
        zoom: view.zoom,
        meters_per_pixel: view.meters_per_pixel(),
    }
}

/// Write the mosaic as an RGB GeoTIFF in EPSG:3857.
pub fn write_geotiff(mosaic: &Mosaic, path: &Path) -> Result<()> {
    let (width, height) = mosaic.image.dimensions();
    let rgb: Vec<u8> = mosaic
        .image
        .pixels()
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect();
    write_rgb_geotiff(path, width, height, &rgb, mosaic.origin_meters(), mosaic.meters_per_pixel)
}

/// Write interleaved RGB8 pixels as a north-up EPSG:3857 GeoTIFF.
///
/// `origin` is the Web Mercator position of the top-left corner.
pub fn write_rgb_geotiff(
    path: &Path,
    width: u32,
    height: u32,
    rgb: &[u8],
    origin: (f64, f64),
    meters_per_pixel: f64,
) -> Result<()> {
    let pixel_scale = [meters_per_pixel, meters_per_pixel, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, origin.0, origin.1, 0.0];
    // GeoKey directory: projected model, pixel-is-area, EPSG:3857
    let geokeys: [u16; 16] = [
        1, 1, 0, 3, //
        1024, 0, 1, 1, //
        1025, 0, 1, 1, //
        3072, 0, 1, EPSG_WEB_MERCATOR,
    ];

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).context("starting TIFF encoder")?;
    let mut image = encoder
        .new_image::<colortype::RGB8>(width, height)
        .context("starting TIFF image")?;
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &pixel_scale[..])
        .context("writing pixel scale")?;
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .context("writing tiepoint")?;
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
        .context("writing geokeys")?;
    image
        .write_data(rgb)
        .with_context(|| format!("writing {}", path.display()))?;

    info!("wrote {} ({width}x{height}, EPSG:3857)", path.display());
    Ok(())
}

/// Write a standalone Leaflet page showing the view.
pub fn write_leaflet_html(view: &MapView, path: &Path) -> Result<()> {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>rusty-earth map</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
  <div id="map"></div>
  <script>
    var map = L.map('map').setView([{lat}, {lon}], {zoom});
    L.tileLayer({url}, {{
      maxZoom: {max_zoom},
      attribution: {attribution}
    }}).addTo(map);
  </script>
</body>
</html>
"#,
        lat = view.center.lat,
        lon = view.center.lon,
        zoom = view.zoom,
        url = js_string(view.basemap.url_template())?,
        max_zoom = super::tiles::MAX_ZOOM,
        attribution = js_string(view.basemap.attribution())?,
    );

    let mut file =
        BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
    file.write_all(html.as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;
    file.flush()?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Quote `value` as a JavaScript string literal that is safe inside `<script>`.
fn js_string(value: &str) -> Result<String> {
    let quoted = serde_json::to_string(value).context("quoting for HTML")?;
    Ok(quoted.replace("</", "<\\/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::fetch::tests::SolidTiles;
    use crate::map::tiles::{Basemap, LatLon};
    use crate::raster::RasterImage;

    fn view() -> MapView {
        MapView::new(LatLon::new(29.676840, -95.369222), 19, Basemap::Satellite)
    }

    #[test]
    fn mosaic_has_requested_size() {
        let mosaic = render_mosaic(&view(), 300, 200, &mut SolidTiles { size: 256 });
        assert_eq!(mosaic.image.dimensions(), (300, 200));
        assert_eq!(mosaic.zoom, 19);
    }

    #[test]
    fn failed_tiles_stay_transparent() {
        // Tile columns alternate between success and failure.
        let mosaic = render_mosaic(&view(), 1024, 256, &mut SolidTiles { size: 256 });
        let alphas: Vec<u8> = (0..1024)
            .step_by(64)
            .map(|x| mosaic.image.get_pixel(x, 128)[3])
            .collect();
        assert!(alphas.contains(&0));
        assert!(alphas.contains(&255));
    }

    #[test]
    fn origin_matches_view() {
        let view = MapView::new(LatLon::new(0.0, 0.0), 0, Basemap::Satellite);
        let mosaic = render_mosaic(&view, 256, 256, &mut SolidTiles { size: 256 });
        let (x, y) = mosaic.origin_meters();
        assert!((x + HALF_EARTH).abs() < 1e-6);
        assert!((y - HALF_EARTH).abs() < 1e-6);
    }

    #[test]
    fn geotiff_round_trips_through_raster_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("satellite.tif");
        let mosaic = render_mosaic(&view(), 64, 32, &mut SolidTiles { size: 256 });
        write_geotiff(&mosaic, &path).unwrap();

        let raster = RasterImage::open(&path).unwrap();
        assert_eq!((raster.width(), raster.height(), raster.bands()), (64, 32, 3));
        let geo = raster.geo.expect("georeference tags");
        assert!((geo.pixel_scale[0] - mosaic.meters_per_pixel).abs() < 1e-9);
        assert!((geo.tiepoint[3] - mosaic.origin_meters().0).abs() < 1e-6);
    }

    #[test]
    fn html_contains_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my_map.html");
        write_leaflet_html(&view(), &path).unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("setView([29.67684, -95.369222], 19)"));
        assert!(html.contains("lyrs=s"));
        assert!(html.contains(r#"attribution: "Google""#));
    }

    #[test]
    fn html_quotes_custom_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my_map.html");
        let template = r#"https://tiles.example/{z}/{x}/{y}.png?name=o'brien&q="a"</script>"#;
        let view = MapView::new(
            LatLon::new(0.0, 0.0),
            3,
            Basemap::Custom(template.to_string()),
        );
        write_leaflet_html(&view, &path).unwrap();
        let html = std::fs::read_to_string(&path).unwrap();

        assert!(html.contains(r#"L.tileLayer("https://tiles.example/{z}/{x}/{y}.png?"#));
        assert!(html.contains(r#"name=o'brien&q=\"a\"<\/script>", {"#));
        assert_eq!(html.matches("</script>").count(), 2);
        assert!(html.contains(r#"attribution: """#));
    }

    #[test]
    fn rgb_geotiff_keeps_origin_and_scale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.tif");
        let rgb: Vec<u8> = (0..4 * 2 * 3).map(|v| v as u8).collect();
        write_rgb_geotiff(&path, 4, 2, &rgb, (-1000.0, 2000.0), 0.5).unwrap();

        let raster = RasterImage::open(&path).unwrap();
        assert_eq!((raster.width(), raster.height(), raster.bands()), (4, 2, 3));
        let geo = raster.geo.expect("georeference tags");
        assert_eq!(geo.pixel_scale[..2], [0.5, 0.5]);
        assert_eq!(geo.tiepoint[3..5], [-1000.0, 2000.0]);
    }

    #[test]
    fn failing_tiles_do_not_abort_mosaic() {
        let view = MapView::new(LatLon::new(0.0, 0.0), 1, Basemap::Satellite);
        let mosaic = render_mosaic(&view, 512, 512, &mut SolidTiles { size: 256 });
        // Column x = 1 fails, column x = 0 is painted.
        assert_eq!(mosaic.image.get_pixel(10, 10)[3], 255);
        assert_eq!(mosaic.image.get_pixel(500, 10)[3], 0);
    }
}
