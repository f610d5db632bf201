use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Web Mercator constants
// ---------------------------------------------------------------------------

/// Edge length of one XYZ tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Deepest zoom level the standard basemaps serve.
pub const MAX_ZOOM: u8 = 22;

/// Latitude where Web Mercator becomes a square world.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// Half the earth's circumference in Web Mercator meters.
pub const HALF_EARTH: f64 = 20_037_508.342_789_244;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lon)
    }
}

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Side length of the whole world in pixels at `zoom`.
pub fn world_size(zoom: u8) -> f64 {
    TILE_SIZE as f64 * 2f64.powi(zoom as i32)
}

/// Project a position into global pixel space at `zoom`.
pub fn lat_lon_to_pixel(pos: LatLon, zoom: u8) -> (f64, f64) {
    let world = world_size(zoom);
    let lat = pos.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (pos.lon + 180.0) / 360.0 * world;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * world;
    (x, y)
}

/// Web Mercator (EPSG:3857) coordinates of a position, in metres.
pub fn lat_lon_to_meters(pos: LatLon) -> (f64, f64) {
    let (x, y) = lat_lon_to_pixel(pos, 0);
    let scale = 2.0 * HALF_EARTH / world_size(0);
    (x * scale - HALF_EARTH, HALF_EARTH - y * scale)
}

/// Inverse of [`lat_lon_to_pixel`].
pub fn pixel_to_lat_lon(x: f64, y: f64, zoom: u8) -> LatLon {
    let world = world_size(zoom);
    let lon = x / world * 360.0 - 180.0;
    let n = PI - 2.0 * PI * y / world;
    let lat = n.sinh().atan().to_degrees();
    LatLon { lat, lon }
}

// ---------------------------------------------------------------------------
// Basemaps
// ---------------------------------------------------------------------------

/// Background tile layer drawn under the map view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Basemap {
    #[default]
    Satellite,
    Hybrid,
    Terrain,
    Roadmap,
    OpenStreetMap,
    /// XYZ url template with `{x}`, `{y}` and `{z}` placeholders.
    Custom(String),
}

impl Basemap {
    /// Named layers offered in the UI.
    pub const STANDARD: [Basemap; 5] = [
        Basemap::Satellite,
        Basemap::Hybrid,
        Basemap::Terrain,
        Basemap::Roadmap,
        Basemap::OpenStreetMap,
    ];

    pub fn url_template(&self) -> &str {
        match self {
            Basemap::Satellite => "https://mt1.google.com/vt/lyrs=s&x={x}&y={y}&z={z}",
            Basemap::Hybrid => "https://mt1.google.com/vt/lyrs=y&x={x}&y={y}&z={z}",
            Basemap::Terrain => "https://mt1.google.com/vt/lyrs=p&x={x}&y={y}&z={z}",
            Basemap::Roadmap => "https://mt1.google.com/vt/lyrs=m&x={x}&y={y}&z={z}",
            Basemap::OpenStreetMap => "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
            Basemap::Custom(template) => template,
        }
    }

    pub fn attribution(&self) -> &'static str {
        match self {
            Basemap::OpenStreetMap => "&copy; OpenStreetMap contributors",
            Basemap::Custom(_) => "",
            _ => "Google",
        }
    }

    /// Concrete url for one tile.
    pub fn tile_url(&self, coord: TileCoord) -> String {
        self.url_template()
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
            .replace("{z}", &coord.z.to_string())
    }
}

impl fmt::Display for Basemap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Basemap::Satellite => write!(f, "SATELLITE"),
            Basemap::Hybrid => write!(f, "HYBRID"),
            Basemap::Terrain => write!(f, "TERRAIN"),
            Basemap::Roadmap => write!(f, "ROADMAP"),
            Basemap::OpenStreetMap => write!(f, "OpenStreetMap"),
            Basemap::Custom(template) => write!(f, "{template}"),
        }
    }
}

impl FromStr for Basemap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "satellite" => Ok(Basemap::Satellite),
            "hybrid" => Ok(Basemap::Hybrid),
            "terrain" => Ok(Basemap::Terrain),
            "roadmap" => Ok(Basemap::Roadmap),
            "openstreetmap" | "osm" => Ok(Basemap::OpenStreetMap),
            _ if ["{x}", "{y}", "{z}"].iter().all(|p| s.contains(p)) => {
                Ok(Basemap::Custom(s.to_string()))
            }
            _ => Err(format!(
                "unknown basemap '{s}' (expected satellite, hybrid, terrain, roadmap, osm or an XYZ url template)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Map view
// ---------------------------------------------------------------------------

/// A tile together with where its top-left corner lands in the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedTile {
    pub coord: TileCoord,
    pub offset: (f64, f64),
}

/// Centre, zoom and basemap of a map widget.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub center: LatLon,
    pub zoom: u8,
    pub basemap: Basemap,
}

impl MapView {
    pub fn new(center: LatLon, zoom: u8, basemap: Basemap) -> Self {
        let center = LatLon {
            lat: center.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE),
            lon: wrap_longitude(center.lon),
        };
        Self {
            center,
            zoom: zoom.min(MAX_ZOOM),
            basemap,
        }
    }

    /// Global pixel of the viewport's top-left corner.
    pub fn top_left_pixel(&self, width: f64, height: f64) -> (f64, f64) {
        let (cx, cy) = lat_lon_to_pixel(self.center, self.zoom);
        (cx - width / 2.0, cy - height / 2.0)
    }

    /// Every tile intersecting a `width` x `height` viewport centred on the view.
    pub fn visible_tiles(&self, width: f64, height: f64) -> Vec<PlacedTile> {
        if width <= 0.0 || height <= 0.0 {
            return Vec::new();
        }
        let tile = TILE_SIZE as f64;
        let (left, top) = self.top_left_pixel(width, height);
        let n = 1i64 << self.zoom;

        let first_x = (left / tile).floor() as i64;
        let last_x = ((left + width) / tile).ceil() as i64 - 1;
        let first_y = (top / tile).floor() as i64;
        let last_y = ((top + height) / tile).ceil() as i64 - 1;

        let mut tiles = Vec::new();
        for ty in first_y..=last_y {
            if ty < 0 || ty >= n {
                continue;
            }
            for tx in first_x..=last_x {
                let coord = TileCoord::new(self.zoom, tx.rem_euclid(n) as u32, ty as u32);
                let offset = (tx as f64 * tile - left, ty as f64 * tile - top);
                tiles.push(PlacedTile { coord, offset });
            }
        }
        tiles
    }

    /// Move the centre by a screen-space delta.
    pub fn pan_pixels(&mut self, dx: f64, dy: f64) {
        let world = world_size(self.zoom);
        let (cx, cy) = lat_lon_to_pixel(self.center, self.zoom);
        let x = (cx + dx).rem_euclid(world);
        let y = (cy + dy).clamp(0.0, world);
        let moved = pixel_to_lat_lon(x, y, self.zoom);
        self.center = LatLon {
            lat: moved.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE),
            lon: wrap_longitude(moved.lon),
        };
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + 1).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = self.zoom.saturating_sub(1);
    }

    /// Ground size of one pixel in Web Mercator meters.
    pub fn meters_per_pixel(&self) -> f64 {
        2.0 * HALF_EARTH / world_size(self.zoom)
    }
}

fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}
