/// Map viewer: XYZ tile math, basemap fetching and exports.
///
/// ```text
///  centre + zoom + basemap
///        │
///        ▼
///   ┌──────────┐
///   │  tiles    │  visible tile coords + screen offsets
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  fetch    │  HTTP → decoded RGBA tiles (cached)
///   └──────────┘
///        │
///        ▼
///   window canvas  /  export (GeoTIFF mosaic, Leaflet HTML)
/// ```

pub mod export;
pub mod fetch;
pub mod tiles;

pub use fetch::{FetchConfig, TileFetcher, TileWorker};
pub use tiles::{Basemap, MapView, TileCoord};
