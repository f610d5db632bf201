use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::{Bands, ClassSet, DataLoaderConfig, DatasetOptions, Split};
use crate::map::tiles::{Basemap, LatLon, MapView};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Look at satellite basemaps, GeoTIFFs and BigEarthNet patches.
#[derive(Debug, Parser)]
#[command(name = "rusty-earth", version, about)]
pub struct Cli {
    /// Print to stdout instead of opening a window.
    #[arg(long, global = true)]
    pub headless: bool,

    /// Disable TLS certificate verification for network access.
    #[arg(long, global = true)]
    pub insecure: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show a basemap centred on a coordinate.
    Map(MapArgs),
    /// Open a TIFF/GeoTIFF and show it as RGB.
    Image(ImageArgs),
    /// Load BigEarthNet, print one sample and one batch, plot the sample.
    Dataset(DatasetArgs),
}

#[derive(Debug, Clone, Args)]
pub struct MapArgs {
    #[arg(long, default_value_t = 29.676840, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, default_value_t = -95.369222, allow_negative_numbers = true)]
    pub lon: f64,

    #[arg(long, default_value_t = 19)]
    pub zoom: u8,

    /// satellite, hybrid, terrain, roadmap, osm, or an XYZ url template.
    #[arg(long, default_value = "satellite", env = "RUSTY_EARTH_TILE_URL")]
    pub basemap: Basemap,

    /// Write a Leaflet page for the view.
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Download the visible tiles and write them as a GeoTIFF.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Viewport width in pixels for headless output and exports.
    #[arg(long, default_value_t = 768)]
    pub width: u32,

    /// Viewport height in pixels for headless output and exports.
    #[arg(long, default_value_t = 512)]
    pub height: u32,
}

impl MapArgs {
    pub fn view(&self) -> MapView {
        MapView::new(
            LatLon::new(self.lat, self.lon),
            self.zoom,
            self.basemap.clone(),
        )
    }
}

#[derive(Debug, Clone, Args)]
pub struct ImageArgs {
    #[arg(default_value = "satellite.tif")]
    pub path: PathBuf,

    /// Also save the RGB conversion as JPEG.
    #[arg(long)]
    pub jpeg: Option<PathBuf>,

    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,
}

#[derive(Debug, Clone, Args)]
pub struct DatasetArgs {
    #[arg(long, default_value = "./dataset/", env = "RUSTY_EARTH_DATASET_ROOT")]
    pub root: PathBuf,

    /// s1, s2 or all.
    #[arg(long, default_value = "s2")]
    pub bands: Bands,

    /// train, val or test.
    #[arg(long, default_value = "train")]
    pub split: Split,

    /// 19 or 43.
    #[arg(long = "num-classes", default_value = "19")]
    pub class_set: ClassSet,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,

    /// Sample to print and plot.
    #[arg(long, default_value_t = 0)]
    pub index: usize,

    #[arg(long)]
    pub shuffle: bool,

    /// Skip a trailing batch smaller than `--batch-size`.
    #[arg(long)]
    pub drop_last: bool,

    /// Seed for `--shuffle`.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl DatasetArgs {
    pub fn options(&self) -> DatasetOptions {
        DatasetOptions {
            bands: self.bands,
            split: self.split,
            class_set: self.class_set,
        }
    }

    pub fn loader_config(&self) -> DataLoaderConfig {
        let config = DataLoaderConfig::default()
            .batch_size(self.batch_size as usize)
            .shuffle(self.shuffle)
            .drop_last(self.drop_last);
        match self.seed {
            Some(seed) => config.seed(seed),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn map_defaults_match_houston_view() {
        let cli = Cli::try_parse_from(["rusty-earth", "map"]).unwrap();
        let Command::Map(args) = cli.command else {
            panic!("expected map command");
        };
        let view = args.view();
        assert_eq!(view.center, LatLon::new(29.676840, -95.369222));
        assert_eq!(view.zoom, 19);
        assert_eq!(view.basemap, Basemap::Satellite);
    }

    #[test]
    fn negative_coordinates_parse() {
        let cli = Cli::try_parse_from([
            "rusty-earth", "--headless", "map", "--lat", "-33.86", "--lon", "151.2", "--basemap",
            "osm",
        ])
        .unwrap();
        assert!(cli.headless);
        let Command::Map(args) = cli.command else {
            panic!("expected map command");
        };
        assert_eq!(args.lat, -33.86);
        assert_eq!(args.basemap, Basemap::OpenStreetMap);
    }

    #[test]
    fn image_defaults_to_satellite_tif() {
        let cli = Cli::try_parse_from(["rusty-earth", "image"]).unwrap();
        let Command::Image(args) = cli.command else {
            panic!("expected image command");
        };
        assert_eq!(args.path, PathBuf::from("satellite.tif"));
        assert!(args.jpeg.is_none());
    }

    #[test]
    fn dataset_flags() {
        let cli = Cli::try_parse_from([
            "rusty-earth",
            "dataset",
            "--root",
            "/data/ben",
            "--bands",
            "all",
            "--num-classes",
            "43",
            "--batch-size",
            "4",
            "--shuffle",
            "--drop-last",
            "--seed",
            "3",
            "--insecure",
        ])
        .unwrap();
        assert!(cli.insecure);
        let Command::Dataset(args) = cli.command else {
            panic!("expected dataset command");
        };
        assert_eq!(args.options().bands, Bands::All);
        assert_eq!(args.options().class_set, ClassSet::FortyThree);
        let config = args.loader_config();
        assert_eq!(config.batch_size, 4);
        assert!(config.shuffle);
        assert!(config.drop_last);
        assert_eq!(config.seed, Some(3));
    }

    #[test]
    fn rejects_zero_batch_size() {
        assert!(Cli::try_parse_from(["rusty-earth", "dataset", "--batch-size", "0"]).is_err());
    }
}
