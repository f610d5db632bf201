use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use log::info;
use ndarray::Array1;

use crate::data::{BigEarthNet, DataLoader, DataLoaderConfig, Dataset, DatasetOptions, Sample};
use crate::map::tiles::{MapView, PlacedTile};
use crate::raster::{self, RasterImage};

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// Tiles needed to draw a view in a viewport of a given size.
pub struct MapInspection {
    pub view: MapView,
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<PlacedTile>,
}

impl MapInspection {
    pub fn new(view: MapView, width: u32, height: u32) -> Self {
        let tiles = view.visible_tiles(width as f64, height as f64);
        Self {
            view,
            width,
            height,
            tiles,
        }
    }
}

impl fmt::Display for MapInspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "center: {}", self.view.center)?;
        writeln!(f, "zoom: {}", self.view.zoom)?;
        writeln!(f, "basemap: {}", self.view.basemap)?;
        writeln!(
            f,
            "viewport: {}x{} px, {} tiles",
            self.width,
            self.height,
            self.tiles.len()
        )?;
        for tile in &self.tiles {
            writeln!(
                f,
                "  {} @ ({:.0}, {:.0})  {}",
                tile.coord,
                tile.offset.0,
                tile.offset.1,
                self.view.basemap.tile_url(tile.coord)
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// An opened raster and its RGB conversion.
pub struct ImageInspection {
    pub raster: RasterImage,
    pub rgb: RgbImage,
}

impl ImageInspection {
    pub fn open(path: &Path) -> Result<Self> {
        let raster =
            RasterImage::open(path).with_context(|| format!("opening raster {}", path.display()))?;
        let rgb = raster::to_rgb(&raster);
        info!("{raster} -> {}", raster::describe(&rgb));
        Ok(Self { raster, rgb })
    }
}

impl fmt::Display for ImageInspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", raster::describe(&self.rgb))?;
        for (key, value) in self.raster.summary() {
            writeln!(f, "  {key}: {value}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Shapes of the first batch a loader produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub image_shape: Vec<usize>,
    pub label_shape: Vec<usize>,
    pub patches: Vec<String>,
    pub label_counts: Array1<f32>,
}

/// Open BigEarthNet under `root`.
pub fn open_dataset(root: &Path, options: DatasetOptions) -> Result<BigEarthNet> {
    BigEarthNet::open(root, options)
        .with_context(|| format!("opening BigEarthNet at {}", root.display()))
}

/// One sample plus one batch from an opened dataset.
pub struct DatasetInspection {
    pub name: String,
    pub root: PathBuf,
    pub options: DatasetOptions,
    pub len: usize,
    pub index: usize,
    pub batch_size: usize,
    pub sample: Sample,
    pub label_names: Vec<&'static str>,
    pub num_batches: usize,
    pub first_batch: Option<BatchSummary>,
    pub preview: RgbImage,
}

impl DatasetInspection {
    /// Read sample `index` and the first batch of `dataset`.
    pub fn at(dataset: &BigEarthNet, config: DataLoaderConfig, index: usize) -> Result<Self> {
        let options = dataset.options();
        let batch_size = config.batch_size;

        let sample = dataset
            .get(index)
            .with_context(|| format!("loading sample {index}"))?;
        let label_names = sample.label_names(options.class_set);
        let preview = sample.rgb_preview();

        let loader = DataLoader::new(dataset, config).context("building data loader")?;
        let num_batches = loader.num_batches();
        let first_batch = loader
            .iter()
            .next()
            .transpose()
            .context("loading first batch")?
            .map(|batch| BatchSummary {
                image_shape: batch.image.shape().to_vec(),
                label_shape: batch.label.shape().to_vec(),
                label_counts: batch.label_counts(),
                patches: batch.patches,
            });

        Ok(Self {
            name: dataset.name().to_string(),
            root: dataset.root().to_path_buf(),
            options,
            len: dataset.len(),
            index,
            batch_size,
            sample,
            label_names,
            num_batches,
            first_batch,
            preview,
        })
    }
}

impl fmt::Display for DatasetInspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "dataset: {} at {} (split={}, bands={}, classes={})",
            self.name,
            self.root.display(),
            self.options.split,
            self.options.bands,
            self.options.class_set
        )?;
        writeln!(f, "len: {}", self.len)?;
        writeln!(f, "sample {}: {}", self.index, self.sample.patch)?;
        writeln!(f, "  image: {:?}", self.sample.image.shape())?;
        writeln!(f, "  label: {:?}", self.sample.label.shape())?;
        writeln!(f, "  labels: {}", self.label_names.join("; "))?;
        writeln!(f, "batches (batch_size={}): {}", self.batch_size, self.num_batches)?;
        if let Some(batch) = &self.first_batch {
            writeln!(
                f,
                "first batch: image {:?}, label {:?}",
                batch.image_shape, batch.label_shape
            )?;
        }
        Ok(())
    }
}
