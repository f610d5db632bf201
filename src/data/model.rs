use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use image::RgbImage;
use ndarray::{Array1, Array2, Array3, Array4, Axis};

use super::labels::ClassSet;
use crate::raster::convert::{compose_rgb, Scaling};
use crate::raster::RasterError;

/// Edge length every band is resampled to.
pub const PATCH_SIZE: usize = 120;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset directory {} not found; download BigEarthNet v1.0 and extract it under the dataset root", .0.display())]
    MissingDirectory(PathBuf),
    #[error("reading split file {}", .path.display())]
    SplitFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("split file {}: row {row} needs an S2 and an S1 patch name", .path.display())]
    SplitRow { path: PathBuf, row: usize },
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("reading band {band} of patch {patch}")]
    Band {
        patch: String,
        band: &'static str,
        #[source]
        source: RasterError,
    },
    #[error("reading labels {}", .path.display())]
    LabelsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing labels {}", .path.display())]
    LabelsJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown BigEarthNet label {0:?}")]
    UnknownLabel(String),
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error("cannot build a batch from zero samples")]
    EmptyBatch,
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

// ---------------------------------------------------------------------------
// Band selection
// ---------------------------------------------------------------------------

pub const S1_BANDS: [&str; 2] = ["VV", "VH"];
pub const S2_BANDS: [&str; 12] = [
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B08", "B8A", "B09", "B11", "B12",
];

/// Edge length in pixels of a Sentinel-2 band at its native 10, 20 or 60 m resolution.
pub fn native_size(band: &str) -> u32 {
    match band {
        "B02" | "B03" | "B04" | "B08" => PATCH_SIZE as u32,
        "B01" | "B09" => 20,
        _ => 60,
    }
}

/// Which sensor's bands a sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bands {
    S1,
    #[default]
    S2,
    /// Sentinel-1 followed by Sentinel-2.
    All,
}

impl Bands {
    pub fn names(self) -> Vec<&'static str> {
        match self {
            Bands::S1 => S1_BANDS.to_vec(),
            Bands::S2 => S2_BANDS.to_vec(),
            Bands::All => S1_BANDS.iter().chain(S2_BANDS.iter()).copied().collect(),
        }
    }

    pub fn uses_s1(self) -> bool {
        matches!(self, Bands::S1 | Bands::All)
    }

    pub fn uses_s2(self) -> bool {
        matches!(self, Bands::S2 | Bands::All)
    }
}

pub fn is_s1_band(band: &str) -> bool {
    S1_BANDS.contains(&band)
}

impl fmt::Display for Bands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Bands::S1 => "s1",
            Bands::S2 => "s2",
            Bands::All => "all",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Bands {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s1" => Ok(Bands::S1),
            "s2" => Ok(Bands::S2),
            "all" => Ok(Bands::All),
            _ => Err(format!("unknown band set '{s}' (expected s1, s2 or all)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Split
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Split {
    #[default]
    Train,
    Val,
    Test,
}

impl Split {
    /// Name of the header-less `s2_patch,s1_patch` list for this split.
    pub fn filename(self) -> String {
        format!("bigearthnet-{self}.csv")
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "val" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            _ => Err(format!("unknown split '{s}' (expected train, val or test)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Sample and batch
// ---------------------------------------------------------------------------

/// One patch: stacked bands and its multi-hot label vector.
#[derive(Debug, Clone)]
pub struct Sample {
    pub patch: String,
    pub bands: Vec<&'static str>,
    /// `(bands, 120, 120)`
    pub image: Array3<f32>,
    /// `(num_classes,)`
    pub label: Array1<f32>,
}

impl Sample {
    /// Mean of every band, in band order.
    pub fn band_means(&self) -> Vec<f64> {
        self.image
            .outer_iter()
            .map(|band| band.mean().map_or(0.0, f64::from))
            .collect()
    }

    /// Class names whose entry in `label` is set.
    pub fn label_names(&self, class_set: ClassSet) -> Vec<&'static str> {
        class_set.decode(&self.label)
    }

    /// True-colour (B04, B03, B02) preview, or the first band in grey.
    pub fn rgb_preview(&self) -> RgbImage {
        let position = |name: &str| self.bands.iter().position(|b| *b == name);
        let channels = match (position("B04"), position("B03"), position("B02")) {
            (Some(r), Some(g), Some(b)) => [r, g, b],
            _ => [0, 0, 0],
        };
        compose_rgb(
            channels.map(|i| self.image.index_axis(Axis(0), i)),
            Scaling::default_stretch(),
        )
    }
}

/// Samples stacked along a leading batch axis.
#[derive(Debug, Clone)]
pub struct Batch {
    pub patches: Vec<String>,
    /// `(n, bands, 120, 120)`
    pub image: Array4<f32>,
    /// `(n, num_classes)`
    pub label: Array2<f32>,
}

impl Batch {
    pub fn collate(samples: Vec<Sample>) -> Result<Self, DatasetError> {
        if samples.is_empty() {
            return Err(DatasetError::EmptyBatch);
        }
        let (image, label) = {
            let images: Vec<_> = samples.iter().map(|s| s.image.view()).collect();
            let labels: Vec<_> = samples.iter().map(|s| s.label.view()).collect();
            (
                ndarray::stack(Axis(0), &images)?,
                ndarray::stack(Axis(0), &labels)?,
            )
        };
        let patches = samples.into_iter().map(|s| s.patch).collect();
        Ok(Self {
            patches,
            image,
            label,
        })
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// How many samples in the batch carry each class.
    pub fn label_counts(&self) -> Array1<f32> {
        self.label.sum_axis(Axis(0))
    }
}

// ---------------------------------------------------------------------------
// Dataset trait
// ---------------------------------------------------------------------------

/// An indexed collection of samples, read on every access.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<Sample, DatasetError>;

    fn name(&self) -> &str {
        "dataset"
    }
}
