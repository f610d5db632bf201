use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{Array1, Array3, Axis};
use serde::Deserialize;

use super::labels::ClassSet;
use super::model::{
    is_s1_band, Bands, Dataset, DatasetError, Sample, Split, PATCH_SIZE,
};
use crate::raster::convert::resample_bilinear;
use crate::raster::RasterImage;

/// Directory holding the Sentinel-2 patches.
pub const S2_DIR: &str = "BigEarthNet-v1.0";
/// Directory holding the Sentinel-1 patches.
pub const S1_DIR: &str = "BigEarthNet-S1-v1.0";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which part of BigEarthNet to expose and how to label it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DatasetOptions {
    pub bands: Bands,
    pub split: Split,
    pub class_set: ClassSet,
}

/// The bit of `<patch>_labels_metadata.json` we need.
#[derive(Debug, Deserialize)]
struct LabelMetadata {
    labels: Vec<String>,
}

#[derive(Debug, Clone)]
struct PatchPair {
    s2: String,
    s1: String,
}

// ---------------------------------------------------------------------------
// BigEarthNet v1 on disk
// ---------------------------------------------------------------------------

/// BigEarthNet v1 patches listed in one split file.
///
/// Layout under `root`:
///
/// ```text
/// bigearthnet-{train,val,test}.csv          s2_patch,s1_patch per row
/// BigEarthNet-v1.0/<s2>/<s2>_B01.tif ...    + <s2>_labels_metadata.json
/// BigEarthNet-S1-v1.0/<s1>/<s1>_VV.tif ...  + <s1>_labels_metadata.json
/// ```
#[derive(Debug)]
pub struct BigEarthNet {
    root: PathBuf,
    options: DatasetOptions,
    patches: Vec<PatchPair>,
}

impl BigEarthNet {
    pub fn open(root: impl AsRef<Path>, options: DatasetOptions) -> Result<Self, DatasetError> {
        let root = root.as_ref().to_path_buf();
        let required = [
            (options.bands.uses_s2(), S2_DIR),
            (options.bands.uses_s1(), S1_DIR),
        ];
        for (needed, dir) in required {
            let dir = root.join(dir);
            if needed && !dir.is_dir() {
                return Err(DatasetError::MissingDirectory(dir));
            }
        }

        let patches = read_split(&root.join(options.split.filename()))?;
        info!(
            "BigEarthNet {} split at {}: {} patches, bands={}, classes={}",
            options.split,
            root.display(),
            patches.len(),
            options.bands,
            options.class_set
        );
        Ok(Self {
            root,
            options,
            patches,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> DatasetOptions {
        self.options
    }

    fn patch_dir<'p>(&self, pair: &'p PatchPair, s1: bool) -> (PathBuf, &'p str) {
        if s1 {
            (self.root.join(S1_DIR).join(&pair.s1), &pair.s1)
        } else {
            (self.root.join(S2_DIR).join(&pair.s2), &pair.s2)
        }
    }

    fn load_image(&self, pair: &PatchPair) -> Result<Array3<f32>, DatasetError> {
        let planes = self
            .options
            .bands
            .names()
            .into_iter()
            .map(|band| {
                let (dir, name) = self.patch_dir(pair, is_s1_band(band));
                let path = dir.join(format!("{name}_{band}.tif"));
                let raster = RasterImage::open(&path).map_err(|source| DatasetError::Band {
                    patch: name.to_string(),
                    band,
                    source,
                })?;
                Ok(resample_bilinear(raster.band(0), PATCH_SIZE, PATCH_SIZE))
            })
            .collect::<Result<Vec<_>, DatasetError>>()?;

        let views: Vec<_> = planes.iter().map(|p| p.view()).collect();
        Ok(ndarray::stack(Axis(0), &views)?)
    }

    fn load_target(&self, pair: &PatchPair) -> Result<Array1<f32>, DatasetError> {
        let (dir, name) = self.patch_dir(pair, self.options.bands == Bands::S1);
        let path = dir.join(format!("{name}_labels_metadata.json"));
        let file = File::open(&path).map_err(|source| DatasetError::LabelsIo {
            path: path.clone(),
            source,
        })?;
        let metadata: LabelMetadata = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| DatasetError::LabelsJson { path, source })?;
        self.options.class_set.encode(&metadata.labels)
    }
}

impl Dataset for BigEarthNet {
    fn len(&self) -> usize {
        self.patches.len()
    }

    fn get(&self, index: usize) -> Result<Sample, DatasetError> {
        let pair = self
            .patches
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.patches.len(),
            })?;
        debug!("loading patch {index}: {}", pair.s2);

        let patch = if self.options.bands == Bands::S1 {
            pair.s1.clone()
        } else {
            pair.s2.clone()
        };
        Ok(Sample {
            patch,
            bands: self.options.bands.names(),
            image: self.load_image(pair)?,
            label: self.load_target(pair)?,
        })
    }

    fn name(&self) -> &str {
        "BigEarthNet"
    }
}

fn read_split(path: &Path) -> Result<Vec<PatchPair>, DatasetError> {
    let split_err = |source| DatasetError::SplitFile {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(split_err)?;

    reader
        .records()
        .enumerate()
        .map(|(row, record)| {
            let record = record.map_err(split_err)?;
            match (record.get(0).map(str::trim), record.get(1).map(str::trim)) {
                (Some(s2), Some(s1)) if !s2.is_empty() && !s1.is_empty() => Ok(PatchPair {
                    s2: s2.to_string(),
                    s1: s1.to_string(),
                }),
                _ => Err(DatasetError::SplitRow {
                    path: path.to_path_buf(),
                    row: row + 1,
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{self, PATCH_LABELS};
    use rstest::rstest;

    fn options(bands: Bands, class_set: ClassSet) -> DatasetOptions {
        DatasetOptions {
            bands,
            split: Split::Train,
            class_set,
        }
    }

    #[rstest]
    #[case(Bands::S2, 12)]
    #[case(Bands::S1, 2)]
    #[case(Bands::All, 14)]
    fn sample_shapes(#[case] bands: Bands, #[case] channels: usize) {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_tree(dir.path(), 3);

        let dataset = BigEarthNet::open(dir.path(), options(bands, ClassSet::Nineteen)).unwrap();
        assert_eq!(dataset.len(), 3);
        let sample = dataset.get(1).unwrap();
        assert_eq!(sample.image.dim(), (channels, 120, 120));
        assert_eq!(sample.label.dim(), 19);
        assert_eq!(sample.bands.len(), channels);
    }

    #[test]
    fn coarse_bands_are_upsampled() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_tree(dir.path(), 1);
        let dataset =
            BigEarthNet::open(dir.path(), options(Bands::S2, ClassSet::Nineteen)).unwrap();
        let sample = dataset.get(0).unwrap();
        // B01 is stored at 20x20 with a constant value per patch
        let b01 = sample.image.index_axis(Axis(0), 0);
        let expected = fixtures::band_value(0, "B01") as f32;
        assert!(b01.iter().all(|v| (v - expected).abs() < 1e-3));
    }

    #[test]
    fn labels_follow_class_set() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_tree(dir.path(), 2);

        let ds19 = BigEarthNet::open(dir.path(), options(Bands::S2, ClassSet::Nineteen)).unwrap();
        let ds43 =
            BigEarthNet::open(dir.path(), options(Bands::S2, ClassSet::FortyThree)).unwrap();

        let labels_43 = ClassSet::FortyThree.decode(&ds43.get(0).unwrap().label);
        let mut expected: Vec<&str> = PATCH_LABELS[0].to_vec();
        expected.sort_by_key(|l| crate::data::labels::CLASSES_43.iter().position(|c| c == l));
        assert_eq!(labels_43, expected);

        let label_19 = ds19.get(0).unwrap().label;
        assert_eq!(label_19.len(), 19);
        assert!(label_19.sum() >= 1.0);
    }

    #[test]
    fn s1_samples_are_named_after_s1_patch() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_tree(dir.path(), 1);
        let dataset =
            BigEarthNet::open(dir.path(), options(Bands::S1, ClassSet::Nineteen)).unwrap();
        assert!(dataset.get(0).unwrap().patch.starts_with("S1"));
    }

    #[test]
    fn out_of_range_index() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_tree(dir.path(), 2);
        let dataset = BigEarthNet::open(dir.path(), DatasetOptions::default()).unwrap();
        assert!(matches!(
            dataset.get(2).unwrap_err(),
            DatasetError::IndexOutOfRange { index: 2, len: 2 }
        ));
    }

    #[test]
    fn missing_root_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = BigEarthNet::open(dir.path(), DatasetOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingDirectory(p) if p.ends_with(S2_DIR)));
    }

    #[test]
    fn missing_split_file() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_tree(dir.path(), 1);
        std::fs::remove_file(dir.path().join("bigearthnet-test.csv")).unwrap();
        let opts = DatasetOptions {
            split: Split::Test,
            ..DatasetOptions::default()
        };
        assert!(matches!(
            BigEarthNet::open(dir.path(), opts).unwrap_err(),
            DatasetError::SplitFile { .. }
        ));
    }

    #[test]
    fn malformed_split_row() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_tree(dir.path(), 1);
        std::fs::write(dir.path().join("bigearthnet-val.csv"), "only_one_column\n").unwrap();
        let opts = DatasetOptions {
            split: Split::Val,
            ..DatasetOptions::default()
        };
        assert!(matches!(
            BigEarthNet::open(dir.path(), opts).unwrap_err(),
            DatasetError::SplitRow { row: 1, .. }
        ));
    }

    #[test]
    fn missing_band_names_patch_and_band() {
        let dir = tempfile::tempdir().unwrap();
        let names = fixtures::write_tree(dir.path(), 1);
        let s2 = &names[0].0;
        std::fs::remove_file(dir.path().join(S2_DIR).join(s2).join(format!("{s2}_B8A.tif")))
            .unwrap();
        let dataset = BigEarthNet::open(dir.path(), DatasetOptions::default()).unwrap();
        let err = dataset.get(0).unwrap_err();
        assert!(matches!(err, DatasetError::Band { band: "B8A", .. }));
    }
}
