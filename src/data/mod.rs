/// Data layer: BigEarthNet patches, labels and batching.
///
/// Architecture:
/// ```text
///  bigearthnet-<split>.csv + patch folders
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  index → band TIFFs (resampled to 120x120) + labels JSON
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Sample   │  image (C,120,120), multi-hot label (K)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  batch    │  DataLoader → Batch (N,C,120,120), (N,K)
///   └──────────┘
/// ```

pub mod batch;
pub mod labels;
pub mod loader;
pub mod model;

pub use batch::{DataLoader, DataLoaderConfig};
pub use labels::ClassSet;
pub use loader::{BigEarthNet, DatasetOptions};
pub use model::{Bands, Dataset, Sample, Split};

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use super::loader::{S1_DIR, S2_DIR};
    use super::model::{native_size, S1_BANDS, S2_BANDS};
    use crate::raster::reader::tests::{write_gray16, write_gray32f};

    /// Labels of patch `i` are `PATCH_LABELS[i % len]`.
    pub(crate) const PATCH_LABELS: [&[&str]; 3] = [
        &["Mixed forest", "Coniferous forest", "Bare rock"],
        &["Sea and ocean"],
        &["Pastures", "Non-irrigated arable land"],
    ];

    pub(crate) fn band_value(patch: usize, band: &str) -> u16 {
        let offset = S2_BANDS.iter().position(|b| *b == band).unwrap_or(0) as u16;
        1000 + 100 * offset + patch as u16
    }

    /// Write a small BigEarthNet v1 tree; every patch is listed in all splits.
    ///
    /// Returns the `(s2, s1)` patch names.
    pub(crate) fn write_tree(root: &Path, patches: usize) -> Vec<(String, String)> {
        let mut names = Vec::new();
        for i in 0..patches {
            let s2 = format!("S2A_MSIL2A_20170613T101031_{i}_45");
            let s1 = format!("S1A_IW_GRDH_1SDV_20170613T165043_33UUP_{i}_45");
            let labels = serde_json::json!({
                "labels": PATCH_LABELS[i % PATCH_LABELS.len()],
                "acquisition_date": "2017-06-13 10:10:31",
            });

            let s2_dir = root.join(S2_DIR).join(&s2);
            std::fs::create_dir_all(&s2_dir).unwrap();
            for band in S2_BANDS {
                let size = native_size(band);
                let data = vec![band_value(i, band); (size * size) as usize];
                write_gray16(&s2_dir.join(format!("{s2}_{band}.tif")), size, size, &data);
            }
            std::fs::write(
                s2_dir.join(format!("{s2}_labels_metadata.json")),
                labels.to_string(),
            )
            .unwrap();

            let s1_dir = root.join(S1_DIR).join(&s1);
            std::fs::create_dir_all(&s1_dir).unwrap();
            for (k, band) in S1_BANDS.iter().enumerate() {
                let data = vec![-10.0 - k as f32; 120 * 120];
                write_gray32f(&s1_dir.join(format!("{s1}_{band}.tif")), 120, 120, &data);
            }
            std::fs::write(
                s1_dir.join(format!("{s1}_labels_metadata.json")),
                labels.to_string(),
            )
            .unwrap();

            names.push((s2, s1));
        }

        let rows: String = names.iter().map(|(s2, s1)| format!("{s2},{s1}\n")).collect();
        for split in ["train", "val", "test"] {
            std::fs::write(root.join(format!("bigearthnet-{split}.csv")), &rows).unwrap();
        }
        names
    }
}
