//! Writes an offline sample: a tiny BigEarthNet v1 tree and an RGB GeoTIFF.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rusty_earth::data::loader::{S1_DIR, S2_DIR};
use rusty_earth::data::model::{native_size, PATCH_SIZE, S1_BANDS, S2_BANDS};
use rusty_earth::data::Split;
use rusty_earth::map::export::write_rgb_geotiff;
use rusty_earth::map::tiles::{lat_lon_to_meters, LatLon};
use tiff::encoder::{colortype, TiffEncoder};

/// Land covers the synthetic patches draw from, with a typical S2 reflectance.
const COVERS: [(&str, u16); 8] = [
    ("Mixed forest", 900),
    ("Coniferous forest", 700),
    ("Broad-leaved forest", 1100),
    ("Pastures", 1800),
    ("Non-irrigated arable land", 2200),
    ("Discontinuous urban fabric", 2600),
    ("Water bodies", 300),
    ("Sea and ocean", 200),
];

#[derive(Debug, Parser)]
#[command(about = "Write a synthetic BigEarthNet tree and satellite.tif")]
struct Args {
    /// Output directory; the dataset goes to `<out>/dataset`.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    #[arg(long, default_value_t = 10)]
    patches: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let root = args.out.join("dataset");
    let pairs = (0..args.patches)
        .map(|i| write_patch(&root, i, &mut rng))
        .collect::<Result<Vec<_>>>()?;
    write_splits(&root, &pairs)?;
    info!("wrote {} patches under {}", pairs.len(), root.display());

    let satellite = args.out.join("satellite.tif");
    write_satellite(&satellite, 512, 512, &mut rng)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// BigEarthNet patches
// ---------------------------------------------------------------------------

fn write_patch(root: &Path, index: usize, rng: &mut StdRng) -> Result<(String, String)> {
    let s2 = format!("S2A_MSIL2A_20170613T101031_{}_{}", 20 + index / 10, 40 + index % 10);
    let s1 = format!(
        "S1A_IW_GRDH_1SDV_20170613T165043_33UUP_{}_{}",
        20 + index / 10,
        40 + index % 10
    );

    let count = rng.gen_range(1..=3);
    let covers: Vec<(&str, u16)> = COVERS.choose_multiple(rng, count).copied().collect();
    let labels = serde_json::json!({
        "labels": covers.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
        "coordinates": {
            "ulx": 600_000 + index * 1200,
            "uly": 5_000_000,
            "lrx": 601_200 + index * 1200,
            "lry": 4_998_800,
        },
        "projection": "EPSG:32633",
        "tile_source": "S2A_MSIL1C_20170613T101031_N0205_R022_T33UUP_20170613T101608",
        "acquisition_date": "2017-06-13 10:10:31",
    });
    let base = covers.iter().map(|(_, v)| f64::from(*v)).sum::<f64>() / covers.len() as f64;

    let s2_dir = root.join(S2_DIR).join(&s2);
    fs::create_dir_all(&s2_dir).with_context(|| format!("creating {}", s2_dir.display()))?;
    for (b, band) in S2_BANDS.iter().enumerate() {
        let size = native_size(band);
        let level = base * (0.6 + 0.08 * b as f64);
        let data: Vec<u16> = (0..size * size)
            .map(|_| (level + rng.gen_range(-150.0..150.0)).clamp(0.0, 10000.0) as u16)
            .collect();
        let path = s2_dir.join(format!("{s2}_{band}.tif"));
        write_gray16(&path, size, &data)?;
    }
    fs::write(s2_dir.join(format!("{s2}_labels_metadata.json")), labels.to_string())
        .context("writing S2 labels")?;

    let s1_dir = root.join(S1_DIR).join(&s1);
    fs::create_dir_all(&s1_dir).with_context(|| format!("creating {}", s1_dir.display()))?;
    for (b, band) in S1_BANDS.iter().enumerate() {
        let level = -12.0 - 6.0 * b as f32;
        let data: Vec<f32> = (0..PATCH_SIZE * PATCH_SIZE)
            .map(|_| level + rng.gen_range(-3.0..3.0))
            .collect();
        let path = s1_dir.join(format!("{s1}_{band}.tif"));
        write_gray32f(&path, PATCH_SIZE as u32, &data)?;
    }
    fs::write(s1_dir.join(format!("{s1}_labels_metadata.json")), labels.to_string())
        .context("writing S1 labels")?;

    Ok((s2, s1))
}

/// 60/20/20 train/val/test, each split getting at least one patch when possible.
fn write_splits(root: &Path, pairs: &[(String, String)]) -> Result<()> {
    let n = pairs.len();
    let val = (n / 5).max(usize::from(n >= 3));
    let test = val;
    let train = n - val - test;
    let splits = [
        (Split::Train, &pairs[..train]),
        (Split::Val, &pairs[train..train + val]),
        (Split::Test, &pairs[train + val..]),
    ];

    for (split, rows) in splits {
        let path = root.join(split.filename());
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        for (s2, s1) in rows {
            writer.write_record([s2, s1])?;
        }
        writer.flush()?;
        info!("{split}: {} patches", rows.len());
    }
    Ok(())
}

fn write_gray16(path: &Path, size: u32, data: &[u16]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    encoder
        .write_image::<colortype::Gray16>(size, size, data)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn write_gray32f(path: &Path, size: u32, data: &[f32]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    encoder
        .write_image::<colortype::Gray32Float>(size, size, data)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// satellite.tif
// ---------------------------------------------------------------------------

/// Fields, a river and noise over Houston, georeferenced in EPSG:3857 at 0.3 m.
fn write_satellite(path: &Path, width: u32, height: u32, rng: &mut StdRng) -> Result<()> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let bank = (x as f64 / 40.0).sin() * 30.0 + height as f64 / 2.0;
            let river = (bank - y as f64).abs() < 12.0;
            let field = ((x / 64) + (y / 64)) % 2 == 0;
            let (r, g, b) = match (river, field) {
                (true, _) => (40, 70, 110),
                (false, true) => (95, 125, 60),
                (false, false) => (150, 135, 100),
            };
            let noise: i16 = rng.gen_range(-12..=12);
            rgb.extend([r, g, b].map(|c: i16| (c + noise).clamp(0, 255) as u8));
        }
    }

    let origin = lat_lon_to_meters(LatLon::new(29.676840, -95.369222));
    write_rgb_geotiff(path, width, height, &rgb, origin, 0.3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusty_earth::data::{Bands, BigEarthNet, Dataset, DatasetOptions};
    use rusty_earth::raster::RasterImage;

    #[test]
    fn generated_tree_loads_as_bigearthnet() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let pairs: Vec<_> = (0..5)
            .map(|i| write_patch(dir.path(), i, &mut rng).unwrap())
            .collect();
        write_splits(dir.path(), &pairs).unwrap();

        let options = DatasetOptions {
            bands: Bands::All,
            ..DatasetOptions::default()
        };
        let dataset = BigEarthNet::open(dir.path(), options).unwrap();
        assert_eq!(dataset.len(), 3);
        let sample = dataset.get(0).unwrap();
        assert_eq!(sample.image.shape(), &[14, PATCH_SIZE, PATCH_SIZE]);
        assert!(sample.label.sum() >= 1.0);
    }

    #[test]
    fn satellite_is_georeferenced_over_houston() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("satellite.tif");
        write_satellite(&path, 32, 16, &mut StdRng::seed_from_u64(1)).unwrap();

        let raster = RasterImage::open(&path).unwrap();
        assert_eq!((raster.width(), raster.height(), raster.bands()), (32, 16, 3));
        let geo = raster.geo.expect("georeference tags");
        let (x, y) = lat_lon_to_meters(LatLon::new(29.676840, -95.369222));
        assert!((geo.tiepoint[3] - x).abs() < 1e-6);
        assert!((geo.tiepoint[4] - y).abs() < 1e-6);
    }
}
