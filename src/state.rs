use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui::{self, TextureHandle, TextureId, TextureOptions};
use log::{debug, info, warn};
use lru::LruCache;

use crate::color::ClassColors;
use crate::data::{BigEarthNet, DataLoaderConfig, DatasetOptions};
use crate::inspect::{self, DatasetInspection, ImageInspection};
use crate::map::fetch::{cache_capacity, TileError, TileSource};
use crate::map::{Basemap, FetchConfig, MapView, TileCoord, TileFetcher, TileWorker};
use crate::raster;
use crate::ui;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// What the central panel shows (None until something is opened).
    pub view: Option<ActiveView>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// HTTP settings used whenever a map is (re)created.
    pub fetch: FetchConfig,
}

/// Exactly one inspector is active at a time.
pub enum ActiveView {
    Map(MapState),
    Image(ImageState),
    Dataset(DatasetState),
}

impl AppState {
    pub fn new(view: Option<ActiveView>, fetch: FetchConfig) -> Self {
        Self {
            view,
            status_message: None,
            fetch,
        }
    }

    /// Show `result` on success, or keep the current view and report the error.
    pub fn replace_view(&mut self, result: Result<ActiveView>) {
        match result {
            Ok(view) => {
                self.view = Some(view);
                self.status_message = None;
            }
            Err(e) => self.report(e),
        }
    }

    pub fn report(&mut self, e: anyhow::Error) {
        log::error!("{e:#}");
        self.status_message = Some(format!("Error: {e:#}"));
    }

    pub fn open_image(&mut self, path: &Path) {
        let result = ImageInspection::open(path).map(|i| ActiveView::Image(ImageState::new(i)));
        self.replace_view(result);
    }

    /// Open a dataset root, keeping the band/split/class choices of the current one.
    pub fn open_dataset(&mut self, root: &Path) {
        let (options, config) = match &self.view {
            Some(ActiveView::Dataset(ds)) => (ds.dataset.options(), ds.config.clone()),
            _ => (DatasetOptions::default(), DataLoaderConfig::default()),
        };
        let result = DatasetState::open(root, options, config, 0).map(ActiveView::Dataset);
        self.replace_view(result);
    }

    pub fn open_map(&mut self, ctx: &egui::Context, view: MapView) {
        let result = MapState::new(ctx, view, self.fetch.clone())
            .map(ActiveView::Map)
            .context("starting tile fetcher");
        self.replace_view(result);
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

pub struct MapState {
    pub view: MapView,
    pub failed: usize,
    textures: LruCache<TileCoord, TextureHandle>,
    requested: HashSet<TileCoord>,
    worker: TileWorker,
    fetch: FetchConfig,
    ctx: egui::Context,
}

impl MapState {
    pub fn new(
        ctx: &egui::Context,
        view: MapView,
        fetch: FetchConfig,
    ) -> Result<Self, TileError> {
        let fetcher = TileFetcher::new(view.basemap.clone(), &fetch)?;
        Ok(Self::with_source(ctx, view, fetch, fetcher))
    }

    /// Draw tiles from `source` instead of the view's basemap server.
    pub fn with_source<S>(
        ctx: &egui::Context,
        view: MapView,
        fetch: FetchConfig,
        source: S,
    ) -> Self
    where
        S: TileSource + Send + 'static,
    {
        info!("map at {} zoom {} ({})", view.center, view.zoom, view.basemap);
        Self {
            view,
            failed: 0,
            textures: LruCache::new(cache_capacity(fetch.cache_tiles)),
            requested: HashSet::new(),
            worker: spawn_worker(ctx, source),
            fetch,
            ctx: ctx.clone(),
        }
    }

    /// Queue a tile unless it was already asked for.
    pub fn request(&mut self, coord: TileCoord) {
        if self.requested.insert(coord) {
            self.worker.request(coord);
        }
    }

    /// Texture of a loaded tile, marking it as recently used.
    pub fn texture(&mut self, coord: TileCoord) -> Option<TextureId> {
        self.textures.get(&coord).map(TextureHandle::id)
    }

    pub fn loaded(&self) -> usize {
        self.textures.len()
    }

    /// Upload every tile the worker finished since the last frame.
    pub fn poll_tiles(&mut self) {
        while let Some((coord, result)) = self.worker.try_recv() {
            if coord.z != self.view.zoom {
                debug!("dropping tile {coord} from another zoom");
                continue;
            }
            match result {
                Ok(tile) => {
                    let image = egui::ColorImage::from_rgba_unmultiplied(
                        [tile.width() as usize, tile.height() as usize],
                        tile.as_raw(),
                    );
                    let texture = self.ctx.load_texture(
                        format!("tile {coord}"),
                        image,
                        TextureOptions::LINEAR,
                    );
                    // An evicted tile has to be requested again once it scrolls back in.
                    match self.textures.push(coord, texture) {
                        Some((evicted, _)) if evicted != coord => {
                            self.requested.remove(&evicted);
                        }
                        _ => {}
                    }
                }
                Err(e) => {
                    warn!("{:#}", anyhow::Error::from(e));
                    self.failed += 1;
                }
            }
        }
    }

    pub fn zoom_in(&mut self) {
        self.view.zoom_in();
        self.drop_other_zooms();
    }

    pub fn zoom_out(&mut self) {
        self.view.zoom_out();
        self.drop_other_zooms();
    }

    /// Swap the tile source; cached textures belong to the old one.
    pub fn set_basemap(&mut self, basemap: Basemap) -> Result<(), TileError> {
        if basemap == self.view.basemap {
            return Ok(());
        }
        let fetcher = TileFetcher::new(basemap.clone(), &self.fetch)?;
        self.worker = spawn_worker(&self.ctx, fetcher);
        info!("basemap {} -> {basemap}", self.view.basemap);
        self.view.basemap = basemap;
        self.textures.clear();
        self.requested.clear();
        self.failed = 0;
        Ok(())
    }

    fn drop_other_zooms(&mut self) {
        let zoom = self.view.zoom;
        let stale: Vec<TileCoord> = self
            .textures
            .iter()
            .map(|(coord, _)| *coord)
            .filter(|coord| coord.z != zoom)
            .collect();
        for coord in stale {
            self.textures.pop(&coord);
        }
        self.requested.retain(|coord| coord.z == zoom);
    }
}

fn spawn_worker<S>(ctx: &egui::Context, source: S) -> TileWorker
where
    S: TileSource + Send + 'static,
{
    let ctx = ctx.clone();
    TileWorker::spawn(source, move || ctx.request_repaint())
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

pub struct ImageState {
    pub inspection: ImageInspection,
    /// Uploaded lazily on the first frame.
    pub texture: Option<TextureHandle>,
    pub jpeg_quality: u8,
}

impl ImageState {
    pub fn new(inspection: ImageInspection) -> Self {
        Self {
            inspection,
            texture: None,
            jpeg_quality: 90,
        }
    }

    pub fn texture(&mut self, ctx: &egui::Context) -> &TextureHandle {
        let name = self.inspection.raster.path.display().to_string();
        let rgb = &self.inspection.rgb;
        self.texture.get_or_insert_with(|| {
            ctx.load_texture(name, ui::rgb_to_color_image(rgb), TextureOptions::NEAREST)
        })
    }

    pub fn save_jpeg(&self, path: &Path) -> Result<()> {
        raster::save_jpeg(&self.inspection.rgb, path, self.jpeg_quality)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

pub struct DatasetState {
    pub dataset: BigEarthNet,
    pub config: DataLoaderConfig,
    pub inspection: DatasetInspection,
    pub colors: ClassColors,
    pub texture: Option<TextureHandle>,
}

impl DatasetState {
    pub fn open(
        root: &Path,
        options: DatasetOptions,
        config: DataLoaderConfig,
        index: usize,
    ) -> Result<Self> {
        let dataset = inspect::open_dataset(root, options)?;
        Self::from_dataset(dataset, config, index)
    }

    pub fn from_dataset(
        dataset: BigEarthNet,
        config: DataLoaderConfig,
        index: usize,
    ) -> Result<Self> {
        let inspection = DatasetInspection::at(&dataset, config.clone(), index)?;
        Ok(Self {
            colors: ClassColors::new(dataset.options().class_set),
            dataset,
            config,
            inspection,
            texture: None,
        })
    }

    /// Move to another sample; out-of-range indices leave the state untouched.
    pub fn go_to(&mut self, index: usize) -> Result<()> {
        self.inspection = DatasetInspection::at(&self.dataset, self.config.clone(), index)?;
        self.texture = None;
        Ok(())
    }

    pub fn texture(&mut self, ctx: &egui::Context) -> &TextureHandle {
        let name = format!("sample {}", self.inspection.sample.patch);
        let rgb = &self.inspection.preview;
        self.texture.get_or_insert_with(|| {
            ctx.load_texture(name, ui::rgb_to_color_image(rgb), TextureOptions::NEAREST)
        })
    }
}
