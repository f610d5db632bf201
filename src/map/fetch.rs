use std::num::NonZeroUsize;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::RgbaImage;
use log::{debug, warn};
use lru::LruCache;

use super::tiles::{Basemap, TileCoord};

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("building HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("requesting tile {coord}")]
    Request {
        coord: TileCoord,
        #[source]
        source: reqwest::Error,
    },
    #[error("tile {coord} returned HTTP {status}")]
    Status {
        coord: TileCoord,
        status: reqwest::StatusCode,
    },
    #[error("decoding tile {coord}")]
    Decode {
        coord: TileCoord,
        #[source]
        source: image::ImageError,
    },
}

// ---------------------------------------------------------------------------
// Fetch configuration
// ---------------------------------------------------------------------------

/// HTTP settings for tile requests.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Accept any TLS certificate.
    pub insecure: bool,
    /// Decoded tiles (and window textures) kept before the least recently used is dropped.
    pub cache_tiles: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("rusty-earth/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(20),
            insecure: false,
            cache_tiles: 256,
        }
    }
}

/// Anything that can hand out decoded tiles.
pub trait TileSource {
    fn tile(&mut self, coord: TileCoord) -> Result<Arc<RgbaImage>, TileError>;
}

// ---------------------------------------------------------------------------
// Blocking HTTP fetcher with an in-memory cache
// ---------------------------------------------------------------------------

pub struct TileFetcher {
    client: reqwest::blocking::Client,
    basemap: Basemap,
    cache: LruCache<TileCoord, Arc<RgbaImage>>,
}

impl TileFetcher {
    pub fn new(basemap: Basemap, config: &FetchConfig) -> Result<Self, TileError> {
        if config.insecure {
            warn!("TLS certificate verification is disabled for tile requests");
        }
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(TileError::Client)?;
        Ok(Self {
            client,
            basemap,
            cache: LruCache::new(cache_capacity(config.cache_tiles)),
        })
    }

    fn download(&self, coord: TileCoord) -> Result<RgbaImage, TileError> {
        let url = self.basemap.tile_url(coord);
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|source| TileError::Request { coord, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(TileError::Status { coord, status });
        }
        let bytes = response
            .bytes()
            .map_err(|source| TileError::Request { coord, source })?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|source| TileError::Decode { coord, source })?;
        Ok(decoded.to_rgba8())
    }
}

impl TileSource for TileFetcher {
    fn tile(&mut self, coord: TileCoord) -> Result<Arc<RgbaImage>, TileError> {
        if let Some(hit) = self.cache.get(&coord) {
            return Ok(Arc::clone(hit));
        }
        let tile = Arc::new(self.download(coord)?);
        if let Some((evicted, _)) = self.cache.push(coord, Arc::clone(&tile)) {
            debug!("evicted tile {evicted}");
        }
        Ok(tile)
    }
}

/// LRU capacity for `tiles` entries; zero still keeps one tile.
pub fn cache_capacity(tiles: usize) -> NonZeroUsize {
    NonZeroUsize::new(tiles).unwrap_or(NonZeroUsize::MIN)
}

// ---------------------------------------------------------------------------
// Background worker used by the window
// ---------------------------------------------------------------------------

pub type TileResult = (TileCoord, Result<Arc<RgbaImage>, TileError>);

/// Runs a [`TileSource`] on its own thread so the UI never blocks on the network.
pub struct TileWorker {
    requests: Sender<TileCoord>,
    results: Receiver<TileResult>,
}

impl TileWorker {
    /// `notify` runs after every finished tile (the window passes a repaint request).
    pub fn spawn<S, F>(mut source: S, notify: F) -> Self
    where
        S: TileSource + Send + 'static,
        F: Fn() + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<TileCoord>();
        let (result_tx, result_rx) = mpsc::channel::<TileResult>();

        thread::spawn(move || {
            for coord in request_rx {
                let result = source.tile(coord);
                if result_tx.send((coord, result)).is_err() {
                    break;
                }
                notify();
            }
            debug!("tile worker stopped");
        });

        Self {
            requests: request_tx,
            results: result_rx,
        }
    }

    pub fn request(&self, coord: TileCoord) {
        if self.requests.send(coord).is_err() {
            warn!("tile worker is gone, dropping request for {coord}");
        }
    }

    /// Next finished tile, if any.
    pub fn try_recv(&self) -> Option<TileResult> {
        match self.results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
