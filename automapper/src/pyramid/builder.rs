//! Zoom level 1-6 construction.

use super::cache::TileCache;
use super::compose::compose_quadrants;
use super::error::PyramidError;
use crate::coord::{Coord, TileKey, MAX_ZOOM};
use crate::pipeline::{PoolConfig, WorkerPool};
use crate::store::{
    bytes_to_mb, encode_png, read_tile_image, tile_path, tile_relative_path, write_tile_file,
    MapId, MapStore, QuotaTracker, TileRecord,
};
use chrono::Utc;
use image::RgbaImage;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Default number of base coordinates composed together.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default number of tile rows per store flush.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Pyramid builder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidConfig {
    /// Base coordinates per independently built chunk
    pub chunk_size: usize,
    /// Tile rows per flush
    pub batch_size: usize,
    pub pool: PoolConfig,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            pool: PoolConfig::default(),
        }
    }
}

/// Result of one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PyramidReport {
    /// Tiles written at zoom 1-6
    pub tiles_written: usize,
    /// Tiles written where no file existed before
    pub tiles_created: usize,
    /// Net change of bytes on disk
    pub bytes_delta: i64,
    /// Keys of the tiles in `tiles_created`
    pub created: Vec<TileKey>,
    /// Per-tile bytes charged to the quota by flushes that succeeded
    pub charged: Vec<(TileKey, i64)>,
    /// Parents skipped because none of their children exist
    pub tiles_skipped: usize,
    /// Most composed tiles held in memory at once
    pub cache_peak: usize,
    pub chunks: usize,
    /// Stopped early by cancellation
    pub cancelled: bool,
}

enum Child {
    Cached(Arc<RgbaImage>),
    Disk(PathBuf),
}

struct ComposeJob {
    key: TileKey,
    children: [Child; 4],
}

struct ComposedTile {
    key: TileKey,
    image: RgbaImage,
    png: Vec<u8>,
}

/// Composes one parent; `None` when it has no children left.
fn compose(job: ComposeJob) -> Result<Option<ComposedTile>, PyramidError> {
    let loaded: Vec<Option<Arc<RgbaImage>>> = job
        .children
        .into_iter()
        .map(|child| match child {
            Child::Cached(img) => Some(img),
            Child::Disk(path) => read_tile_image(&path).map(Arc::new),
        })
        .collect();
    if loaded.iter().all(Option::is_none) {
        return Ok(None);
    }
    let image = compose_quadrants([
        loaded[0].as_deref(),
        loaded[1].as_deref(),
        loaded[2].as_deref(),
        loaded[3].as_deref(),
    ]);
    let png = encode_png(&image).map_err(|e| PyramidError::Encode {
        key: job.key.to_string(),
        message: e.to_string(),
    })?;
    Ok(Some(ComposedTile {
        key: job.key,
        image,
        png,
    }))
}

/// Tile rows waiting for a flush, with their quota contribution.
#[derive(Default)]
struct TileBatch {
    rows: Vec<TileRecord>,
    bytes_delta: i64,
    charges: Vec<(TileKey, i64)>,
}

/// Builds zoom levels 1-6 of a map from its zoom-0 tiles.
pub struct PyramidBuilder<S, Q> {
    store: Arc<S>,
    quota: Arc<Q>,
    tile_root: PathBuf,
    pool: WorkerPool,
    config: PyramidConfig,
}

impl<S: MapStore, Q: QuotaTracker> PyramidBuilder<S, Q> {
    pub fn new(
        store: Arc<S>,
        quota: Arc<Q>,
        tile_root: impl Into<PathBuf>,
        config: PyramidConfig,
    ) -> Self {
        Self {
            store,
            quota,
            tile_root: tile_root.into(),
            pool: WorkerPool::new(config.pool, "compose"),
            config,
        }
    }

    pub fn tile_root(&self) -> &Path {
        &self.tile_root
    }

    /// Rebuilds every ancestor tile of `base` in `map`.
    ///
    /// Base coordinates are sorted and split into chunks; each chunk is
    /// composed bottom-up on its own. Children outside the current chunk
    /// are read from disk. Rows are flushed every `batch_size` tiles with
    /// one quota call per flush.
    pub async fn rebuild(
        &self,
        tenant: &str,
        map: MapId,
        base: &[Coord],
        cancel: &CancellationToken,
    ) -> Result<PyramidReport, PyramidError> {
        let mut report = PyramidReport::default();
        self.rebuild_into(tenant, map, base, cancel, &mut report).await?;
        Ok(report)
    }

    /// Like [`rebuild`](Self::rebuild), accumulating into `report` so the
    /// caller still sees the work done before an error.
    #[instrument(skip(self, base, cancel, report), fields(base = base.len()))]
    pub async fn rebuild_into(
        &self,
        tenant: &str,
        map: MapId,
        base: &[Coord],
        cancel: &CancellationToken,
        report: &mut PyramidReport,
    ) -> Result<(), PyramidError> {
        let started = Instant::now();
        let coords: Vec<Coord> = base
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut batch = TileBatch::default();

        for chunk in coords.chunks(self.config.chunk_size.max(1)) {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            report.chunks += 1;
            let finished = self
                .build_chunk(tenant, map, chunk, cancel, &mut batch, report)
                .await;
            if let Err(e) = finished {
                // rows for files already on disk are kept
                self.flush(tenant, &mut batch, report).await?;
                return Err(e);
            }
            if report.cancelled {
                break;
            }
        }

        self.flush(tenant, &mut batch, report).await?;
        info!(
            tenant,
            map,
            tiles = report.tiles_written,
            created = report.tiles_created,
            bytes_delta = report.bytes_delta,
            cache_peak = report.cache_peak,
            cancelled = report.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pyramid rebuilt"
        );
        Ok(())
    }

    async fn build_chunk(
        &self,
        tenant: &str,
        map: MapId,
        chunk: &[Coord],
        cancel: &CancellationToken,
        batch: &mut TileBatch,
        report: &mut PyramidReport,
    ) -> Result<(), PyramidError> {
        let mut cache = TileCache::new();
        let mut level: BTreeSet<Coord> = chunk.iter().copied().collect();

        for zoom in 1..=MAX_ZOOM {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let parents: BTreeSet<Coord> = level.iter().map(Coord::parent).collect();
            let jobs: Vec<ComposeJob> = parents
                .iter()
                .map(|&parent| {
                    let children = parent.children().map(|c| {
                        let key = TileKey::new(zoom - 1, c);
                        match cache.consume(&key) {
                            Some(img) => Child::Cached(img),
                            None => Child::Disk(tile_path(&self.tile_root, tenant, map, &key)),
                        }
                    });
                    ComposeJob {
                        key: TileKey::new(zoom, parent),
                        children,
                    }
                })
                .collect();
            debug!(zoom, tiles = jobs.len(), "Composing zoom level");

            let mut stream = self.pool.spawn(jobs, cancel.clone(), compose);
            let mut failure = None;
            while let Some(result) = stream.next().await {
                let tile = match result {
                    Ok(Some(tile)) => tile,
                    Ok(None) => {
                        report.tiles_skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                };
                if let Err(e) = self.store_tile(tenant, map, tile, &mut cache, batch, report).await {
                    failure = Some(e);
                    break;
                }
                if batch.rows.len() >= self.config.batch_size {
                    if let Err(e) = self.flush(tenant, batch, report).await {
                        failure = Some(e);
                        break;
                    }
                }
            }
            stream.finish().await?;
            if let Some(e) = failure {
                return Err(e);
            }
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            level = parents;
        }

        report.cache_peak = report.cache_peak.max(cache.peak());
        cache.clear();
        Ok(())
    }

    async fn store_tile(
        &self,
        tenant: &str,
        map: MapId,
        tile: ComposedTile,
        cache: &mut TileCache,
        batch: &mut TileBatch,
        report: &mut PyramidReport,
    ) -> Result<(), PyramidError> {
        let path = tile_path(&self.tile_root, tenant, map, &tile.key);
        let size = tile.png.len() as u64;
        let write_path = path.clone();
        let png = tile.png;
        let previous = tokio::task::spawn_blocking(move || write_tile_file(&write_path, &png))
            .await
            .map_err(|e| PyramidError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
            .map_err(|e| PyramidError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let delta = size as i64 - previous.unwrap_or(0) as i64;
        batch.bytes_delta += delta;
        batch.charges.push((tile.key, delta));
        report.bytes_delta += delta;
        report.tiles_written += 1;
        if previous.is_none() {
            report.tiles_created += 1;
            report.created.push(tile.key);
        }

        batch.rows.push(TileRecord {
            map,
            coord: tile.key.coord,
            zoom: tile.key.zoom,
            file_path: tile_relative_path(tenant, map, &tile.key),
            cache_timestamp: Utc::now().timestamp_millis(),
            size_bytes: size,
            tenant: tenant.to_string(),
        });

        if tile.key.zoom < MAX_ZOOM {
            cache.insert(tile.key, tile.image, 1);
        }
        Ok(())
    }

    async fn flush(
        &self,
        tenant: &str,
        batch: &mut TileBatch,
        report: &mut PyramidReport,
    ) -> Result<(), PyramidError> {
        if batch.rows.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut batch.rows);
        let delta = std::mem::take(&mut batch.bytes_delta);
        let charges = std::mem::take(&mut batch.charges);
        let count = rows.len();
        self.store.save_tiles_batch(rows, false).await?;
        if delta != 0 {
            self.quota
                .increment_storage_usage(tenant, bytes_to_mb(delta))
                .await?;
        }
        report.charged.extend(charges);
        debug!(tenant, rows = count, bytes_delta = delta, "Flushed pyramid tiles");
        Ok(())
    }
}
