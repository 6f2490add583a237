//! Placement of live grid windows.

use super::error::LiveError;
use super::window::GridWindow;
use crate::coord::{Coord, TileKey, GRID_PIXELS, MAX_ZOOM, MIN_ZOOM};
use crate::pyramid::{PyramidBuilder, PyramidConfig};
use crate::store::{
    bytes_to_mb, decode_png, map_directory, tile_path, tile_relative_path, write_tile_file,
    GridRecord, MapId, MapInfo, MapStore, OverlayRecord, PendingMarkers, QuotaTracker,
    TileRecord,
};
use chrono::{TimeDelta, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Priority of maps created from live windows; sorts below curated maps.
pub const LIVE_MAP_PRIORITY: i32 = -1;

/// Live reconciliation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveConfig {
    /// Create a map when no grid of a window is known
    pub allow_new_maps: bool,
    /// Delay before the client is asked for a fresh image of a grid
    pub reupload_after: TimeDelta,
    pub pyramid: PyramidConfig,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            allow_new_maps: true,
            reupload_after: TimeDelta::minutes(30),
            pyramid: PyramidConfig::default(),
        }
    }
}

/// Where a window landed and what changed to put it there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowPlacement {
    pub map: MapId,
    /// Map coordinate of window cell `(0, 0)`
    pub origin: Coord,
    pub created_map: bool,
    /// Maps folded into `map` and deleted
    pub merged_maps: Vec<MapId>,
    pub grids_moved: usize,
    /// Ids of grids inserted for unknown cells
    pub grids_inserted: Vec<String>,
    /// Grids dropped because their target coordinate was taken
    pub conflicts: usize,
    pub markers_released: usize,
    /// Tiles written at zoom 1-6 after a merge
    pub pyramid_tiles: usize,
}

impl WindowPlacement {
    /// Map coordinate of a window cell.
    pub fn coord_of(&self, cell: Coord) -> Coord {
        self.origin + cell
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Placed(WindowPlacement),
    /// No grid was known and new maps are disabled
    Rejected,
}

/// Result of storing a client-rendered grid image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridImageReport {
    pub tile: TileRecord,
    pub bytes_delta: i64,
    pub pyramid_tiles: usize,
}

/// Picks the map a window merges into.
///
/// The highest-priority map with a positive priority wins (lowest id on a
/// tie); without one the lowest id wins.
pub fn pick_target(maps: &[MapInfo]) -> Option<MapId> {
    let curated = maps
        .iter()
        .filter(|m| m.priority > 0)
        .max_by(|a, b| a.priority.cmp(&b.priority).then(b.id.cmp(&a.id)));
    match curated {
        Some(map) => Some(map.id),
        None => maps.iter().map(|m| m.id).min(),
    }
}

/// Map coordinate of window cell `(0, 0)` implied by the matches in `map`.
fn origin_in(found: &[(Coord, GridRecord)], map: MapId) -> Option<Coord> {
    found
        .iter()
        .find(|(_, record)| record.map == map)
        .map(|(cell, record)| record.coord - *cell)
}

enum TileCopy {
    Missing,
    Copied { replaced: Option<u64> },
}

fn copy_tile_file(src: &Path, dst: &Path) -> io::Result<TileCopy> {
    let bytes = match std::fs::read(src) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TileCopy::Missing),
        Err(e) => return Err(e),
    };
    let replaced = write_tile_file(dst, &bytes)?;
    Ok(TileCopy::Copied { replaced })
}

fn io_error(path: &Path, e: impl ToString) -> LiveError {
    LiveError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Places live grid windows and stores client-rendered grid images.
pub struct LiveReconciler<S, Q, P> {
    store: Arc<S>,
    quota: Arc<Q>,
    pending: Arc<P>,
    tile_root: PathBuf,
    config: LiveConfig,
    pyramid: PyramidBuilder<S, Q>,
}

impl<S, Q, P> LiveReconciler<S, Q, P>
where
    S: MapStore,
    Q: QuotaTracker,
    P: PendingMarkers,
{
    pub fn new(
        store: Arc<S>,
        quota: Arc<Q>,
        pending: Arc<P>,
        tile_root: impl Into<PathBuf>,
        config: LiveConfig,
    ) -> Self {
        let tile_root = tile_root.into();
        let pyramid = PyramidBuilder::new(
            Arc::clone(&store),
            Arc::clone(&quota),
            tile_root.clone(),
            config.pyramid,
        );
        Self {
            store,
            quota,
            pending,
            tile_root,
            config,
            pyramid,
        }
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Places a window of grid ids.
    ///
    /// Known grids decide the target map; other maps they belong to are
    /// merged into it. Unknown grids are inserted relative to the known
    /// ones and flagged for an immediate image upload.
    #[instrument(skip(self, window), fields(size = window.size()))]
    pub async fn reconcile(
        &self,
        tenant: &str,
        window: &GridWindow,
    ) -> Result<ReconcileOutcome, LiveError> {
        let mut found = Vec::new();
        let mut unknown = Vec::new();
        for (cell, id) in window.cells() {
            match self.store.find_grid(tenant, id).await? {
                Some(record) => found.push((cell, record)),
                None => unknown.push((cell, id.to_string())),
            }
        }

        let mut placement = if found.is_empty() {
            if !self.config.allow_new_maps {
                info!(tenant, "No known grids in window and new maps are disabled");
                return Ok(ReconcileOutcome::Rejected);
            }
            let info = self
                .store
                .create_map(tenant, "Live map", LIVE_MAP_PRIORITY)
                .await?;
            info!(tenant, map = info.id, "Created map for live window");
            WindowPlacement {
                map: info.id,
                origin: window.centered_origin(),
                created_map: true,
                ..WindowPlacement::default()
            }
        } else {
            self.merge_matches(tenant, &found).await?
        };

        self.insert_unknown(tenant, unknown, &mut placement).await?;
        debug!(
            tenant,
            map = placement.map,
            inserted = placement.grids_inserted.len(),
            merged = placement.merged_maps.len(),
            "Window reconciled"
        );
        Ok(ReconcileOutcome::Placed(placement))
    }

    async fn merge_matches(
        &self,
        tenant: &str,
        found: &[(Coord, GridRecord)],
    ) -> Result<WindowPlacement, LiveError> {
        let map_ids: BTreeSet<MapId> = found.iter().map(|(_, r)| r.map).collect();
        let mut maps = Vec::with_capacity(map_ids.len());
        for &id in &map_ids {
            let info = self.store.get_map(tenant, id).await?;
            maps.push(info.unwrap_or(MapInfo {
                id,
                name: String::new(),
                priority: 0,
                hidden: false,
                tenant: tenant.to_string(),
            }));
        }
        let target = pick_target(&maps).ok_or_else(|| {
            LiveError::MalformedWindow("matched grids reference no map".into())
        })?;
        let origin = origin_in(found, target).unwrap_or_default();

        let mut placement = WindowPlacement {
            map: target,
            origin,
            ..WindowPlacement::default()
        };
        let mut moved = Vec::new();
        for &source in map_ids.iter().filter(|&&m| m != target) {
            let Some(source_origin) = origin_in(found, source) else {
                continue;
            };
            let delta = origin - source_origin;
            let coords = self
                .merge_map(tenant, source, target, delta, &mut placement)
                .await?;
            moved.extend(coords);
            placement.merged_maps.push(source);
        }

        if !moved.is_empty() {
            let report = self
                .pyramid
                .rebuild(tenant, target, &moved, &CancellationToken::new())
                .await?;
            placement.pyramid_tiles = report.tiles_written;
        }
        Ok(placement)
    }

    /// Moves every grid of `source` into `target`, shifted by `delta`.
    ///
    /// Coordinates already used in `target` keep their grid. Returns the
    /// target coordinates that received a grid.
    #[instrument(skip(self, placement))]
    async fn merge_map(
        &self,
        tenant: &str,
        source: MapId,
        target: MapId,
        delta: Coord,
        placement: &mut WindowPlacement,
    ) -> Result<Vec<Coord>, LiveError> {
        let grids = self.store.grids_in_map(tenant, source).await?;
        let overlays = self.store.overlays_in_map(tenant, source).await?;
        let mut occupied: HashSet<Coord> = self
            .store
            .grids_in_map(tenant, target)
            .await?
            .into_iter()
            .map(|g| g.coord)
            .collect();

        let mut released: i64 = 0;
        let mut base_tiles: HashMap<Coord, TileRecord> = HashMap::new();
        for zoom in MIN_ZOOM..=MAX_ZOOM {
            for tile in self.store.tiles_in_map(tenant, source, zoom).await? {
                released += tile.size_bytes as i64;
                if zoom == 0 {
                    base_tiles.insert(tile.coord, tile);
                }
            }
        }
        let mut overlays_at: HashMap<Coord, Vec<OverlayRecord>> = HashMap::new();
        for overlay in overlays {
            overlays_at.entry(overlay.coord).or_default().push(overlay);
        }

        let mut grid_rows = Vec::new();
        let mut tile_rows = Vec::new();
        let mut overlay_rows = Vec::new();
        let mut moved = Vec::new();
        for grid in grids {
            let dest = grid.coord + delta;
            if !occupied.insert(dest) {
                placement.conflicts += 1;
                continue;
            }

            if let Some(tile) = base_tiles.get(&grid.coord) {
                let key = TileKey::new(0, dest);
                let src = tile_path(&self.tile_root, tenant, source, &tile.key());
                let dst = tile_path(&self.tile_root, tenant, target, &key);
                let dst_display = dst.clone();
                let copied = tokio::task::spawn_blocking(move || copy_tile_file(&src, &dst))
                    .await
                    .map_err(|e| io_error(&dst_display, e))?
                    .map_err(|e| io_error(&dst_display, e))?;
                if let TileCopy::Copied { replaced } = copied {
                    released -= tile.size_bytes as i64;
                    released += replaced.unwrap_or(0) as i64;
                    tile_rows.push(TileRecord {
                        map: target,
                        coord: dest,
                        file_path: tile_relative_path(tenant, target, &key),
                        cache_timestamp: Utc::now().timestamp_millis(),
                        ..tile.clone()
                    });
                }
            }
            for overlay in overlays_at.remove(&grid.coord).unwrap_or_default() {
                overlay_rows.push(OverlayRecord {
                    map: target,
                    coord: dest,
                    ..overlay
                });
            }
            grid_rows.push(GridRecord {
                map: target,
                coord: dest,
                ..grid
            });
            moved.push(dest);
        }
        placement.grids_moved += moved.len();

        if !grid_rows.is_empty() {
            self.store.save_grids_batch(grid_rows, false).await?;
        }
        if !tile_rows.is_empty() {
            self.store.save_tiles_batch(tile_rows, false).await?;
        }
        if !overlay_rows.is_empty() {
            self.store.upsert_overlays_batch(overlay_rows).await?;
        }

        self.store.delete_tiles_by_map(tenant, source).await?;
        self.store.delete_overlays_by_map(tenant, source).await?;
        self.store.delete_grids_by_map(tenant, source).await?;
        self.store.delete_map(tenant, source).await?;
        let dir = map_directory(&self.tile_root, tenant, source);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %dir.display(), error = %e, "Failed to remove merged map files"),
        }

        if released != 0 {
            self.quota
                .increment_storage_usage(tenant, -bytes_to_mb(released))
                .await?;
        }
        info!(
            tenant,
            source,
            target,
            moved = moved.len(),
            conflicts = placement.conflicts,
            "Merged map into target"
        );
        Ok(moved)
    }

    async fn insert_unknown(
        &self,
        tenant: &str,
        unknown: Vec<(Coord, String)>,
        placement: &mut WindowPlacement,
    ) -> Result<(), LiveError> {
        let due = Utc::now() - TimeDelta::seconds(60);
        let mut rows = Vec::with_capacity(unknown.len());
        for (cell, id) in unknown {
            let coord = placement.coord_of(cell);
            if self.store.get_grid(tenant, placement.map, coord).await?.is_some() {
                debug!(grid = %id, %coord, "Window cell lands on an occupied coordinate");
                placement.conflicts += 1;
                continue;
            }
            rows.push(GridRecord {
                id,
                map: placement.map,
                coord,
                tenant: tenant.to_string(),
                next_update: Some(due),
            });
        }
        if rows.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        self.store.save_grids_batch(rows, false).await?;
        for id in ids {
            placement.markers_released += self.pending.release_for_grid(tenant, &id);
            placement.grids_inserted.push(id);
        }
        Ok(())
    }

    /// Stores the client-rendered zoom-0 image of a known grid and
    /// rebuilds the zoom levels above it.
    #[instrument(skip(self, png), fields(bytes = png.len()))]
    pub async fn accept_grid_image(
        &self,
        tenant: &str,
        grid_id: &str,
        png: Vec<u8>,
    ) -> Result<GridImageReport, LiveError> {
        let mut grid = self
            .store
            .find_grid(tenant, grid_id)
            .await?
            .ok_or_else(|| LiveError::UnknownGrid(grid_id.to_string()))?;

        let checked = tokio::task::spawn_blocking(move || match decode_png(&png) {
            Ok(img) if img.width() == GRID_PIXELS && img.height() == GRID_PIXELS => Ok(png),
            Ok(img) => Err(format!("expected 100x100, got {}x{}", img.width(), img.height())),
            Err(e) => Err(e.to_string()),
        })
        .await
        .map_err(|e| LiveError::InvalidImage {
            grid_id: grid_id.to_string(),
            message: e.to_string(),
        })?;
        let png = checked.map_err(|message| LiveError::InvalidImage {
            grid_id: grid_id.to_string(),
            message,
        })?;

        let key = TileKey::new(0, grid.coord);
        let path = tile_path(&self.tile_root, tenant, grid.map, &key);
        let size = png.len() as u64;
        let write_path = path.clone();
        let previous = tokio::task::spawn_blocking(move || write_tile_file(&write_path, &png))
            .await
            .map_err(|e| io_error(&path, e))?
            .map_err(|e| io_error(&path, e))?;
        let bytes_delta = size as i64 - previous.unwrap_or(0) as i64;

        let tile = TileRecord {
            map: grid.map,
            coord: grid.coord,
            zoom: 0,
            file_path: tile_relative_path(tenant, grid.map, &key),
            cache_timestamp: Utc::now().timestamp_millis(),
            size_bytes: size,
            tenant: tenant.to_string(),
        };
        self.store.save_tiles_batch(vec![tile.clone()], false).await?;
        if bytes_delta != 0 {
            self.quota
                .increment_storage_usage(tenant, bytes_to_mb(bytes_delta))
                .await?;
        }

        grid.next_update = Some(Utc::now() + self.config.reupload_after);
        let (map, coord) = (grid.map, grid.coord);
        self.store.save_grids_batch(vec![grid], false).await?;

        let report = self
            .pyramid
            .rebuild(tenant, map, &[coord], &CancellationToken::new())
            .await?;
        debug!(
            tenant,
            grid = grid_id,
            map,
            bytes_delta,
            pyramid_tiles = report.tiles_written,
            "Stored grid image"
        );
        Ok(GridImageReport {
            tile,
            bytes_delta,
            pyramid_tiles: report.tiles_written,
        })
    }
}
