//! In-memory collaborator implementations.
//!
//! These back the CLI and the test suites. They hold everything in process
//! memory and are not a persistence layer.

use super::error::StoreError;
use super::traits::{MapStore, MarkerSink, PendingMarkers, QuotaTracker};
use super::types::{
    GridRecord, MapId, MapInfo, MarkerUpload, OverlayKind, OverlayRecord, TenantId, TileRecord,
};
use crate::coord::{Coord, TileKey};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
struct Tables {
    grids: HashMap<(TenantId, MapId, Coord), GridRecord>,
    tiles: HashMap<(TenantId, MapId, TileKey), TileRecord>,
    overlays: HashMap<(TenantId, MapId, Coord, OverlayKind), OverlayRecord>,
    maps: BTreeMap<(TenantId, MapId), MapInfo>,
    next_map_id: HashMap<TenantId, MapId>,
}

/// Record store kept in process memory.
///
/// Rows are always upserted; `skip_existence_check` has no effect.
#[derive(Debug, Default)]
pub struct MemoryMapStore {
    tables: Mutex<Tables>,
    /// Number of tile batches accepted before writes start failing
    fail_tile_batches_after: Mutex<Option<usize>>,
    tile_batches: Mutex<usize>,
}

impl MemoryMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every tile batch after the first `n` fail with
    /// [`StoreError::WriteFailed`].
    pub fn fail_tile_batches_after(&self, n: usize) {
        *self.fail_tile_batches_after.lock() = Some(n);
    }

    pub fn grid_count(&self) -> usize {
        self.tables.lock().grids.len()
    }

    pub fn tile_count(&self) -> usize {
        self.tables.lock().tiles.len()
    }

    pub fn overlay_count(&self) -> usize {
        self.tables.lock().overlays.len()
    }

    pub fn map_count(&self) -> usize {
        self.tables.lock().maps.len()
    }

    /// Returns every tile row of a tenant, at all zoom levels.
    pub fn all_tiles(&self, tenant: &str) -> Vec<TileRecord> {
        self.tables
            .lock()
            .tiles
            .values()
            .filter(|t| t.tenant == tenant)
            .cloned()
            .collect()
    }

    /// Inserts a map with an explicit id and priority.
    pub fn insert_map(&self, info: MapInfo) {
        let mut tables = self.tables.lock();
        let next = tables.next_map_id.entry(info.tenant.clone()).or_insert(1);
        *next = (*next).max(info.id + 1);
        tables.maps.insert((info.tenant.clone(), info.id), info);
    }
}

impl MapStore for MemoryMapStore {
    async fn grid_snapshot(&self, tenant: &str) -> Result<Vec<GridRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .grids
            .values()
            .filter(|g| g.tenant == tenant)
            .cloned()
            .collect())
    }

    async fn existing_grid_ids(
        &self,
        tenant: &str,
        ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let tables = self.tables.lock();
        Ok(tables
            .grids
            .values()
            .filter(|g| g.tenant == tenant && wanted.contains(g.id.as_str()))
            .map(|g| g.id.clone())
            .collect())
    }

    async fn get_grid(
        &self,
        tenant: &str,
        map: MapId,
        coord: Coord,
    ) -> Result<Option<GridRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.grids.get(&(tenant.to_string(), map, coord)).cloned())
    }

    async fn find_grid(
        &self,
        tenant: &str,
        grid_id: &str,
    ) -> Result<Option<GridRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .grids
            .values()
            .filter(|g| g.tenant == tenant && g.id == grid_id)
            .min_by_key(|g| g.map)
            .cloned())
    }

    async fn grids_in_map(&self, tenant: &str, map: MapId) -> Result<Vec<GridRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .grids
            .values()
            .filter(|g| g.tenant == tenant && g.map == map)
            .cloned()
            .collect())
    }

    async fn save_grids_batch(
        &self,
        rows: Vec<GridRecord>,
        _skip_existence_check: bool,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        for row in rows {
            tables
                .grids
                .insert((row.tenant.clone(), row.map, row.coord), row);
        }
        Ok(())
    }

    async fn save_tiles_batch(
        &self,
        rows: Vec<TileRecord>,
        _skip_existence_check: bool,
    ) -> Result<(), StoreError> {
        {
            let mut count = self.tile_batches.lock();
            *count += 1;
            if let Some(limit) = *self.fail_tile_batches_after.lock() {
                if *count > limit {
                    return Err(StoreError::WriteFailed(format!(
                        "tile batch {} rejected",
                        *count
                    )));
                }
            }
        }
        let mut tables = self.tables.lock();
        for row in rows {
            tables
                .tiles
                .insert((row.tenant.clone(), row.map, row.key()), row);
        }
        Ok(())
    }

    async fn upsert_overlays_batch(&self, rows: Vec<OverlayRecord>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        for row in rows {
            tables
                .overlays
                .insert((row.tenant.clone(), row.map, row.coord, row.kind), row);
        }
        Ok(())
    }

    async fn overlays_in_map(
        &self,
        tenant: &str,
        map: MapId,
    ) -> Result<Vec<OverlayRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .overlays
            .values()
            .filter(|o| o.tenant == tenant && o.map == map)
            .cloned()
            .collect())
    }

    async fn get_tile(
        &self,
        tenant: &str,
        map: MapId,
        coord: Coord,
        zoom: u8,
    ) -> Result<Option<TileRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .tiles
            .get(&(tenant.to_string(), map, TileKey::new(zoom, coord)))
            .cloned())
    }

    async fn tiles_in_map(
        &self,
        tenant: &str,
        map: MapId,
        zoom: u8,
    ) -> Result<Vec<TileRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .tiles
            .values()
            .filter(|t| t.tenant == tenant && t.map == map && t.zoom == zoom)
            .cloned()
            .collect())
    }

    async fn create_map(
        &self,
        tenant: &str,
        name: &str,
        priority: i32,
    ) -> Result<MapInfo, StoreError> {
        let mut tables = self.tables.lock();
        let next = tables.next_map_id.entry(tenant.to_string()).or_insert(1);
        let id = *next;
        *next += 1;
        let info = MapInfo {
            id,
            name: name.to_string(),
            priority,
            hidden: false,
            tenant: tenant.to_string(),
        };
        tables.maps.insert((tenant.to_string(), id), info.clone());
        Ok(info)
    }

    async fn get_map(&self, tenant: &str, map: MapId) -> Result<Option<MapInfo>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.maps.get(&(tenant.to_string(), map)).cloned())
    }

    async fn list_maps(&self, tenant: &str) -> Result<Vec<MapInfo>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .maps
            .values()
            .filter(|m| m.tenant == tenant)
            .cloned()
            .collect())
    }

    async fn delete_grid(&self, tenant: &str, map: MapId, coord: Coord) -> Result<(), StoreError> {
        self.tables
            .lock()
            .grids
            .remove(&(tenant.to_string(), map, coord));
        Ok(())
    }

    async fn delete_tile(
        &self,
        tenant: &str,
        map: MapId,
        coord: Coord,
        zoom: u8,
    ) -> Result<(), StoreError> {
        self.tables
            .lock()
            .tiles
            .remove(&(tenant.to_string(), map, TileKey::new(zoom, coord)));
        Ok(())
    }

    async fn delete_overlays_at(
        &self,
        tenant: &str,
        map: MapId,
        coord: Coord,
    ) -> Result<(), StoreError> {
        self.tables
            .lock()
            .overlays
            .retain(|(t, m, c, _), _| !(t == tenant && *m == map && *c == coord));
        Ok(())
    }

    async fn delete_map(&self, tenant: &str, map: MapId) -> Result<(), StoreError> {
        self.tables.lock().maps.remove(&(tenant.to_string(), map));
        Ok(())
    }

    async fn delete_grids_by_map(&self, tenant: &str, map: MapId) -> Result<(), StoreError> {
        self.tables
            .lock()
            .grids
            .retain(|(t, m, _), _| !(t == tenant && *m == map));
        Ok(())
    }

    async fn delete_tiles_by_map(&self, tenant: &str, map: MapId) -> Result<(), StoreError> {
        self.tables
            .lock()
            .tiles
            .retain(|(t, m, _), _| !(t == tenant && *m == map));
        Ok(())
    }

    async fn delete_overlays_by_map(&self, tenant: &str, map: MapId) -> Result<(), StoreError> {
        self.tables
            .lock()
            .overlays
            .retain(|(t, m, _, _), _| !(t == tenant && *m == map));
        Ok(())
    }
}

/// Quota tracker accumulating usage per tenant.
#[derive(Debug, Default)]
pub struct MemoryQuota {
    usage_mb: DashMap<TenantId, f64>,
    calls: Mutex<usize>,
}

impl MemoryQuota {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current usage of a tenant in megabytes.
    pub fn usage_mb(&self, tenant: &str) -> f64 {
        self.usage_mb.get(tenant).map(|v| *v).unwrap_or(0.0)
    }

    /// Number of increment calls received.
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl QuotaTracker for MemoryQuota {
    async fn increment_storage_usage(&self, tenant: &str, delta_mb: f64) -> Result<(), StoreError> {
        *self.calls.lock() += 1;
        *self.usage_mb.entry(tenant.to_string()).or_insert(0.0) += delta_mb;
        Ok(())
    }
}

/// Marker sink collecting uploads in memory.
#[derive(Debug, Default)]
pub struct MemoryMarkerSink {
    markers: Mutex<Vec<MarkerUpload>>,
    failing_batches: Mutex<HashSet<usize>>,
    batches: Mutex<usize>,
}

impl MemoryMarkerSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the batch with the given zero-based index fail.
    pub fn fail_batch(&self, index: usize) {
        self.failing_batches.lock().insert(index);
    }

    pub fn markers(&self) -> Vec<MarkerUpload> {
        self.markers.lock().clone()
    }
}

impl MarkerSink for MemoryMarkerSink {
    async fn bulk_upload_markers(
        &self,
        _tenant: &str,
        markers: Vec<MarkerUpload>,
    ) -> Result<usize, StoreError> {
        let index = {
            let mut batches = self.batches.lock();
            let index = *batches;
            *batches += 1;
            index
        };
        if self.failing_batches.lock().contains(&index) {
            return Err(StoreError::WriteFailed(format!(
                "marker batch {} rejected",
                index
            )));
        }
        let count = markers.len();
        self.markers.lock().extend(markers);
        Ok(count)
    }
}

/// Markers waiting for their grid to be uploaded.
#[derive(Debug, Default)]
pub struct PendingMarkerBuffer {
    waiting: DashMap<(TenantId, String), Vec<MarkerUpload>>,
    released: Mutex<Vec<MarkerUpload>>,
}

impl PendingMarkerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a marker until its grid exists.
    pub fn queue(&self, tenant: &str, marker: MarkerUpload) {
        self.waiting
            .entry((tenant.to_string(), marker.grid_id.clone()))
            .or_default()
            .push(marker);
    }

    /// Markers released so far.
    pub fn released(&self) -> Vec<MarkerUpload> {
        self.released.lock().clone()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.iter().map(|e| e.value().len()).sum()
    }
}

impl PendingMarkers for PendingMarkerBuffer {
    fn release_for_grid(&self, tenant: &str, grid_id: &str) -> usize {
        match self
            .waiting
            .remove(&(tenant.to_string(), grid_id.to_string()))
        {
            Some((_, markers)) => {
                let count = markers.len();
                self.released.lock().extend(markers);
                count
            }
            None => 0,
        }
    }
}
