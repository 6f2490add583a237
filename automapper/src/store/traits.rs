//! Collaborator traits.
//!
//! The engine never talks to a database, quota service or marker service
//! directly. It depends on these traits; the hosting server supplies the
//! implementations.

use super::error::StoreError;
use super::types::{GridRecord, MapId, MapInfo, MarkerUpload, OverlayRecord, TileRecord};
use crate::coord::Coord;
use std::collections::HashSet;
use std::future::Future;

/// Record store for grids, tiles, overlays and maps.
pub trait MapStore: Send + Sync + 'static {
    /// Returns every grid record of a tenant.
    fn grid_snapshot(
        &self,
        tenant: &str,
    ) -> impl Future<Output = Result<Vec<GridRecord>, StoreError>> + Send;

    /// Returns the subset of `ids` that already exist for the tenant.
    fn existing_grid_ids(
        &self,
        tenant: &str,
        ids: &[String],
    ) -> impl Future<Output = Result<HashSet<String>, StoreError>> + Send;

    /// Returns the grid stored at a coordinate.
    fn get_grid(
        &self,
        tenant: &str,
        map: MapId,
        coord: Coord,
    ) -> impl Future<Output = Result<Option<GridRecord>, StoreError>> + Send;

    /// Finds a grid by its id.
    fn find_grid(
        &self,
        tenant: &str,
        grid_id: &str,
    ) -> impl Future<Output = Result<Option<GridRecord>, StoreError>> + Send;

    /// Returns every grid of a map.
    fn grids_in_map(
        &self,
        tenant: &str,
        map: MapId,
    ) -> impl Future<Output = Result<Vec<GridRecord>, StoreError>> + Send;

    /// Writes grid rows. With `skip_existence_check` the caller guarantees
    /// the rows are new.
    fn save_grids_batch(
        &self,
        rows: Vec<GridRecord>,
        skip_existence_check: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Writes tile rows, replacing rows with the same key.
    fn save_tiles_batch(
        &self,
        rows: Vec<TileRecord>,
        skip_existence_check: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Inserts or replaces overlay rows.
    fn upsert_overlays_batch(
        &self,
        rows: Vec<OverlayRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns every overlay row of a map.
    fn overlays_in_map(
        &self,
        tenant: &str,
        map: MapId,
    ) -> impl Future<Output = Result<Vec<OverlayRecord>, StoreError>> + Send;

    fn get_tile(
        &self,
        tenant: &str,
        map: MapId,
        coord: Coord,
        zoom: u8,
    ) -> impl Future<Output = Result<Option<TileRecord>, StoreError>> + Send;

    fn tiles_in_map(
        &self,
        tenant: &str,
        map: MapId,
        zoom: u8,
    ) -> impl Future<Output = Result<Vec<TileRecord>, StoreError>> + Send;

    /// Creates a map with the next free id.
    fn create_map(
        &self,
        tenant: &str,
        name: &str,
        priority: i32,
    ) -> impl Future<Output = Result<MapInfo, StoreError>> + Send;

    fn get_map(
        &self,
        tenant: &str,
        map: MapId,
    ) -> impl Future<Output = Result<Option<MapInfo>, StoreError>> + Send;

    fn list_maps(&self, tenant: &str)
        -> impl Future<Output = Result<Vec<MapInfo>, StoreError>> + Send;

    fn delete_grid(
        &self,
        tenant: &str,
        map: MapId,
        coord: Coord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_tile(
        &self,
        tenant: &str,
        map: MapId,
        coord: Coord,
        zoom: u8,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes every overlay stored at a coordinate.
    fn delete_overlays_at(
        &self,
        tenant: &str,
        map: MapId,
        coord: Coord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_map(
        &self,
        tenant: &str,
        map: MapId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_grids_by_map(
        &self,
        tenant: &str,
        map: MapId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_tiles_by_map(
        &self,
        tenant: &str,
        map: MapId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_overlays_by_map(
        &self,
        tenant: &str,
        map: MapId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Storage quota bookkeeping.
pub trait QuotaTracker: Send + Sync + 'static {
    /// Adds `delta_mb` (negative to release) to a tenant's usage.
    fn increment_storage_usage(
        &self,
        tenant: &str,
        delta_mb: f64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Marker service used for bulk marker import.
pub trait MarkerSink: Send + Sync + 'static {
    /// Uploads a batch of markers, returning how many were stored.
    fn bulk_upload_markers(
        &self,
        tenant: &str,
        markers: Vec<MarkerUpload>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// Buffer of markers waiting for their grid to exist.
pub trait PendingMarkers: Send + Sync + 'static {
    /// Releases markers queued for `grid_id`, returning how many were released.
    fn release_for_grid(&self, tenant: &str, grid_id: &str) -> usize;
}

/// Pending-marker buffer that holds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPendingMarkers;

impl PendingMarkers for NoPendingMarkers {
    fn release_for_grid(&self, _tenant: &str, _grid_id: &str) -> usize {
        0
    }
}

/// Converts a byte count into the megabytes reported to the quota tracker.
#[inline]
pub fn bytes_to_mb(bytes: i64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
