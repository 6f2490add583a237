//! Row batching for the import consumer.

use crate::coord::TileKey;
use crate::store::{
    bytes_to_mb, GridRecord, MapId, MapStore, OverlayRecord, QuotaTracker, StoreError, TileRecord,
};
use std::mem;
use tracing::debug;

/// Rows written since the last flush.
#[derive(Debug, Default)]
pub(crate) struct PersistBatch {
    pub grids: Vec<GridRecord>,
    pub tiles: Vec<TileRecord>,
    pub overlays: Vec<OverlayRecord>,
    /// Net bytes written to disk by the rows above
    pub bytes_delta: i64,
    /// Per-file share of `bytes_delta`
    pub charges: Vec<(MapId, TileKey, i64)>,
}

/// Per-file bytes a successful flush charged to the quota.
pub(crate) type Charges = Vec<(MapId, TileKey, i64)>;

impl PersistBatch {
    /// Number of grids waiting.
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty() && self.tiles.is_empty() && self.overlays.is_empty()
    }

    /// Adds one written tile file and its net size change.
    pub fn add_file(&mut self, map: MapId, key: TileKey, delta: i64) {
        self.bytes_delta += delta;
        self.charges.push((map, key, delta));
    }

    /// Writes the pending rows and reports their bytes to the quota.
    ///
    /// Grids are new by construction, so the existence check is skipped.
    /// The batch is empty afterwards even if a write fails. Returns the
    /// per-file charges once the quota call succeeded.
    pub async fn flush<S: MapStore, Q: QuotaTracker>(
        &mut self,
        store: &S,
        quota: &Q,
        tenant: &str,
    ) -> Result<Charges, StoreError> {
        let charges = mem::take(&mut self.charges);
        if self.is_empty() && self.bytes_delta == 0 {
            return Ok(charges);
        }
        let grids = mem::take(&mut self.grids);
        let tiles = mem::take(&mut self.tiles);
        let overlays = mem::take(&mut self.overlays);
        let delta = mem::take(&mut self.bytes_delta);
        debug!(
            grids = grids.len(),
            tiles = tiles.len(),
            overlays = overlays.len(),
            bytes = delta,
            "Flushing import batch"
        );

        if !grids.is_empty() {
            store.save_grids_batch(grids, true).await?;
        }
        if !tiles.is_empty() {
            store.save_tiles_batch(tiles, true).await?;
        }
        if !overlays.is_empty() {
            store.upsert_overlays_batch(overlays).await?;
        }
        if delta != 0 {
            quota.increment_storage_usage(tenant, bytes_to_mb(delta)).await?;
        }
        Ok(charges)
    }
}
