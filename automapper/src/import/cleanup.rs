//! Removal of an import's output.

use super::ledger::ImportLedger;
use crate::coord::{Coord, TileKey, MAX_ZOOM, MIN_ZOOM};
use crate::pyramid::PyramidBuilder;
use crate::store::{
    bytes_to_mb, map_directory, remove_tile_file, tile_path, MapId, MapStore, QuotaTracker,
    StoreError,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What a cleanup removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub maps_deleted: usize,
    pub grids_deleted: usize,
    pub tiles_deleted: usize,
    pub files_removed: usize,
    /// Bytes the import had charged for the removed tiles, now released
    pub bytes_released: i64,
    /// Pyramid tiles of pre-existing maps recomposed without the removed grids
    pub pyramid_tiles_restored: usize,
    /// Individual steps that failed and were skipped
    pub failures: usize,
}

impl CleanupReport {
    fn record(&mut self, step: &str, result: Result<(), StoreError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(step, error = %e, "Cleanup step failed");
                self.failures += 1;
                false
            }
        }
    }
}

async fn remove_file(path: PathBuf) -> std::io::Result<Option<u64>> {
    tokio::task::spawn_blocking(move || remove_tile_file(&path))
        .await
        .map_err(std::io::Error::other)?
}

/// Deletes everything listed in `ledger` and releases its quota.
///
/// Only bytes the import actually charged are released: files whose batch
/// never reached the quota tracker are removed without a release.
/// Best-effort: a failing step is logged and counted, and the remaining
/// steps still run.
pub async fn cleanup_import<S: MapStore, Q: QuotaTracker>(
    store: &S,
    quota: &Q,
    tile_root: &Path,
    ledger: &ImportLedger,
) -> CleanupReport {
    let tenant = ledger.tenant.as_str();
    let mut report = CleanupReport::default();

    for &map in &ledger.created_maps {
        for zoom in MIN_ZOOM..=MAX_ZOOM {
            match store.tiles_in_map(tenant, map, zoom).await {
                Ok(tiles) => report.tiles_deleted += tiles.len(),
                Err(e) => {
                    warn!(map, zoom, error = %e, "Failed to list tiles for cleanup");
                    report.failures += 1;
                }
            }
        }
        let grids = store.grids_in_map(tenant, map).await.map(|g| g.len()).unwrap_or(0);

        report.record("delete tiles", store.delete_tiles_by_map(tenant, map).await);
        report.record("delete overlays", store.delete_overlays_by_map(tenant, map).await);
        if report.record("delete grids", store.delete_grids_by_map(tenant, map).await) {
            report.grids_deleted += grids;
        }
        if report.record("delete map", store.delete_map(tenant, map).await) {
            report.maps_deleted += 1;
        }

        let dir = map_directory(tile_root, tenant, map);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                report.files_removed += 1;
                report.bytes_released += ledger.charged_in_map(map);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                report.bytes_released += ledger.charged_in_map(map);
            }
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Failed to remove map directory");
                report.failures += 1;
            }
        }
    }

    let zoom0 = ledger
        .grids_in_existing_maps()
        .map(|&(map, coord)| (map, TileKey::new(0, coord)));
    let pyramid = ledger
        .pyramid_tiles
        .iter()
        .copied()
        .filter(|(map, _)| !ledger.is_created_map(*map));
    let tiles: Vec<_> = zoom0.chain(pyramid).collect();

    for (map, key) in tiles {
        if key.zoom == 0 {
            if report.record("delete grid", store.delete_grid(tenant, map, key.coord).await) {
                report.grids_deleted += 1;
            }
            report.record(
                "delete overlays",
                store.delete_overlays_at(tenant, map, key.coord).await,
            );
        }
        if report.record(
            "delete tile",
            store.delete_tile(tenant, map, key.coord, key.zoom).await,
        ) {
            report.tiles_deleted += 1;
        }
        let path = tile_path(tile_root, tenant, map, &key);
        match remove_file(path.clone()).await {
            Ok(removed) => {
                if removed.is_some() {
                    report.files_removed += 1;
                }
                report.bytes_released += ledger.charged_for(map, &key);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove tile file");
                report.failures += 1;
            }
        }
    }

    if report.bytes_released != 0 {
        let released = quota
            .increment_storage_usage(tenant, -bytes_to_mb(report.bytes_released))
            .await;
        report.record("release quota", released);
    }

    info!(
        tenant,
        maps = report.maps_deleted,
        grids = report.grids_deleted,
        tiles = report.tiles_deleted,
        bytes_released = report.bytes_released,
        failures = report.failures,
        "Import cleanup finished"
    );
    report
}

/// Recomposes zoom 1-6 of pre-existing maps over the grids cleanup removed.
///
/// Parents left without children are not rewritten. The builder charges
/// its own size changes to the quota.
pub async fn restore_pyramids<S: MapStore, Q: QuotaTracker>(
    builder: &PyramidBuilder<S, Q>,
    ledger: &ImportLedger,
    report: &mut CleanupReport,
) {
    let mut removed: BTreeMap<MapId, Vec<Coord>> = BTreeMap::new();
    for &(map, coord) in ledger.grids_in_existing_maps() {
        removed.entry(map).or_default().push(coord);
    }
    let cancel = CancellationToken::new();
    for (map, coords) in removed {
        match builder.rebuild(&ledger.tenant, map, &coords, &cancel).await {
            Ok(rebuilt) => report.pyramid_tiles_restored += rebuilt.tiles_written,
            Err(e) => {
                warn!(map, error = %e, "Failed to restore pyramid after cleanup");
                report.failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        tile_relative_path, write_tile_file, GridRecord, MemoryMapStore, MemoryQuota, TileRecord,
    };
    use tempfile::TempDir;

    async fn put_tile(store: &MemoryMapStore, root: &Path, map: i64, key: TileKey, bytes: &[u8]) {
        write_tile_file(&tile_path(root, "t", map, &key), bytes).unwrap();
        store
            .save_tiles_batch(
                vec![TileRecord {
                    map,
                    coord: key.coord,
                    zoom: key.zoom,
                    file_path: tile_relative_path("t", map, &key),
                    cache_timestamp: 0,
                    size_bytes: bytes.len() as u64,
                    tenant: "t".into(),
                }],
                false,
            )
            .await
            .unwrap();
    }

    fn grid(id: &str, map: i64, coord: Coord) -> GridRecord {
        GridRecord {
            id: id.into(),
            map,
            coord,
            tenant: "t".into(),
            next_update: None,
        }
    }

    #[tokio::test]
    async fn test_cleanup_created_map_and_existing_grids() {
        let dir = TempDir::new().unwrap();
        let store = MemoryMapStore::new();
        let quota = MemoryQuota::new();

        let existing = store.create_map("t", "main", 1).await.unwrap();
        let created = store.create_map("t", "import", 0).await.unwrap();
        let keep = Coord::new(0, 0);
        let added = Coord::new(1, 0);
        store
            .save_grids_batch(
                vec![
                    grid("old", existing.id, keep),
                    grid("new", existing.id, added),
                    grid("cave", created.id, keep),
                ],
                true,
            )
            .await
            .unwrap();
        put_tile(&store, dir.path(), existing.id, TileKey::new(0, keep), b"1234").await;
        put_tile(&store, dir.path(), existing.id, TileKey::new(0, added), b"12345").await;
        put_tile(&store, dir.path(), created.id, TileKey::new(0, keep), b"123456").await;

        let mut ledger = ImportLedger::new("t");
        ledger.created_maps.push(created.id);
        ledger.grids.push((existing.id, added));
        ledger.grids.push((created.id, keep));
        ledger.charge(existing.id, TileKey::new(0, added), 5);
        ledger.charge(created.id, TileKey::new(0, keep), 6);

        let report = cleanup_import(&store, &quota, dir.path(), &ledger).await;

        assert_eq!(report.failures, 0);
        assert_eq!(report.maps_deleted, 1);
        assert_eq!(report.grids_deleted, 2);
        assert_eq!(report.bytes_released, 11);
        assert_eq!(store.grid_count(), 1);
        assert_eq!(store.tile_count(), 1);
        assert!(store.get_map("t", created.id).await.unwrap().is_none());
        assert!(!map_directory(dir.path(), "t", created.id).exists());
        assert!(tile_path(dir.path(), "t", existing.id, &TileKey::new(0, keep)).exists());
        assert!(!tile_path(dir.path(), "t", existing.id, &TileKey::new(0, added)).exists());
        assert!((quota.usage_mb("t") + bytes_to_mb(11)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_uncharged_files_are_removed_without_release() {
        let dir = TempDir::new().unwrap();
        let store = MemoryMapStore::new();
        let quota = MemoryQuota::new();
        let main = store.create_map("t", "main", 1).await.unwrap();
        let flushed = Coord::new(0, 0);
        let pending = Coord::new(1, 0);
        put_tile(&store, dir.path(), main.id, TileKey::new(0, flushed), b"12345678").await;
        write_tile_file(&tile_path(dir.path(), "t", main.id, &TileKey::new(0, pending)), b"123")
            .unwrap();

        let mut ledger = ImportLedger::new("t");
        ledger.grids.push((main.id, flushed));
        ledger.grids.push((main.id, pending));
        ledger.charge(main.id, TileKey::new(0, flushed), 8);

        let report = cleanup_import(&store, &quota, dir.path(), &ledger).await;

        assert_eq!(report.files_removed, 2);
        assert_eq!(report.bytes_released, 8);
        assert_eq!(quota.calls(), 1);
        assert!((quota.usage_mb("t") + bytes_to_mb(8)).abs() < 1e-12);
        assert!(!tile_path(dir.path(), "t", main.id, &TileKey::new(0, pending)).exists());
    }

    #[tokio::test]
    async fn test_restore_skips_ledger_without_existing_maps() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(MemoryMapStore::new());
        let quota = std::sync::Arc::new(MemoryQuota::new());
        let builder = PyramidBuilder::new(
            store,
            quota,
            dir.path(),
            crate::pyramid::PyramidConfig::default(),
        );
        let mut ledger = ImportLedger::new("t");
        ledger.created_maps.push(3);
        ledger.grids.push((3, Coord::new(0, 0)));

        let mut report = CleanupReport::default();
        restore_pyramids(&builder, &ledger, &mut report).await;
        assert_eq!(report, CleanupReport::default());
    }

    #[tokio::test]
    async fn test_cleanup_of_empty_ledger_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = MemoryMapStore::new();
        let quota = MemoryQuota::new();
        let report = cleanup_import(&store, &quota, dir.path(), &ImportLedger::new("t")).await;
        assert_eq!(report, CleanupReport::default());
        assert_eq!(quota.calls(), 0);
    }
}
