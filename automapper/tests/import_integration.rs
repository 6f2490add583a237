//! End-to-end imports against the in-memory store.

use automapper::coord::{Coord, TileKey, GRID_PIXELS, GRID_SIZE};
use automapper::hmap::{
    DecodedGrid, DecodedMarker, HmapWriter, Overlay, Tileset, OVERLAY_BITMAP_LEN,
};
use automapper::import::{
    CleanupPolicy, ImportError, ImportGate, ImportOptions, ImportOutcome, ImportPhase,
    ImportProgress, ImportService, ImportSummary,
};
use automapper::store::{
    map_directory, tile_path, MapStore, MemoryMapStore, MemoryMarkerSink, MemoryQuota,
};
use automapper::texture::DirectoryTextureSource;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const TENANT: &str = "tenant-a";
const GRASS: &str = "gfx/tiles/grass";

type Service = ImportService<MemoryMapStore, DirectoryTextureSource, MemoryQuota, MemoryMarkerSink>;

fn grid(id: i64, segment: i64, x: i32, y: i32) -> DecodedGrid {
    DecodedGrid {
        version: 4,
        grid_id: id,
        segment_id: segment,
        mtime: 0,
        coord: Coord::new(x, y),
        tilesets: vec![Tileset {
            resource_name: GRASS.to_string(),
            version: 1,
            priority: 0,
        }],
        tiles: vec![0; GRID_SIZE],
        zmap: Some(vec![0.0; GRID_SIZE]),
        overlays: Vec::new(),
    }
}

fn marker(segment: i64, tile_x: i32, tile_y: i32, name: &str) -> DecodedMarker {
    DecodedMarker::Player {
        segment_id: segment,
        tile_x,
        tile_y,
        name: name.to_string(),
        color: [255, 0, 0, 255],
    }
}

fn export(grids: &[DecodedGrid], markers: &[DecodedMarker]) -> Vec<u8> {
    let mut writer = HmapWriter::new();
    for g in grids {
        writer.add_grid(g);
    }
    for m in markers {
        writer.add_marker(m);
    }
    writer.finish()
}

/// Segment 1 is a 2×2 block with ids 1-4, segment 2 a single grid.
fn two_segments() -> Vec<DecodedGrid> {
    vec![
        grid(1, 1, 0, 0),
        grid(2, 1, 1, 0),
        grid(3, 1, 0, 1),
        grid(4, 1, 1, 1),
        grid(20, 2, 5, 5),
    ]
}

struct Harness {
    store: Arc<MemoryMapStore>,
    quota: Arc<MemoryQuota>,
    markers: Arc<MemoryMarkerSink>,
    textures: Arc<DirectoryTextureSource>,
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let textures = DirectoryTextureSource::new(dir.path().join("textures"));
        textures.insert(
            GRASS,
            RgbaImage::from_pixel(GRID_PIXELS, GRID_PIXELS, Rgba([40, 160, 40, 255])),
        );
        Self {
            store: Arc::new(MemoryMapStore::new()),
            quota: Arc::new(MemoryQuota::new()),
            markers: Arc::new(MemoryMarkerSink::new()),
            textures: Arc::new(textures),
            dir,
        }
    }

    fn tile_root(&self) -> std::path::PathBuf {
        self.dir.path().join("tiles")
    }

    fn service(&self) -> Service {
        self.service_with(ImportOptions::default())
    }

    fn service_with(&self, options: ImportOptions) -> Service {
        ImportService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.textures),
            Arc::clone(&self.quota),
            Arc::clone(&self.markers),
            self.tile_root(),
        )
        .with_options(options)
        .with_gate(ImportGate::isolated())
    }

    async fn import(&self, service: &Service, data: Vec<u8>) -> ImportSummary {
        match service
            .import(TENANT, data, CancellationToken::new(), None)
            .await
            .unwrap()
        {
            ImportOutcome::Completed(summary) => summary,
            other => panic!("expected completed import, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_fresh_import_creates_one_map_per_segment() {
    let h = Harness::new();
    let data = export(&two_segments(), &[marker(1, 150, 50, "camp")]);

    let summary = h.import(&h.service(), data).await;

    assert_eq!(summary.grids_imported, 5);
    assert_eq!(summary.grids_skipped, 0);
    assert_eq!(summary.grids_merged, 0);
    assert_eq!(summary.maps_created, 2);
    assert_eq!(summary.segments_imported, 2);
    assert_eq!(summary.textures_loaded, 1);
    // one tile per zoom level above each segment
    assert_eq!(summary.pyramid_tiles, 12);
    assert_eq!(summary.ledger.created_maps, vec![1, 2]);

    assert_eq!(h.store.map_count(), 2);
    assert_eq!(h.store.grid_count(), 5);
    assert_eq!(h.store.tile_count(), 17);
    assert!(h.quota.usage_mb(TENANT) > 0.0);

    let stored = h.store.get_grid(TENANT, 1, Coord::new(1, 0)).await.unwrap();
    assert_eq!(stored.map(|g| g.id), Some("2".to_string()));
    let base = tile_path(&h.tile_root(), TENANT, 1, &TileKey::new(0, Coord::new(1, 0)));
    assert!(base.exists());
    let top = tile_path(&h.tile_root(), TENANT, 2, &TileKey::new(6, Coord::new(0, 0)));
    assert!(top.exists());
}

#[tokio::test]
async fn test_markers_land_in_their_grid() {
    let h = Harness::new();
    let markers = [
        marker(1, 150, 50, "camp"),
        marker(1, 990, 990, "nowhere"),
        marker(9, 10, 10, "other segment"),
    ];
    let data = export(&two_segments(), &markers);

    let summary = h.import(&h.service(), data).await;

    assert_eq!(summary.markers_imported, 1);
    assert_eq!(summary.markers_skipped, 2);
    let uploaded = h.markers.markers();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].grid_id, "2");
    assert_eq!((uploaded[0].x, uploaded[0].y), (50, 50));
    assert_eq!(uploaded[0].name, "camp");
}

#[tokio::test]
async fn test_reimport_skips_stored_grids() {
    let h = Harness::new();
    let data = export(&two_segments(), &[marker(1, 150, 50, "camp")]);
    let service = h.service();
    h.import(&service, data.clone()).await;

    let summary = h.import(&service, data).await;

    assert_eq!(summary.grids_imported, 0);
    assert_eq!(summary.grids_skipped, 5);
    assert_eq!(summary.maps_created, 0);
    assert_eq!(summary.pyramid_tiles, 0);
    assert!(summary.ledger.is_empty());
    // markers of known grids still resolve
    assert_eq!(summary.markers_imported, 1);
    assert_eq!(h.store.map_count(), 2);
    assert_eq!(h.store.grid_count(), 5);
}

#[tokio::test]
async fn test_overlapping_segment_merges_with_offset() {
    let h = Harness::new();
    let service = h.service();
    h.import(&service, export(&two_segments()[..4], &[])).await;

    // ids 3 and 4 sit one row higher in this export, 9 is new
    let second = vec![grid(3, 7, 0, 0), grid(4, 7, 1, 0), grid(9, 7, 0, 1)];
    let summary = h.import(&service, export(&second, &[])).await;

    assert_eq!(summary.grids_imported, 1);
    assert_eq!(summary.grids_merged, 1);
    assert_eq!(summary.grids_skipped, 2);
    assert_eq!(summary.maps_created, 0);
    assert!(summary
        .ledger
        .grids_in_existing_maps()
        .any(|g| *g == (1, Coord::new(0, 2))));

    let placed = h.store.get_grid(TENANT, 1, Coord::new(0, 2)).await.unwrap();
    assert_eq!(placed.map(|g| g.id), Some("9".to_string()));
    assert_eq!(h.store.map_count(), 1);
}

#[tokio::test]
async fn test_repeated_id_in_file_is_imported_once() {
    let h = Harness::new();
    let grids = vec![grid(1, 1, 0, 0), grid(1, 1, 3, 3), grid(2, 1, 1, 0)];

    let summary = h.import(&h.service(), export(&grids, &[])).await;

    assert_eq!(summary.grids_imported, 2);
    assert_eq!(summary.grids_skipped, 1);
    assert!(h.store.get_grid(TENANT, 1, Coord::new(3, 3)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_segments_beyond_limit_are_discarded() {
    let h = Harness::new();
    let options = ImportOptions {
        max_segments: 1,
        ..ImportOptions::default()
    };
    let data = export(&two_segments(), &[marker(2, 510, 510, "lost")]);

    let summary = h.import(&h.service_with(options), data).await;

    assert_eq!(summary.segments_imported, 1);
    assert_eq!(summary.segments_discarded, 1);
    assert_eq!(summary.grids_discarded, 1);
    assert_eq!(summary.grids_imported, 4);
    assert_eq!(summary.maps_created, 1);
    assert_eq!(summary.markers_skipped, 1);
    assert!(h.markers.markers().is_empty());
}

#[tokio::test]
async fn test_known_overlays_are_stored() {
    let h = Harness::new();
    let mut g = grid(1, 1, 0, 0);
    g.overlays = vec![
        Overlay {
            resource_name: "gfx/tiles/overlay/cplot-f".to_string(),
            version: 1,
            bitmap: vec![0xff; OVERLAY_BITMAP_LEN],
        },
        Overlay {
            resource_name: "gfx/tiles/overlay/unheard-of".to_string(),
            version: 1,
            bitmap: vec![0x0f; OVERLAY_BITMAP_LEN],
        },
    ];

    h.import(&h.service(), export(&[g], &[])).await;

    assert_eq!(h.store.overlay_count(), 1);
    let overlays = h.store.overlays_in_map(TENANT, 1).await.unwrap();
    assert_eq!(overlays[0].coord, Coord::new(0, 0));
}

#[tokio::test]
async fn test_second_import_is_rejected_while_gate_held() {
    let h = Harness::new();
    let gate = ImportGate::isolated();
    let service = h.service().with_gate(gate.clone());
    let _held = gate.try_acquire().unwrap();

    let outcome = service
        .import(TENANT, export(&two_segments(), &[]), CancellationToken::new(), None)
        .await
        .unwrap();

    assert!(matches!(outcome, ImportOutcome::Rejected));
    assert_eq!(h.store.grid_count(), 0);
}

#[tokio::test]
async fn test_cancelled_before_start_writes_nothing() {
    let h = Harness::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h
        .service()
        .import(TENANT, export(&two_segments(), &[]), cancel, None)
        .await
        .unwrap();

    let ImportOutcome::Cancelled(summary) = outcome else {
        panic!("expected cancellation");
    };
    assert_eq!(summary.grids_imported, 0);
    assert!(summary.cleanup.is_none());
    assert_eq!(h.store.map_count(), 0);
}

#[tokio::test]
async fn test_invalid_file_is_a_format_error() {
    let h = Harness::new();
    let result = h
        .service()
        .import(TENANT, b"not a map".to_vec(), CancellationToken::new(), None)
        .await;
    assert!(matches!(result, Err(ImportError::Format(_))));
}

#[tokio::test]
async fn test_failed_import_removes_created_maps() {
    let h = Harness::new();
    h.store.fail_tile_batches_after(0);

    let result = h
        .service()
        .import(TENANT, export(&two_segments(), &[]), CancellationToken::new(), None)
        .await;

    assert!(matches!(result, Err(ImportError::Store(_))));
    assert_eq!(h.store.map_count(), 0);
    assert_eq!(h.store.grid_count(), 0);
    assert!(!map_directory(&h.tile_root(), TENANT, 1).exists());
}

#[tokio::test]
async fn test_failed_import_kept_without_cleanup() {
    let h = Harness::new();
    h.store.fail_tile_batches_after(0);
    let options = ImportOptions {
        cleanup: CleanupPolicy::Never,
        ..ImportOptions::default()
    };

    let result = h
        .service_with(options)
        .import(TENANT, export(&two_segments(), &[]), CancellationToken::new(), None)
        .await;

    assert!(result.is_err());
    assert!(h.store.map_count() > 0);
    assert!(map_directory(&h.tile_root(), TENANT, 1).exists());
}

#[tokio::test]
async fn test_explicit_cleanup_removes_completed_import() {
    let h = Harness::new();
    let service = h.service();
    let summary = h.import(&service, export(&two_segments(), &[])).await;
    assert!(h.quota.usage_mb(TENANT) > 0.0);

    let report = service.cleanup(&summary.ledger).await;

    assert_eq!(report.maps_deleted, 2);
    assert_eq!(report.failures, 0);
    assert_eq!(h.store.map_count(), 0);
    assert_eq!(h.store.tile_count(), 0);
    assert!(h.quota.usage_mb(TENANT).abs() < 1e-9);
}

#[tokio::test]
async fn test_progress_runs_through_every_phase() {
    let h = Harness::new();
    let seen: Arc<Mutex<Vec<ImportProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let data = export(&two_segments(), &[marker(1, 150, 50, "camp")]);

    h.service()
        .import(
            TENANT,
            data,
            CancellationToken::new(),
            Some(Arc::new(move |p: ImportProgress| sink.lock().push(p))),
        )
        .await
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen.first().map(|p| p.phase), Some(ImportPhase::Decode));
    let last = seen.last().unwrap();
    assert_eq!(last.phase, ImportPhase::Markers);
    assert!((last.overall_percent - 100.0).abs() < 1e-6);
    for phase in ImportPhase::ALL {
        assert!(seen.iter().any(|p| p.phase == phase), "no update for {:?}", phase);
    }
    assert!(seen
        .windows(2)
        .all(|w| w[0].phase_number <= w[1].phase_number));
}

#[tokio::test]
async fn test_corrupt_zlib_header_persists_nothing() {
    let h = Harness::new();
    let mut data = export(&two_segments(), &[]);
    // first byte after the signature is the zlib CMF byte
    let header = automapper::hmap::SIGNATURE.len();
    data[header] = 0x00;
    data[header + 1] = 0x00;

    let result = h
        .service()
        .import(TENANT, data, CancellationToken::new(), None)
        .await;

    assert!(matches!(result, Err(ImportError::Format(_))));
    assert_eq!(h.store.map_count(), 0);
    assert_eq!(h.store.grid_count(), 0);
    assert!(!h.tile_root().exists());
}

#[tokio::test]
async fn test_cancel_mid_render_leaves_whole_rows() {
    let h = Harness::new();
    let grids: Vec<DecodedGrid> = (0..40)
        .map(|i| grid(100 + i as i64, 1, i % 8, i / 8))
        .collect();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let on_progress = move |p: ImportProgress| {
        if p.phase == ImportPhase::Render && p.current >= 1 {
            trigger.cancel();
        }
    };

    let outcome = h
        .service()
        .import(TENANT, export(&grids, &[]), cancel, Some(Arc::new(on_progress)))
        .await
        .unwrap();

    let ImportOutcome::Cancelled(summary) = outcome else {
        panic!("expected cancellation");
    };
    assert!(summary.grids_imported < 40);
    let stored = h.store.grid_snapshot(TENANT).await.unwrap();
    assert_eq!(stored.len(), summary.grids_imported);
    for record in stored {
        let tile = h
            .store
            .get_tile(TENANT, record.map, record.coord, 0)
            .await
            .unwrap();
        assert!(tile.is_some(), "grid {} has no tile row", record.id);
        let path = tile_path(&h.tile_root(), TENANT, record.map, &TileKey::new(0, record.coord));
        assert!(path.exists());
    }
}

#[tokio::test]
async fn test_failed_merge_restores_quota_and_existing_map() {
    let h = Harness::new();
    let service = h.service();
    h.import(&service, export(&two_segments()[..4], &[])).await;
    let usage_before = h.quota.usage_mb(TENANT);
    let tiles_before = h.store.tile_count();
    let base = tile_path(&h.tile_root(), TENANT, 1, &TileKey::new(0, Coord::new(1, 1)));
    let base_bytes = std::fs::read(&base).unwrap();
    h.store.fail_tile_batches_after(0);

    // 3 and 4 anchor the file onto map 1, 9 lands at (0, 2)
    let second = vec![grid(3, 7, 0, 0), grid(4, 7, 1, 0), grid(9, 7, 0, 1)];
    let result = service
        .import(TENANT, export(&second, &[]), CancellationToken::new(), None)
        .await;

    assert!(matches!(result, Err(ImportError::Store(_))));
    assert!((h.quota.usage_mb(TENANT) - usage_before).abs() < 1e-12);
    assert_eq!(h.store.map_count(), 1);
    assert_eq!(h.store.grid_count(), 4);
    assert!(h.store.get_grid(TENANT, 1, Coord::new(0, 2)).await.unwrap().is_none());
    assert_eq!(h.store.tile_count(), tiles_before);
    assert_eq!(std::fs::read(&base).unwrap(), base_bytes);
    assert!(!tile_path(&h.tile_root(), TENANT, 1, &TileKey::new(0, Coord::new(0, 2))).exists());
}

#[tokio::test]
async fn test_cleanup_of_merge_restores_pyramid() {
    let h = Harness::new();
    let service = h.service();
    h.import(&service, export(&two_segments()[..4], &[])).await;
    let usage_before = h.quota.usage_mb(TENANT);
    let z2 = tile_path(&h.tile_root(), TENANT, 1, &TileKey::new(2, Coord::new(0, 0)));
    let z2_before = std::fs::read(&z2).unwrap();

    let second = vec![grid(3, 7, 0, 0), grid(4, 7, 1, 0), grid(9, 7, 0, 1)];
    let summary = h.import(&service, export(&second, &[])).await;
    assert_eq!(summary.grids_merged, 1);
    assert_ne!(std::fs::read(&z2).unwrap(), z2_before);

    let report = service.cleanup(&summary.ledger).await;

    assert_eq!(report.failures, 0);
    assert_eq!(report.grids_deleted, 1);
    // zoom 2-6 above the remaining block; zoom 1 (0, 1) has no children left
    assert_eq!(report.pyramid_tiles_restored, 5);
    assert_eq!(std::fs::read(&z2).unwrap(), z2_before);
    assert!(!tile_path(&h.tile_root(), TENANT, 1, &TileKey::new(1, Coord::new(0, 1))).exists());
    assert!((h.quota.usage_mb(TENANT) - usage_before).abs() < 1e-9);
}
