//! Marker placement and bulk upload.

use super::progress::{ImportPhase, ProgressReporter};
use crate::coord::Coord;
use crate::hmap::DecodedMarker;
use crate::store::{MarkerSink, MarkerUpload};
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default number of markers per upload call.
pub const DEFAULT_MARKER_BATCH_SIZE: usize = 500;

/// Stored grid ids by segment and file-space grid coordinate.
pub(crate) type GridIndex = HashMap<(i64, Coord), String>;

/// Markers ready to upload, and how many could not be placed.
#[derive(Debug, Default)]
pub(crate) struct MarkerPlan {
    pub uploads: Vec<MarkerUpload>,
    pub skipped: usize,
}

/// Resolves each marker to the stored grid that contains it.
///
/// Markers in segments that were not imported, or whose grid has no
/// stored record, are skipped.
pub(crate) fn plan_markers(
    markers: &[DecodedMarker],
    kept_segments: &HashSet<i64>,
    grids: &GridIndex,
) -> MarkerPlan {
    let mut plan = MarkerPlan::default();
    for marker in markers {
        let segment = marker.segment_id();
        if !kept_segments.contains(&segment) {
            plan.skipped += 1;
            continue;
        }
        let (tx, ty) = marker.tile_coord();
        let Some(grid_id) = grids.get(&(segment, Coord::grid_of_tile(tx, ty))) else {
            plan.skipped += 1;
            continue;
        };
        let (x, y) = Coord::offset_in_grid(tx, ty);
        plan.uploads.push(MarkerUpload {
            grid_id: grid_id.clone(),
            x,
            y,
            name: marker.name().to_string(),
            image: marker.image().to_string(),
        });
    }
    debug!(
        placed = plan.uploads.len(),
        skipped = plan.skipped,
        "Markers placed"
    );
    plan
}

/// Upload counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MarkerUploadReport {
    pub imported: usize,
    /// Markers in failed or unsent batches
    pub skipped: usize,
    pub cancelled: bool,
}

/// Uploads markers in batches of `batch_size`.
///
/// A failed batch is logged and its markers counted as skipped; later
/// batches are still sent.
pub(crate) async fn upload_markers<M: MarkerSink>(
    sink: &M,
    tenant: &str,
    uploads: Vec<MarkerUpload>,
    batch_size: usize,
    cancel: &CancellationToken,
    progress: &ProgressReporter,
) -> MarkerUploadReport {
    let total = uploads.len();
    let mut report = MarkerUploadReport::default();
    let mut sent = 0usize;
    let mut remaining = uploads.into_iter().peekable();

    while remaining.peek().is_some() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            report.skipped += total - sent;
            break;
        }
        let batch: Vec<MarkerUpload> = remaining.by_ref().take(batch_size.max(1)).collect();
        let len = batch.len();
        match sink.bulk_upload_markers(tenant, batch).await {
            Ok(stored) => {
                report.imported += stored;
                report.skipped += len.saturating_sub(stored);
            }
            Err(e) => {
                warn!(tenant, markers = len, error = %e, "Marker batch failed");
                report.skipped += len;
            }
        }
        sent += len;
        progress.report(ImportPhase::Markers, sent, total, None);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryMarkerSink;

    fn player(segment_id: i64, tile_x: i32, tile_y: i32, name: &str) -> DecodedMarker {
        DecodedMarker::Player {
            segment_id,
            tile_x,
            tile_y,
            name: name.to_string(),
            color: [255, 0, 0, 255],
        }
    }

    #[test]
    fn test_plan_resolves_grid_and_offset() {
        let mut grids = GridIndex::new();
        grids.insert((1, Coord::new(-1, 2)), "g-neg".to_string());
        let kept: HashSet<i64> = [1].into();

        let plan = plan_markers(&[player(1, -1, 250, "camp")], &kept, &grids);

        assert_eq!(plan.skipped, 0);
        assert_eq!(
            plan.uploads,
            vec![MarkerUpload {
                grid_id: "g-neg".into(),
                x: 99,
                y: 50,
                name: "camp".into(),
                image: "gfx/hud/mmap/flag".into(),
            }]
        );
    }

    #[test]
    fn test_plan_skips_discarded_and_unresolved() {
        let mut grids = GridIndex::new();
        grids.insert((1, Coord::new(0, 0)), "g".to_string());
        grids.insert((2, Coord::new(0, 0)), "h".to_string());
        let kept: HashSet<i64> = [1].into();

        let markers = [
            player(1, 10, 10, "ok"),
            player(2, 10, 10, "discarded segment"),
            player(1, 500, 500, "no grid"),
        ];
        let plan = plan_markers(&markers, &kept, &grids);
        assert_eq!(plan.uploads.len(), 1);
        assert_eq!(plan.skipped, 2);
    }

    fn uploads(n: usize) -> Vec<MarkerUpload> {
        (0..n)
            .map(|i| MarkerUpload {
                grid_id: "g".into(),
                x: 0,
                y: 0,
                name: format!("m{i}"),
                image: "gfx/hud/mmap/flag".into(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failed_batch_counts_as_skipped() {
        let sink = MemoryMarkerSink::new();
        sink.fail_batch(1);
        let report = upload_markers(
            &sink,
            "t",
            uploads(1200),
            500,
            &CancellationToken::new(),
            &ProgressReporter::new(None),
        )
        .await;
        assert_eq!(report.imported, 700);
        assert_eq!(report.skipped, 500);
        assert_eq!(sink.markers().len(), 700);
    }

    #[tokio::test]
    async fn test_cancel_skips_remaining() {
        let sink = MemoryMarkerSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = upload_markers(
            &sink,
            "t",
            uploads(10),
            5,
            &cancel,
            &ProgressReporter::new(None),
        )
        .await;
        assert!(report.cancelled);
        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped, 10);
    }
}
