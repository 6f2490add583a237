//! Import orchestration.

use super::batch::PersistBatch;
use super::cleanup::{cleanup_import, restore_pyramids, CleanupReport};
use super::error::ImportError;
use super::gate::ImportGate;
use super::ledger::ImportLedger;
use super::markers::{plan_markers, upload_markers, GridIndex, DEFAULT_MARKER_BATCH_SIZE};
use super::progress::{ImportPhase, ImportProgressCallback, ProgressReporter};
use crate::coord::{Coord, TileKey};
use crate::hmap::{self, DecodedGrid, DecodedMarker, Overlay, Segment};
use crate::merge::{resolve, ExistingGrids, SegmentDecision};
use crate::pipeline::{PoolConfig, StageError, WorkerPool};
use crate::pyramid::{PyramidBuilder, PyramidConfig, PyramidReport};
use crate::render::{render_grid, resolve_textures};
use crate::store::{
    encode_png, tile_path, tile_relative_path, write_tile_file, GridRecord, MapId, MapStore,
    MarkerSink, OverlayKind, OverlayRecord, QuotaTracker, TileRecord,
};
use crate::texture::{PrefetchProgress, TextureSource};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default number of segments imported from one file.
pub const DEFAULT_MAX_SEGMENTS: usize = 3;

/// Default number of grids per store flush.
pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 500;

/// When an import removes what it wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Keep partial results
    Never,
    /// Clean up after a fatal error
    #[default]
    OnFailure,
    /// Clean up after a fatal error or cancellation
    OnFailureOrCancel,
}

impl CleanupPolicy {
    /// Name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupPolicy::Never => "never",
            CleanupPolicy::OnFailure => "on_failure",
            CleanupPolicy::OnFailureOrCancel => "on_failure_or_cancel",
        }
    }

    pub fn on_failure(&self) -> bool {
        !matches!(self, CleanupPolicy::Never)
    }

    pub fn on_cancel(&self) -> bool {
        matches!(self, CleanupPolicy::OnFailureOrCancel)
    }
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" => Ok(CleanupPolicy::Never),
            "on_failure" => Ok(CleanupPolicy::OnFailure),
            "on_failure_or_cancel" => Ok(CleanupPolicy::OnFailureOrCancel),
            other => Err(format!("unknown cleanup policy '{}'", other)),
        }
    }
}

/// Import settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Largest segments kept from a file
    pub max_segments: usize,
    /// Grids per store flush
    pub batch_size: usize,
    /// Markers per upload call
    pub marker_batch_size: usize,
    /// Render workers and queue bounds
    pub pool: PoolConfig,
    pub pyramid: PyramidConfig,
    pub cleanup: CleanupPolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_segments: DEFAULT_MAX_SEGMENTS,
            batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            marker_batch_size: DEFAULT_MARKER_BATCH_SIZE,
            pool: PoolConfig::default(),
            pyramid: PyramidConfig::default(),
            cleanup: CleanupPolicy::default(),
        }
    }
}

/// Counts and bookkeeping of one import.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub grids_imported: usize,
    /// Grids already stored, repeated in the file, or landing on occupied
    /// coordinates
    pub grids_skipped: usize,
    /// Imported grids that went into maps existing before the import
    pub grids_merged: usize,
    /// Grids of segments beyond the kept ones
    pub grids_discarded: usize,
    pub maps_created: usize,
    pub caves: usize,
    pub not_proximate: usize,
    pub markers_imported: usize,
    pub markers_skipped: usize,
    pub segments_imported: usize,
    pub segments_discarded: usize,
    /// Tiles written at zoom 1-6
    pub pyramid_tiles: usize,
    pub textures_loaded: usize,
    pub elapsed: Duration,
    pub ledger: ImportLedger,
    /// Set when the import removed its own output
    pub cleanup: Option<CleanupReport>,
}

/// How an import ended, short of a fatal error.
#[derive(Debug, Clone)]
pub enum ImportOutcome {
    Completed(ImportSummary),
    /// Stopped by the cancellation token; the summary covers the work done
    Cancelled(ImportSummary),
    /// Another import holds the gate
    Rejected,
}

impl ImportOutcome {
    pub fn summary(&self) -> Option<&ImportSummary> {
        match self {
            ImportOutcome::Completed(s) | ImportOutcome::Cancelled(s) => Some(s),
            ImportOutcome::Rejected => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Cancelled,
}

/// State carried between phases.
struct ImportRun {
    tenant: String,
    summary: ImportSummary,
    /// Stored grid id per segment and file coordinate, for markers
    grid_index: GridIndex,
    /// Zoom-0 coordinates written per map
    touched: BTreeMap<MapId, Vec<Coord>>,
    /// Grid ids already handled in this file
    seen_ids: HashSet<String>,
    /// Coordinates claimed by this import
    claimed: HashSet<(MapId, Coord)>,
    batch: PersistBatch,
    rendered: usize,
    total_grids: usize,
}

impl ImportRun {
    fn new(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            summary: ImportSummary {
                ledger: ImportLedger::new(tenant),
                ..ImportSummary::default()
            },
            grid_index: GridIndex::new(),
            touched: BTreeMap::new(),
            seen_ids: HashSet::new(),
            claimed: HashSet::new(),
            batch: PersistBatch::default(),
            rendered: 0,
            total_grids: 0,
        }
    }
}

struct RenderJob {
    grid: DecodedGrid,
    id: String,
    target: Coord,
}

struct RenderedGrid {
    id: String,
    file_coord: Coord,
    target: Coord,
    png: Vec<u8>,
    overlays: Vec<Overlay>,
}

fn render_job<T: TextureSource + ?Sized>(
    textures: &T,
    job: RenderJob,
) -> Result<RenderedGrid, ImportError> {
    let resolved = resolve_textures(&job.grid, textures);
    let image = render_grid(&job.grid, &resolved);
    let png = encode_png(&image).map_err(|e| ImportError::Image {
        grid_id: job.id.clone(),
        message: e.to_string(),
    })?;
    Ok(RenderedGrid {
        id: job.id,
        file_coord: job.grid.coord,
        target: job.target,
        png,
        overlays: job.grid.overlays,
    })
}

async fn write_png(path: PathBuf, png: Vec<u8>) -> Result<Option<u64>, ImportError> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || write_tile_file(&path, &png))
        .await
        .map_err(|e| ImportError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?
        .map_err(|e| ImportError::Io {
            path: display,
            message: e.to_string(),
        })
}

/// Imports `.hmap` exports into a tenant's maps.
///
/// One import runs at a time per [`ImportGate`]; a second caller gets
/// [`ImportOutcome::Rejected`] immediately.
pub struct ImportService<S, T, Q, M> {
    store: Arc<S>,
    textures: Arc<T>,
    quota: Arc<Q>,
    markers: Arc<M>,
    tile_root: PathBuf,
    gate: ImportGate,
    options: ImportOptions,
    pool: WorkerPool,
}

impl<S, T, Q, M> ImportService<S, T, Q, M>
where
    S: MapStore,
    T: TextureSource,
    Q: QuotaTracker,
    M: MarkerSink,
{
    pub fn new(
        store: Arc<S>,
        textures: Arc<T>,
        quota: Arc<Q>,
        markers: Arc<M>,
        tile_root: impl Into<PathBuf>,
    ) -> Self {
        let options = ImportOptions::default();
        Self {
            store,
            textures,
            quota,
            markers,
            tile_root: tile_root.into(),
            gate: ImportGate::global(),
            pool: WorkerPool::new(options.pool, "render"),
            options,
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.pool = WorkerPool::new(options.pool, "render");
        self.options = options;
        self
    }

    pub fn with_gate(mut self, gate: ImportGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn tile_root(&self) -> &Path {
        &self.tile_root
    }

    /// Imports one `.hmap` file for `tenant`.
    ///
    /// Returns `Rejected` without waiting when another import is running
    /// and `Cancelled` when `cancel` fires. On a fatal error the cleanup
    /// policy decides whether written data is removed before the error is
    /// returned.
    #[instrument(skip(self, data, cancel, progress), fields(bytes = data.len()))]
    pub async fn import(
        &self,
        tenant: &str,
        data: Vec<u8>,
        cancel: CancellationToken,
        progress: Option<ImportProgressCallback>,
    ) -> Result<ImportOutcome, ImportError> {
        let Some(_permit) = self.gate.try_acquire() else {
            info!(tenant, "Import already in progress, rejecting");
            return Ok(ImportOutcome::Rejected);
        };
        info!(tenant, "Import started");

        let reporter = Arc::new(ProgressReporter::new(progress));
        let mut run = ImportRun::new(tenant);
        let result = self.run(data, &cancel, &reporter, &mut run).await;
        run.summary.elapsed = reporter.elapsed();
        let mut summary = run.summary;

        match result {
            Ok(Flow::Continue) => {
                info!(
                    tenant,
                    grids_imported = summary.grids_imported,
                    grids_skipped = summary.grids_skipped,
                    grids_merged = summary.grids_merged,
                    maps_created = summary.maps_created,
                    markers = summary.markers_imported,
                    pyramid_tiles = summary.pyramid_tiles,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "Import completed"
                );
                Ok(ImportOutcome::Completed(summary))
            }
            Ok(Flow::Cancelled) => {
                warn!(
                    tenant,
                    grids_imported = summary.grids_imported,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "Import cancelled"
                );
                if self.options.cleanup.on_cancel() {
                    summary.cleanup = Some(self.cleanup(&summary.ledger).await);
                }
                Ok(ImportOutcome::Cancelled(summary))
            }
            Err(e) => {
                error!(
                    tenant,
                    error = %e,
                    grids_imported = summary.grids_imported,
                    maps_created = summary.maps_created,
                    "Import failed"
                );
                if self.options.cleanup.on_failure() {
                    self.cleanup(&summary.ledger).await;
                }
                Err(e)
            }
        }
    }

    /// Removes everything recorded in `ledger`, then recomposes the zoom
    /// levels of pre-existing maps that lost grids.
    pub async fn cleanup(&self, ledger: &ImportLedger) -> CleanupReport {
        let mut report = cleanup_import(
            self.store.as_ref(),
            self.quota.as_ref(),
            &self.tile_root,
            ledger,
        )
        .await;
        let builder = PyramidBuilder::new(
            Arc::clone(&self.store),
            Arc::clone(&self.quota),
            self.tile_root.clone(),
            self.options.pyramid,
        );
        restore_pyramids(&builder, ledger, &mut report).await;
        report
    }

    async fn run(
        &self,
        data: Vec<u8>,
        cancel: &CancellationToken,
        reporter: &Arc<ProgressReporter>,
        run: &mut ImportRun,
    ) -> Result<Flow, ImportError> {
        let (kept, markers) = self.decode_phase(data, reporter, run).await?;
        if cancel.is_cancelled() {
            return Ok(Flow::Cancelled);
        }

        self.prefetch_phase(&kept, reporter, run).await;
        if cancel.is_cancelled() {
            return Ok(Flow::Cancelled);
        }

        let kept_ids: HashSet<i64> = kept.iter().map(|s| s.id).collect();
        if self.render_phase(kept, cancel, reporter, run).await? == Flow::Cancelled {
            return Ok(Flow::Cancelled);
        }

        if self.pyramid_phase(cancel, reporter, run).await? == Flow::Cancelled {
            return Ok(Flow::Cancelled);
        }

        Ok(self
            .marker_phase(&markers, &kept_ids, cancel, reporter, run)
            .await)
    }

    #[instrument(skip_all)]
    async fn decode_phase(
        &self,
        data: Vec<u8>,
        reporter: &ProgressReporter,
        run: &mut ImportRun,
    ) -> Result<(Vec<Segment>, Vec<DecodedMarker>), ImportError> {
        reporter.report(ImportPhase::Decode, 0, 1, None);
        let file = tokio::task::spawn_blocking(move || hmap::decode(&data))
            .await
            .map_err(|e| StageError::TaskPanicked(e.to_string()))??;

        let (kept, discarded) = file.largest_segments(self.options.max_segments);
        run.summary.segments_imported = kept.len();
        run.summary.segments_discarded = discarded.len();
        run.summary.grids_discarded = discarded.iter().map(Segment::len).sum();
        run.total_grids = kept.iter().map(Segment::len).sum();

        info!(
            grids = file.stats.grids,
            markers = file.stats.markers,
            skipped_grids = file.stats.skipped_grids,
            unknown_records = file.stats.unknown_record_count(),
            segments = kept.len(),
            discarded = discarded.len(),
            "Map file decoded"
        );
        reporter.report(ImportPhase::Decode, 1, 1, None);
        Ok((kept, file.markers))
    }

    #[instrument(skip_all)]
    async fn prefetch_phase(
        &self,
        kept: &[Segment],
        reporter: &Arc<ProgressReporter>,
        run: &mut ImportRun,
    ) {
        let names: Vec<String> = kept
            .iter()
            .flat_map(|s| s.grids.iter())
            .flat_map(|g| g.tilesets.iter().map(|t| t.resource_name.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let sink = Arc::clone(reporter);
        let progress: PrefetchProgress = Arc::new(move |done: usize, total: usize, name: &str| {
            sink.report(ImportPhase::Prefetch, done, total, Some(name));
        });
        reporter.report(ImportPhase::Prefetch, 0, names.len(), None);
        run.summary.textures_loaded = self.textures.prefetch(&names, Some(progress)).await;
        reporter.report(ImportPhase::Prefetch, names.len(), names.len(), None);

        if let Some(err) = self.textures.first_network_error() {
            warn!(error = %err, "Some textures could not be fetched, affected tiles render gray");
        }
        info!(
            requested = names.len(),
            loaded = run.summary.textures_loaded,
            "Textures prefetched"
        );
    }

    #[instrument(skip_all)]
    async fn render_phase(
        &self,
        kept: Vec<Segment>,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
        run: &mut ImportRun,
    ) -> Result<Flow, ImportError> {
        let snapshot = ExistingGrids::from_records(self.store.grid_snapshot(&run.tenant).await?);
        let plan = resolve(&kept, &snapshot);
        run.summary.caves = plan.caves();
        run.summary.not_proximate = plan.not_proximate();

        let ids: Vec<String> = kept
            .iter()
            .flat_map(|s| s.grids.iter().map(DecodedGrid::id_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let stored_ids = self.store.existing_grid_ids(&run.tenant, &ids).await?;
        reporter.report(ImportPhase::Render, 0, run.total_grids, None);

        let mut flow = Flow::Continue;
        for segment in kept {
            let Some(decision) = plan.decision_for(segment.id) else {
                continue;
            };
            let result = self
                .import_segment(segment, decision, &snapshot, &stored_ids, cancel, reporter, run)
                .await;
            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Cancelled) => {
                    flow = Flow::Cancelled;
                    break;
                }
                Err(e) => {
                    // rows of files already written stay whole
                    if let Err(flush_err) = self.flush(run).await {
                        warn!(error = %flush_err, "Final flush after failure also failed");
                    }
                    return Err(e);
                }
            }
        }
        self.flush(run).await?;

        info!(
            imported = run.summary.grids_imported,
            skipped = run.summary.grids_skipped,
            merged = run.summary.grids_merged,
            maps_created = run.summary.maps_created,
            "Grids rendered"
        );
        Ok(flow)
    }

    #[allow(clippy::too_many_arguments)]
    async fn import_segment(
        &self,
        segment: Segment,
        decision: SegmentDecision,
        snapshot: &ExistingGrids,
        stored_ids: &HashSet<String>,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
        run: &mut ImportRun,
    ) -> Result<Flow, ImportError> {
        let segment_id = segment.id;
        let mut candidates = Vec::with_capacity(segment.len());
        for grid in segment.grids {
            let id = grid.id_string();
            if stored_ids.contains(&id) {
                run.grid_index.insert((segment_id, grid.coord), id);
                self.skip_grid(run, reporter);
            } else if !run.seen_ids.insert(id.clone()) {
                self.skip_grid(run, reporter);
            } else {
                candidates.push((grid, id));
            }
        }
        if candidates.is_empty() {
            debug!(segment = segment_id, "Segment has no new grids");
            return Ok(Flow::Continue);
        }

        let (map, offset, merged) = match decision {
            SegmentDecision::Merge { map, offset, .. } => (map, offset, true),
            SegmentDecision::NewMap { reason } => {
                let name = format!("Imported segment {}", segment_id);
                let info = self.store.create_map(&run.tenant, &name, 0).await?;
                info!(segment = segment_id, map = info.id, %reason, "Created map for segment");
                run.summary.ledger.created_maps.push(info.id);
                run.summary.maps_created += 1;
                (info.id, Coord::new(0, 0), false)
            }
        };

        let mut jobs = Vec::with_capacity(candidates.len());
        for (grid, id) in candidates {
            let target = grid.coord + offset;
            let occupied = merged && snapshot.is_occupied(map, target);
            if occupied || !run.claimed.insert((map, target)) {
                self.skip_grid(run, reporter);
                continue;
            }
            jobs.push(RenderJob { grid, id, target });
        }
        debug!(segment = segment_id, map, jobs = jobs.len(), "Rendering segment");

        let textures = Arc::clone(&self.textures);
        let mut stream = self.pool.spawn(jobs, cancel.clone(), move |job: RenderJob| {
            render_job(textures.as_ref(), job)
        });

        let mut failure = None;
        while let Some(result) = stream.next().await {
            let stored = match result {
                Ok(rendered) => self.store_grid(segment_id, map, merged, rendered, run).await,
                Err(e) => Err(e),
            };
            if let Err(e) = stored {
                failure = Some(e);
                break;
            }
            run.rendered += 1;
            reporter.report(ImportPhase::Render, run.rendered, run.total_grids, None);
            if run.batch.len() >= self.options.batch_size {
                if let Err(e) = self.flush(run).await {
                    failure = Some(e);
                    break;
                }
            }
        }
        let stream_report = stream.finish().await?;
        if stream_report.dropped > 0 {
            debug!(dropped = stream_report.dropped, "Dropped queued grid images");
        }
        if let Some(e) = failure {
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Ok(Flow::Cancelled);
        }
        Ok(Flow::Continue)
    }

    fn skip_grid(&self, run: &mut ImportRun, reporter: &ProgressReporter) {
        run.summary.grids_skipped += 1;
        run.rendered += 1;
        reporter.report(ImportPhase::Render, run.rendered, run.total_grids, None);
    }

    async fn store_grid(
        &self,
        segment_id: i64,
        map: MapId,
        merged: bool,
        grid: RenderedGrid,
        run: &mut ImportRun,
    ) -> Result<(), ImportError> {
        let tenant = run.tenant.clone();
        let key = TileKey::new(0, grid.target);
        let size = grid.png.len() as u64;
        let previous = write_png(tile_path(&self.tile_root, &tenant, map, &key), grid.png).await?;
        let delta = size as i64 - previous.unwrap_or(0) as i64;

        run.summary.ledger.grids.push((map, grid.target));
        run.batch.add_file(map, key, delta);
        run.batch.grids.push(GridRecord {
            id: grid.id.clone(),
            map,
            coord: grid.target,
            tenant: tenant.clone(),
            next_update: None,
        });
        run.batch.tiles.push(TileRecord {
            map,
            coord: grid.target,
            zoom: 0,
            file_path: tile_relative_path(&tenant, map, &key),
            cache_timestamp: Utc::now().timestamp_millis(),
            size_bytes: size,
            tenant: tenant.clone(),
        });
        for overlay in grid.overlays {
            match OverlayKind::from_resource(&overlay.resource_name) {
                Some(kind) => run.batch.overlays.push(OverlayRecord {
                    map,
                    coord: grid.target,
                    kind,
                    bitmap: overlay.bitmap,
                    tenant: tenant.clone(),
                }),
                None => debug!(resource = %overlay.resource_name, "Ignoring unknown overlay"),
            }
        }

        run.grid_index.insert((segment_id, grid.file_coord), grid.id);
        run.touched.entry(map).or_default().push(grid.target);
        run.summary.grids_imported += 1;
        if merged {
            run.summary.grids_merged += 1;
        }
        Ok(())
    }

    async fn flush(&self, run: &mut ImportRun) -> Result<(), ImportError> {
        let charges = run
            .batch
            .flush(self.store.as_ref(), self.quota.as_ref(), &run.tenant)
            .await?;
        for (map, key, bytes) in charges {
            run.summary.ledger.charge(map, key, bytes);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(maps = run.touched.len()))]
    async fn pyramid_phase(
        &self,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
        run: &mut ImportRun,
    ) -> Result<Flow, ImportError> {
        let builder = PyramidBuilder::new(
            Arc::clone(&self.store),
            Arc::clone(&self.quota),
            self.tile_root.clone(),
            self.options.pyramid,
        );
        let touched = std::mem::take(&mut run.touched);
        let total = touched.len();
        reporter.report(ImportPhase::Pyramid, 0, total, None);

        for (done, (map, coords)) in touched.into_iter().enumerate() {
            let mut report = PyramidReport::default();
            let result = builder
                .rebuild_into(&run.tenant, map, &coords, cancel, &mut report)
                .await;

            let ledger = &mut run.summary.ledger;
            ledger
                .pyramid_tiles
                .extend(report.created.iter().map(|key| (map, *key)));
            for (key, bytes) in &report.charged {
                ledger.charge(map, *key, *bytes);
            }
            run.summary.pyramid_tiles += report.tiles_written;
            result?;

            if report.cancelled {
                return Ok(Flow::Cancelled);
            }
            let name = map.to_string();
            reporter.report(ImportPhase::Pyramid, done + 1, total, Some(&name));
        }
        Ok(Flow::Continue)
    }

    #[instrument(skip_all, fields(markers = markers.len()))]
    async fn marker_phase(
        &self,
        markers: &[DecodedMarker],
        kept_segments: &HashSet<i64>,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
        run: &mut ImportRun,
    ) -> Flow {
        let plan = plan_markers(markers, kept_segments, &run.grid_index);
        reporter.report(ImportPhase::Markers, 0, plan.uploads.len(), None);
        let uploaded = upload_markers(
            self.markers.as_ref(),
            &run.tenant,
            plan.uploads,
            self.options.marker_batch_size,
            cancel,
            reporter,
        )
        .await;

        run.summary.markers_imported = uploaded.imported;
        run.summary.markers_skipped = plan.skipped + uploaded.skipped;
        info!(
            imported = uploaded.imported,
            skipped = run.summary.markers_skipped,
            "Markers uploaded"
        );
        if uploaded.cancelled {
            Flow::Cancelled
        } else {
            Flow::Continue
        }
    }
}
