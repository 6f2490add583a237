//! Import a map export into the tile store.
//!
//! Records are kept in memory for the lifetime of the process; the tile
//! images are written under the configured tile root.

use automapper::config::ConfigFile;
use automapper::import::{
    ImportOutcome, ImportProgress, ImportProgressCallback, ImportService, ImportSummary,
};
use automapper::logging::{init_logging, split_log_path, LoggingGuard};
use automapper::store::{MemoryMapStore, MemoryMarkerSink, MemoryQuota};
use automapper::texture::DirectoryTextureSource;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::read_input;
use crate::error::CliError;

/// Arguments of the `import` command.
#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    /// Map export (.hmap) to import
    pub file: PathBuf,

    /// Tenant that owns the imported maps
    #[arg(long)]
    pub tenant: String,

    /// Tileset texture directory (overrides config)
    #[arg(long)]
    pub textures: Option<PathBuf>,

    /// Directory tile images are written to (overrides config)
    #[arg(long)]
    pub tile_root: Option<PathBuf>,

    /// Also log to stdout
    #[arg(long, short)]
    pub verbose: bool,
}

fn start_logging(config: &ConfigFile, verbose: bool) -> Result<LoggingGuard, CliError> {
    let (dir, file) = split_log_path(&config.logging.file);
    init_logging(&dir, &file, verbose).map_err(|e| CliError::LoggingInit(e.to_string()))
}

fn print_progress(progress: ImportProgress) {
    println!(
        "[{}/{}] {:<22} {:>6}/{:<6} {:>5.1}%  {:.1}s",
        progress.phase_number,
        progress.phase_count,
        progress.phase.description(),
        progress.current,
        progress.total,
        progress.overall_percent,
        progress.elapsed_secs,
    );
}

fn print_summary(summary: &ImportSummary) {
    println!();
    println!("Grids imported:   {}", summary.grids_imported);
    println!("  merged:         {}", summary.grids_merged);
    println!("  skipped:        {}", summary.grids_skipped);
    println!("  discarded:      {}", summary.grids_discarded);
    println!("Maps created:     {}", summary.maps_created);
    println!(
        "Segments:         {} imported, {} discarded",
        summary.segments_imported, summary.segments_discarded
    );
    println!(
        "Markers:          {} imported, {} skipped",
        summary.markers_imported, summary.markers_skipped
    );
    println!("Zoom tiles:       {}", summary.pyramid_tiles);
    println!("Textures loaded:  {}", summary.textures_loaded);
    println!("Elapsed:          {:.1}s", summary.elapsed.as_secs_f64());
    if let Some(cleanup) = &summary.cleanup {
        println!(
            "Removed output:   {} maps, {} grids, {} tiles",
            cleanup.maps_deleted, cleanup.grids_deleted, cleanup.tiles_deleted
        );
    }
}

/// Runs the import command.
pub async fn run(args: ImportArgs, config: ConfigFile) -> Result<(), CliError> {
    let _logging = start_logging(&config, args.verbose)?;
    info!("automapper v{}", automapper::VERSION);

    let data = read_input(&args.file)?;
    let textures = args
        .textures
        .unwrap_or_else(|| config.textures.directory.clone());
    let tile_root = args
        .tile_root
        .unwrap_or_else(|| config.storage.tile_root.clone());
    info!(
        file = %args.file.display(),
        tenant = %args.tenant,
        textures = %textures.display(),
        tile_root = %tile_root.display(),
        "Starting import"
    );

    let service = ImportService::new(
        Arc::new(MemoryMapStore::new()),
        Arc::new(DirectoryTextureSource::new(textures)),
        Arc::new(MemoryQuota::new()),
        Arc::new(MemoryMarkerSink::new()),
        tile_root,
    )
    .with_options(config.import_options());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling import");
            on_signal.cancel();
        }
    });

    let progress: ImportProgressCallback = Arc::new(print_progress);
    match service
        .import(&args.tenant, data, cancel, Some(progress))
        .await?
    {
        ImportOutcome::Completed(summary) => {
            print_summary(&summary);
            Ok(())
        }
        ImportOutcome::Cancelled(summary) => {
            println!("Import cancelled.");
            print_summary(&summary);
            Ok(())
        }
        ImportOutcome::Rejected => Err(CliError::Rejected),
    }
}
