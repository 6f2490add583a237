//! `.hmap` import orchestration.
//!
//! An import runs five phases:
//!
//! 1. decode the file on the blocking pool and keep the largest segments
//! 2. prefetch every referenced texture
//! 3. resolve merge decisions, render grids through the worker pool and
//!    persist them in batches
//! 4. rebuild zoom levels 1-6 of every touched map
//! 5. upload markers
//!
//! Everything written is recorded in an [`ImportLedger`] so a failed or
//! cancelled import can be removed again with [`cleanup_import`].

mod batch;
mod cleanup;
mod error;
mod gate;
mod ledger;
mod markers;
mod progress;
mod service;

pub use cleanup::{cleanup_import, restore_pyramids, CleanupReport};
pub use error::ImportError;
pub use gate::{ImportGate, ImportPermit};
pub use ledger::ImportLedger;
pub use markers::DEFAULT_MARKER_BATCH_SIZE;
pub use progress::{
    ImportPhase, ImportProgress, ImportProgressCallback, ProgressReporter, PROGRESS_INTERVAL,
};
pub use service::{
    CleanupPolicy, ImportOptions, ImportOutcome, ImportService, ImportSummary,
    DEFAULT_IMPORT_BATCH_SIZE, DEFAULT_MAX_SEGMENTS,
};
