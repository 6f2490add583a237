//! Pyramid build errors.

use crate::pipeline::StageError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PyramidError {
    /// Record store write failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Worker pool failure
    #[error("worker pool error: {0}")]
    Stage(#[from] StageError),

    /// Tile file could not be written
    #[error("failed to write {path}: {message}")]
    Io { path: String, message: String },

    /// PNG encoding failed
    #[error("failed to encode tile {key}: {message}")]
    Encode { key: String, message: String },
}
