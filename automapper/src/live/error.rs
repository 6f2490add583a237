//! Live reconciliation errors.

use crate::pyramid::PyramidError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveError {
    /// The window is not square or is empty
    #[error("malformed grid window: {0}")]
    MalformedWindow(String),

    #[error("unknown grid {0}")]
    UnknownGrid(String),

    /// The uploaded image is not a 100×100 PNG
    #[error("invalid image for grid {grid_id}: {message}")]
    InvalidImage { grid_id: String, message: String },

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("failed to access {path}: {message}")]
    Io { path: String, message: String },

    #[error("pyramid rebuild failed: {0}")]
    Pyramid(#[from] PyramidError),
}
