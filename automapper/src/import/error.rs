//! Import error types.

use crate::hmap::FormatError;
use crate::pipeline::StageError;
use crate::pyramid::PyramidError;
use crate::store::StoreError;
use thiserror::Error;

/// Fatal import failures.
///
/// Rejection and cancellation are outcomes, not errors; see
/// [`ImportOutcome`](super::ImportOutcome).
#[derive(Debug, Error)]
pub enum ImportError {
    /// The file is not a readable `.hmap` export
    #[error("invalid map file: {0}")]
    Format(#[from] FormatError),

    /// A record store or quota call failed
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    /// A tile file could not be written
    #[error("failed to write {path}: {message}")]
    Io { path: String, message: String },

    /// Worker pool failure
    #[error("render pipeline failed: {0}")]
    Stage(#[from] StageError),

    /// Zoom level construction failed
    #[error("pyramid build failed: {0}")]
    Pyramid(#[from] PyramidError),

    /// A rendered grid could not be encoded
    #[error("failed to encode grid {grid_id}: {message}")]
    Image { grid_id: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_converts() {
        let err: ImportError = FormatError::BadSignature.into();
        assert!(matches!(err, ImportError::Format(FormatError::BadSignature)));
        assert!(err.to_string().starts_with("invalid map file"));
    }

    #[test]
    fn test_store_error_converts() {
        let err: ImportError = StoreError::WriteFailed("disk full".into()).into();
        assert_eq!(err.to_string(), "persistence failed: batch write failed: disk full");
    }
}
