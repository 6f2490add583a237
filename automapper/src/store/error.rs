//! Collaborator error types.

use thiserror::Error;

/// Errors reported by the record store and the other external collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A batch write failed
    #[error("batch write failed: {0}")]
    WriteFailed(String),

    /// A read failed
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// A referenced map does not exist
    #[error("map {0} not found")]
    MapNotFound(i64),

    /// The collaborator is unavailable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
