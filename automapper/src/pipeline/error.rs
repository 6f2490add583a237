//! Error types for the worker pool.

use thiserror::Error;

/// Failures of the pool machinery itself, as opposed to the work it runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    /// A work item panicked on the blocking pool
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// The producer task failed before finishing
    #[error("producer failed: {0}")]
    ProducerFailed(String),

    /// The worker limiter was closed
    #[error("worker limiter closed")]
    LimiterClosed,
}
