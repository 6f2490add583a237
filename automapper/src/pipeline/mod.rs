//! Bounded worker pool shared by import rendering and pyramid composition.
//!
//! # Key Components
//!
//! - [`ConcurrencyLimiter`] - semaphore capping blocking work (4 by default)
//! - [`WorkerPool`] - batches work items, runs them on the blocking pool and
//!   queues results into a bounded channel
//! - [`WorkStream`] - the single consumer; drains and drops queued results
//!   on cancellation
//!
//! # Example
//!
//! ```ignore
//! use automapper::pipeline::{PoolConfig, WorkerPool};
//!
//! let pool = WorkerPool::new(PoolConfig::default(), "render");
//! let mut stream = pool.spawn(grids, cancel.clone(), move |grid| render(grid));
//! while let Some(result) = stream.next().await {
//!     write(result?)?;
//! }
//! let report = stream.finish().await?;
//! ```

mod concurrency_limiter;
mod error;
mod pool;

pub use concurrency_limiter::{ConcurrencyLimiter, ConcurrencyPermit, DEFAULT_WORKERS};
pub use error::StageError;
pub use pool::{
    PoolConfig, StreamReport, WorkStream, WorkerPool, DEFAULT_MAX_IN_FLIGHT,
    DEFAULT_QUEUE_CAPACITY,
};
