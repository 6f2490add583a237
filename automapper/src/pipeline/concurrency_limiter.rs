//! Cap on blocking render and compose work.
//!
//! Grid rendering and quadrant composition both run on the blocking
//! thread pool. Each job holds a [`ConcurrencyPermit`] while it runs, so
//! at most `workers` images are being built at once no matter how many
//! jobs are queued.

use super::error::StageError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Default)]
struct Usage {
    current: usize,
    peak: usize,
}

/// Semaphore with in-flight accounting.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    usage: Arc<Mutex<Usage>>,
    /// Pool name used in logs ("render", "compose")
    label: String,
}

impl ConcurrencyLimiter {
    /// Creates a limiter admitting `workers` jobs; zero is raised to one.
    pub fn new(workers: usize, label: impl Into<String>) -> Self {
        let capacity = workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            usage: Arc::new(Mutex::new(Usage::default())),
            label: label.into(),
        }
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> Result<ConcurrencyPermit, StageError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| StageError::LimiterClosed)?;
        {
            let mut usage = self.usage.lock();
            usage.current += 1;
            usage.peak = usage.peak.max(usage.current);
        }
        Ok(ConcurrencyPermit {
            _permit: permit,
            usage: Arc::clone(&self.usage),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.usage.lock().current
    }

    /// Most jobs seen running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.usage.lock().peak
    }

    /// Fails every pending and later [`acquire`](Self::acquire).
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// A running job's slot; dropping it frees the slot.
pub struct ConcurrencyPermit {
    _permit: OwnedSemaphorePermit,
    usage: Arc<Mutex<Usage>>,
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        self.usage.lock().current -= 1;
    }
}
