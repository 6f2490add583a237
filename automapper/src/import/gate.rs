//! Single-flight gate for imports.

use std::sync::{Arc, OnceLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

static GLOBAL_GATE: OnceLock<Arc<Semaphore>> = OnceLock::new();

/// Admits one import at a time and rejects the rest without waiting.
#[derive(Debug, Clone)]
pub struct ImportGate {
    semaphore: Arc<Semaphore>,
}

impl ImportGate {
    /// The process-wide gate shared by every tenant.
    pub fn global() -> Self {
        Self {
            semaphore: Arc::clone(GLOBAL_GATE.get_or_init(|| Arc::new(Semaphore::new(1)))),
        }
    }

    /// A gate independent of the process-wide one.
    pub fn isolated() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Claims the gate if it is free.
    ///
    /// Never waits; `None` means another import holds it.
    pub fn try_acquire(&self) -> Option<ImportPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        Some(ImportPermit { _permit: permit })
    }

    pub fn is_busy(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for ImportGate {
    fn default() -> Self {
        Self::global()
    }
}

/// Held for the duration of an import; releases the gate on drop.
#[derive(Debug)]
pub struct ImportPermit {
    _permit: OwnedSemaphorePermit,
}
