//! Bounded producer/consumer worker pool.
//!
//! ```text
//! items ─▶ producer ─▶ batch of ≤ max_in_flight tasks
//!                          │  (≤ workers on the blocking pool at once)
//!                          ▼
//!                 mpsc(queue_capacity) ─▶ single consumer (WorkStream)
//! ```
//!
//! A full queue blocks workers after their permit is released, so a slow
//! consumer throttles rendering without starving the limiter.

use super::concurrency_limiter::{ConcurrencyLimiter, DEFAULT_WORKERS};
use super::error::StageError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default cap on tasks spawned per batch.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 100;

/// Default capacity of the result queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Work items running on the blocking pool at once
    pub workers: usize,
    /// Tasks spawned per batch before awaiting the batch
    pub max_in_flight: usize,
    /// Finished results buffered for the consumer
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Runs blocking work items with bounded concurrency.
#[derive(Debug)]
pub struct WorkerPool {
    limiter: Arc<ConcurrencyLimiter>,
    config: PoolConfig,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, label: &str) -> Self {
        Self {
            limiter: Arc::new(ConcurrencyLimiter::new(config.workers, label)),
            config,
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Limiter shared by every stream of this pool.
    pub fn limiter(&self) -> &Arc<ConcurrencyLimiter> {
        &self.limiter
    }

    /// Starts running `work` over `items` and returns the result stream.
    ///
    /// Results arrive in completion order. Cancelling `cancel` stops new
    /// items from starting; the stream then yields `None`.
    pub fn spawn<I, T, E, W>(
        &self,
        items: Vec<I>,
        cancel: CancellationToken,
        work: W,
    ) -> WorkStream<T, E>
    where
        I: Send + 'static,
        T: Send + 'static,
        E: From<StageError> + Send + 'static,
        W: Fn(I) -> Result<T, E> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let limiter = Arc::clone(&self.limiter);
        let batch_size = self.config.max_in_flight.max(1);
        let work = Arc::new(work);
        let producer_cancel = cancel.clone();
        let total = items.len();

        let producer = tokio::spawn(async move {
            let cancel = producer_cancel;
            let mut items = items.into_iter();
            let mut dispatched = 0usize;

            while !cancel.is_cancelled() && !tx.is_closed() {
                let batch: Vec<I> = items.by_ref().take(batch_size).collect();
                if batch.is_empty() {
                    break;
                }

                let mut tasks = JoinSet::new();
                for item in batch {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let tx = tx.clone();
                    let limiter = Arc::clone(&limiter);
                    let work = Arc::clone(&work);
                    let cancel = cancel.clone();
                    tasks.spawn(async move {
                        let result = match limiter.acquire().await {
                            Ok(_permit) => {
                                if cancel.is_cancelled() {
                                    return;
                                }
                                match tokio::task::spawn_blocking(move || (*work)(item)).await {
                                    Ok(result) => result,
                                    Err(e) => Err(E::from(StageError::TaskPanicked(e.to_string()))),
                                }
                            }
                            Err(e) => Err(E::from(e)),
                        };
                        // a closed queue means the consumer is gone
                        let _ = tx.send(result).await;
                    });
                    dispatched += 1;
                }

                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        warn!(error = %e, "Worker task failed");
                    }
                }
            }

            debug!(dispatched, total, "Producer finished");
            dispatched
        });

        WorkStream {
            rx,
            producer: Some(producer),
            cancel,
            received: 0,
        }
    }
}

/// Consumer side of [`WorkerPool::spawn`].
pub struct WorkStream<T, E> {
    rx: mpsc::Receiver<Result<T, E>>,
    producer: Option<JoinHandle<usize>>,
    cancel: CancellationToken,
    received: usize,
}

/// Counters reported when a stream is finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    /// Work items started
    pub dispatched: usize,
    /// Results handed to the consumer
    pub received: usize,
    /// Results discarded by [`WorkStream::finish`]
    pub dropped: usize,
}

impl<T, E> WorkStream<T, E> {
    /// Returns the next result, or `None` when all work is done or the
    /// stream was cancelled.
    pub async fn next(&mut self) -> Option<Result<T, E>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let item = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        };
        if item.is_some() {
            self.received += 1;
        }
        item
    }

    /// Stops the stream, drops every queued result and waits for the
    /// producer to wind down.
    pub async fn finish(mut self) -> Result<StreamReport, StageError> {
        self.rx.close();
        let mut dropped = 0;
        while self.rx.recv().await.is_some() {
            dropped += 1;
        }
        let dispatched = match self.producer.take() {
            Some(handle) => handle
                .await
                .map_err(|e| StageError::ProducerFailed(e.to_string()))?,
            None => 0,
        };
        if dropped > 0 {
            debug!(dropped, "Discarded queued results");
        }
        Ok(StreamReport {
            dispatched,
            received: self.received,
            dropped,
        })
    }
}
