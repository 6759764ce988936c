//! Bounded pool executing one task per batch
//!
//! Each operation builds its own multi-threaded tokio runtime sized to the worker count. Blocking
//! filesystem calls issued through `tokio::fs` run on the runtime's blocking pool, which is capped
//! at the same size, so at most `workers` filesystem calls are in flight at any time. Every thread
//! of the pool runs below normal scheduling priority.

use anyhow::Context;
use std::future::Future;
use tracing::instrument;

use crate::partition::Batch;
use crate::progress::{CounterSlot, ProgressMonitor};

/// niceness applied to pool threads, 0 is normal and 19 the lowest priority
#[cfg(target_os = "linux")]
const BELOW_NORMAL_NICE: libc::c_int = 10;

/// Outcome of one batch
#[derive(Debug)]
pub struct BatchReport {
    pub worker: usize,
    /// items completed successfully
    pub processed: usize,
    /// items left alone as configuration anomalies
    pub skipped: usize,
    pub errors: Vec<anyhow::Error>,
}

impl BatchReport {
    pub fn new(worker: usize) -> Self {
        Self {
            worker,
            processed: 0,
            skipped: 0,
            errors: vec![],
        }
    }

    pub fn failed(worker: usize, error: anyhow::Error) -> Self {
        Self {
            errors: vec![error],
            ..Self::new(worker)
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Account for one item. Returns false when the batch must stop.
    pub fn record(&mut self, result: anyhow::Result<()>, fail_early: bool) -> bool {
        match result {
            Ok(()) => {
                self.processed += 1;
                true
            }
            Err(error) => {
                tracing::error!("worker {}: {:#}", self.worker, &error);
                self.errors.push(error);
                !fail_early
            }
        }
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }
}

fn lower_thread_priority() {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: setpriority only reads its integer arguments; on Linux `who == 0` with
        // PRIO_PROCESS targets the calling thread
        let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, BELOW_NORMAL_NICE) };
        if result != 0 {
            tracing::debug!(
                "failed lowering worker thread priority: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

pub struct WorkerPool {
    runtime: tokio::runtime::Runtime,
    workers: usize,
    pending: Vec<(usize, tokio::task::JoinHandle<BatchReport>)>,
}

impl WorkerPool {
    /// Build a pool of `workers` threads, zero is treated as one
    pub fn new(workers: usize) -> anyhow::Result<Self> {
        let workers = workers.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("tree-worker")
            .on_thread_start(lower_thread_priority)
            .enable_all()
            .build()
            .context("failed to start the worker pool")?;
        tracing::debug!("started worker pool with {} workers", workers);
        Ok(Self {
            runtime,
            workers,
            pending: vec![],
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Submit every batch as an independent task. Batch `i` receives counter slot `i`.
    pub fn run_all<F, Fut>(&mut self, batches: Vec<Batch>, slots: Vec<CounterSlot>, mut action: F)
    where
        F: FnMut(Batch, CounterSlot) -> Fut,
        Fut: Future<Output = BatchReport> + Send + 'static,
    {
        debug_assert_eq!(batches.len(), slots.len());
        for (batch, slot) in batches.into_iter().zip(slots) {
            debug_assert_eq!(batch.worker, slot.worker());
            tracing::trace!("dispatching batch {:?}", &batch);
            let handle = self.runtime.spawn(action(batch, slot));
            self.pending.push((batch.worker, handle));
        }
    }

    /// Block until every submitted batch finished, then shut the pool down.
    ///
    /// Returns one report per batch, in submission order. A batch that panicked is reported as
    /// failed.
    #[instrument(skip(self, monitor))]
    pub fn await_idle(self, monitor: Option<ProgressMonitor>) -> Vec<BatchReport> {
        let WorkerPool {
            runtime, pending, ..
        } = self;
        let join_all = async move {
            let mut reports = Vec::with_capacity(pending.len());
            for (worker, handle) in pending {
                match handle.await {
                    Ok(report) => reports.push(report),
                    Err(error) => {
                        let error = anyhow::Error::new(error)
                            .context(format!("worker {} terminated abnormally", worker));
                        tracing::error!("{:#}", &error);
                        reports.push(BatchReport::failed(worker, error));
                    }
                }
            }
            reports
        };
        runtime.block_on(async move {
            let Some(mut monitor) = monitor else {
                return join_all.await;
            };
            tokio::pin!(join_all);
            let mut interval = tokio::time::interval(monitor.delay());
            // the first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    reports = &mut join_all => {
                        monitor.finish();
                        break reports;
                    }
                    _ = interval.tick() => monitor.update(),
                }
            }
        })
    }
}
