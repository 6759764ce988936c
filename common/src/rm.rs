use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

use crate::operation::{Error, OperationDetails, Settings, Summary};
use crate::partition::{self, Batch};
use crate::pool::{BatchReport, WorkerPool};
use crate::progress::CounterSlot;
use crate::scan::ScanSettings;

#[derive(Debug)]
struct DeleteJob {
    files: Arc<[PathBuf]>,
    fail_early: bool,
}

/// Remove `path` and everything below it.
///
/// Scanned files are removed by the worker pool; whatever is left afterwards (excluded entries,
/// directories) is swept away before the root itself is removed. The sweep only runs when every
/// batch succeeded.
#[instrument(skip(settings))]
pub fn perform_delete(path: &Path, settings: &Settings) -> Result<Summary, Error> {
    let started = std::time::Instant::now();
    // never walk out of the tree through a symlink when deleting
    let scan_settings = ScanSettings {
        follow_symlinks: false,
        ..Default::default()
    };
    let (details, slots) = OperationDetails::prepare(path, settings, &scan_settings)?;
    let mut pool = WorkerPool::new(details.workers()).map_err(|source| Error::Setup { source })?;
    let monitor = details.progress_monitor(settings.progress.as_ref())?;
    let batches = partition::partition(details.files.len(), pool.workers());
    tracing::debug!(
        "removing {} files in {} batches",
        details.files.len(),
        batches.len()
    );
    let job = Arc::new(DeleteJob {
        files: details.files.clone(),
        fail_early: settings.fail_early,
    });
    pool.run_all(batches, slots, |batch, slot| delete_batch(job.clone(), batch, slot));
    let reports = pool.await_idle(monitor);
    let mut sweep_errors = vec![];
    if reports.iter().all(BatchReport::is_success) {
        if let Err(error) = sweep(path) {
            tracing::error!("{:#}", &error);
            sweep_errors.push(error);
        }
    } else {
        tracing::warn!("not all files were removed, leaving {:?} in place", path);
    }
    details.conclude(started, reports, 0, sweep_errors)
}

async fn delete_batch(job: Arc<DeleteJob>, batch: Batch, slot: CounterSlot) -> BatchReport {
    let mut report = BatchReport::new(batch.worker);
    for path in &job.files[batch.range()] {
        if !report.record(delete_file(path, &slot).await, job.fail_early) {
            tracing::debug!("worker {} stops after its first failure", batch.worker);
            break;
        }
    }
    report
}

#[instrument(skip(slot))]
async fn delete_file(path: &Path, slot: &CounterSlot) -> anyhow::Result<()> {
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &path))?;
    slot.add(metadata.len());
    tokio::fs::remove_file(path)
        .await
        .with_context(|| format!("failed removing {:?}", &path))
}

/// Remove every remaining child of `root`, then `root` itself
fn sweep(root: &Path) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("cannot open directory {:?} for reading", root))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed traversing directory {:?}", root))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed reading file type of {:?}", &path))?;
        if file_type.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        }
        .with_context(|| format!("failed removing {:?}", &path))?;
    }
    std::fs::remove_dir(root).with_context(|| format!("failed removing directory {:?}", root))
}
