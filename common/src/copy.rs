use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

use crate::operation::{self, Error, OperationDetails, Settings, Summary};
use crate::partition::{self, Batch};
use crate::pool::{BatchReport, WorkerPool};
use crate::preserve;
use crate::progress::CounterSlot;
use crate::scan::ScanSettings;

/// Read-only state shared by all copy workers
#[derive(Debug)]
struct CopyJob {
    files: Arc<[PathBuf]>,
    source: PathBuf,
    destination: PathBuf,
    fail_early: bool,
}

/// Replicate the tree below `src` into `dst`.
///
/// Directories are created up front, then files are copied by the worker pool, one batch per
/// worker. Existing destination files are overwritten.
#[instrument(skip(settings))]
pub fn perform_copy(src: &Path, dst: &Path, settings: &Settings) -> Result<Summary, Error> {
    let started = std::time::Instant::now();
    let (details, slots) = OperationDetails::prepare(src, settings, &ScanSettings::default())?;
    let skipped = create_directories(&details.directories, &details.source, dst)
        .map_err(|source| Error::Setup { source })?;
    let mut pool = WorkerPool::new(details.workers()).map_err(|source| Error::Setup { source })?;
    let monitor = details.progress_monitor(settings.progress.as_ref())?;
    let batches = partition::partition(details.files.len(), pool.workers());
    tracing::debug!(
        "copying {} files in {} batches",
        details.files.len(),
        batches.len()
    );
    let job = Arc::new(CopyJob {
        files: details.files.clone(),
        source: details.source.clone(),
        destination: dst.to_path_buf(),
        fail_early: settings.fail_early,
    });
    pool.run_all(batches, slots, |batch, slot| copy_batch(job.clone(), batch, slot));
    let reports = pool.await_idle(monitor);
    details.conclude(started, reports, skipped, vec![])
}

/// Create `dst` and the counterpart of every scanned directory. Returns the number of
/// directories skipped because their destination could not be derived.
fn create_directories(directories: &[PathBuf], src: &Path, dst: &Path) -> anyhow::Result<usize> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("cannot create destination directory {:?}", dst))?;
    let mut skipped = 0;
    for dir in directories {
        let Some(target) = operation::rebase(dir, src, dst) else {
            tracing::warn!("cannot derive a destination for directory {:?}, skipping", dir);
            skipped += 1;
            continue;
        };
        // shuffled order may visit a child before its parent
        std::fs::create_dir_all(&target)
            .with_context(|| format!("cannot create directory {:?}", &target))?;
    }
    tracing::debug!("created {} directories", directories.len() - skipped);
    Ok(skipped)
}

async fn copy_batch(job: Arc<CopyJob>, batch: Batch, slot: CounterSlot) -> BatchReport {
    let mut report = BatchReport::new(batch.worker);
    for src in &job.files[batch.range()] {
        let Some(dst) = operation::rebase(src, &job.source, &job.destination) else {
            tracing::warn!("cannot derive a destination for {:?}, skipping", src);
            report.skip();
            continue;
        };
        if !report.record(copy_file(src, &dst, &slot).await, job.fail_early) {
            tracing::debug!("worker {} stops after its first failure", batch.worker);
            break;
        }
    }
    report
}

#[instrument(skip(slot))]
async fn copy_file(src: &Path, dst: &Path, slot: &CounterSlot) -> anyhow::Result<()> {
    let metadata = tokio::fs::metadata(src)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &src))?;
    slot.add(metadata.len());
    tokio::fs::copy(src, dst)
        .await
        .with_context(|| format!("failed copying {:?} to {:?}", &src, &dst))?;
    preserve::set_file_times(&metadata, dst).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::filter::ExclusionSettings;
    use crate::testutils;
    use tracing_test::traced_test;

    fn settings(workers: usize) -> Settings {
        Settings {
            runtime: RuntimeConfig {
                max_workers: workers,
                worker_multiplier: 1.0,
            },
            ..Default::default()
        }
    }

    #[test]
    #[traced_test]
    fn check_basic_copy() -> anyhow::Result<()> {
        let tmp_dir = testutils::setup_test_tree()?;
        let src = tmp_dir.path().join("foo");
        let dst = tmp_dir.path().join("copy");
        let summary = perform_copy(&src, &dst, &settings(3))?;
        testutils::check_dirs_identical(&src, &dst)?;
        assert_eq!(summary.files, 6);
        assert_eq!(summary.directories, 3);
        assert_eq!(summary.total_bytes, testutils::TEST_TREE_BYTES);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 0);
        Ok(())
    }

    #[test]
    #[traced_test]
    fn copy_is_idempotent() -> anyhow::Result<()> {
        let tmp_dir = testutils::setup_test_tree()?;
        let src = tmp_dir.path().join("foo");
        let dst = tmp_dir.path().join("copy");
        perform_copy(&src, &dst, &settings(2))?;
        let summary = perform_copy(&src, &dst, &settings(2))?;
        testutils::check_dirs_identical(&src, &dst)?;
        assert_eq!(summary.files, 6);
        assert_eq!(std::fs::read_dir(&dst)?.count(), 3);
        Ok(())
    }

    #[test]
    #[traced_test]
    fn existing_files_are_overwritten() -> anyhow::Result<()> {
        let tmp_dir = testutils::setup_test_tree()?;
        let src = tmp_dir.path().join("foo");
        let dst = tmp_dir.path().join("copy");
        std::fs::create_dir_all(dst.join("bar"))?;
        std::fs::write(dst.join("bar").join("1.txt"), "stale and longer")?;
        std::fs::write(dst.join("extra.txt"), "extra")?;
        perform_copy(&src, &dst, &settings(2))?;
        assert_eq!(std::fs::read_to_string(dst.join("bar").join("1.txt"))?, "1");
        // nothing is removed from the destination
        assert!(dst.join("extra.txt").exists());
        Ok(())
    }

    #[test]
    #[traced_test]
    fn copy_onto_itself_skips_everything() -> anyhow::Result<()> {
        let tmp_dir = testutils::setup_test_tree()?;
        let src = tmp_dir.path().join("foo");
        let pristine = tmp_dir.path().join("pristine");
        perform_copy(&src, &pristine, &settings(2))?;
        let summary = perform_copy(&src, &src, &settings(2))?;
        assert_eq!(summary.files, 0);
        assert_eq!(summary.skipped, 6 + 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total_bytes, 0);
        testutils::check_dirs_identical(&pristine, &src)?;
        assert!(logs_contain("cannot derive a destination"));
        Ok(())
    }

    #[test]
    #[traced_test]
    fn three_files_two_workers() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let src = tmp_dir.path().join("src");
        std::fs::create_dir_all(src.join("sub"))?;
        std::fs::write(src.join("a.bin"), vec![1u8; 10])?;
        std::fs::write(src.join("b.bin"), vec![2u8; 20])?;
        std::fs::write(src.join("sub").join("c.bin"), vec![3u8; 30])?;
        let dst = tmp_dir.path().join("dst");
        let summary = perform_copy(&src, &dst, &settings(2))?;
        assert_eq!(summary.total_bytes, 60);
        assert_eq!(summary.files, 3);
        assert_eq!(summary.directories, 1);
        assert_eq!(std::fs::read(dst.join("sub").join("c.bin"))?, vec![3u8; 30]);
        Ok(())
    }

    #[test]
    #[traced_test]
    fn excluded_entries_are_not_copied() -> anyhow::Result<()> {
        let tmp_dir = testutils::setup_test_tree()?;
        let src = tmp_dir.path().join("foo");
        let dst = tmp_dir.path().join("copy");
        let mut exclusions = ExclusionSettings::new();
        exclusions.add_file_exclude("*.tmp")?;
        exclusions.add_dir_exclude("*/bar")?;
        let settings = Settings {
            exclusions,
            ..settings(2)
        };
        let summary = perform_copy(&src, &dst, &settings)?;
        assert_eq!(summary.files, 2);
        assert_eq!(summary.total_bytes, 1 + 4);
        assert!(dst.join("0.txt").exists());
        assert!(dst.join("baz").join("4.txt").exists());
        assert!(dst.join("baz").join("qux").is_dir());
        assert!(!dst.join("baz").join("qux").join("5.tmp").exists());
        assert!(!dst.join("bar").exists());
        Ok(())
    }

    #[test]
    #[traced_test]
    fn randomized_copy() -> anyhow::Result<()> {
        let tmp_dir = testutils::setup_test_tree()?;
        let src = tmp_dir.path().join("foo");
        let dst = tmp_dir.path().join("copy");
        let settings = Settings {
            randomize: true,
            ..settings(4)
        };
        let summary = perform_copy(&src, &dst, &settings)?;
        testutils::check_dirs_identical(&src, &dst)?;
        assert_eq!(summary.total_bytes, testutils::TEST_TREE_BYTES);
        Ok(())
    }

    #[test]
    #[traced_test]
    fn timestamps_are_preserved() -> anyhow::Result<()> {
        let tmp_dir = testutils::setup_test_tree()?;
        let src = tmp_dir.path().join("foo");
        let dst = tmp_dir.path().join("copy");
        let past = filetime::FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_times(src.join("0.txt"), past, past)?;
        perform_copy(&src, &dst, &settings(1))?;
        let metadata = std::fs::metadata(dst.join("0.txt"))?;
        assert_eq!(filetime::FileTime::from_last_modification_time(&metadata), past);
        Ok(())
    }

    #[test]
    #[traced_test]
    fn missing_source_does_nothing() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let dst = tmp_dir.path().join("copy");
        let error = perform_copy(&tmp_dir.path().join("missing"), &dst, &settings(2)).unwrap_err();
        assert!(error.is_no_work());
        assert!(!dst.exists());
        Ok(())
    }

    #[test]
    #[traced_test]
    fn failures_do_not_stop_the_batch() -> anyhow::Result<()> {
        let tmp_dir = testutils::setup_test_tree()?;
        let src = tmp_dir.path().join("foo");
        let dst = tmp_dir.path().join("copy");
        // a non-empty directory where a file should go cannot be overwritten
        std::fs::create_dir_all(dst.join("0.txt").join("blocker"))?;
        let error = perform_copy(&src, &dst, &settings(1)).unwrap_err();
        let summary = error.summary().copied().unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.files, 5);
        assert!(format!("{:#}", error).contains("failed copying"));
        assert_eq!(std::fs::read_to_string(dst.join("bar").join("3.txt"))?, "333");
        Ok(())
    }

    #[test]
    #[traced_test]
    fn fail_early_stops_the_batch() -> anyhow::Result<()> {
        let tmp_dir = testutils::setup_test_tree()?;
        let src = tmp_dir.path().join("foo");
        let dst = tmp_dir.path().join("copy");
        std::fs::create_dir_all(dst.join("0.txt").join("blocker"))?;
        let settings = Settings {
            fail_early: true,
            ..settings(1)
        };
        // one worker, 0.txt is the first file of its batch
        let error = perform_copy(&src, &dst, &settings).unwrap_err();
        let summary = error.summary().copied().unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.files, 0);
        assert!(!dst.join("bar").join("1.txt").exists());
        Ok(())
    }
}
