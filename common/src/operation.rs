//! State and results shared by the copy and delete operations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

use crate::config::{ProgressSettings, RuntimeConfig};
use crate::filter::ExclusionSettings;
use crate::pool::BatchReport;
use crate::progress::{CounterSlot, ProgressMonitor, WorkerCounters};
use crate::scan::{self, ScanResult, ScanSettings};
use crate::shuffle;

/// Error type for copy and delete operations.
///
/// Failures that happen after workers were dispatched carry the statistics gathered so far.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path:?} does not exist or is not a directory, no work performed")]
    RootNotFound { path: PathBuf },
    #[error("scan failed: {source:#}")]
    Scan {
        #[source]
        source: anyhow::Error,
    },
    #[error("{source:#}")]
    Setup {
        #[source]
        source: anyhow::Error,
    },
    #[error("{source:#}")]
    Batch {
        #[source]
        source: anyhow::Error,
        summary: Summary,
    },
}

impl Error {
    /// True when the operation was refused before doing anything
    pub fn is_no_work(&self) -> bool {
        matches!(self, Error::RootNotFound { .. })
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            Error::Batch { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub exclusions: ExclusionSettings,
    /// shuffle files and directories before partitioning
    pub randomize: bool,
    /// stop a worker's batch at its first failing item
    pub fail_early: bool,
    pub runtime: RuntimeConfig,
    pub progress: Option<ProgressSettings>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Summary {
    pub elapsed: std::time::Duration,
    pub files: usize,
    pub directories: usize,
    pub total_bytes: u64,
    /// entries left alone because their destination could not be derived
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    /// Bytes per second over the elapsed whole seconds, floored at one second
    pub fn throughput(&self) -> u64 {
        self.total_bytes / self.elapsed.as_secs().max(1)
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // round to milliseconds, the nanoseconds are noise
        let elapsed = std::time::Duration::from_millis(self.elapsed.as_millis() as u64);
        write!(
            f,
            "files: {}\n\
            directories: {}\n\
            total bytes: {}\n\
            skipped: {}\n\
            failed: {}\n\
            elapsed: {}\n\
            throughput: {}/s",
            self.files,
            self.directories,
            bytesize::ByteSize(self.total_bytes),
            self.skipped,
            self.failed,
            humantime::format_duration(elapsed),
            bytesize::ByteSize(self.throughput()),
        )
    }
}

/// Replace the `from` prefix of `path` with `to`.
///
/// Returns None when `path` is not below `from` or the result would be `path` itself.
pub fn rebase(path: &Path, from: &Path, to: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(from).ok()?;
    let rebased = if relative.as_os_str().is_empty() {
        to.to_path_buf()
    } else {
        to.join(relative)
    };
    if rebased == path { None } else { Some(rebased) }
}

/// Everything one copy or delete invocation knows about its tree.
///
/// The scan result is frozen into shared read-only slices once scanning (and the optional shuffle)
/// is done; the byte counters are the only state workers write to.
#[derive(Debug)]
pub struct OperationDetails {
    pub source: PathBuf,
    pub files: Arc<[PathBuf]>,
    pub directories: Arc<[PathBuf]>,
    counters: WorkerCounters,
}

impl OperationDetails {
    /// Validate the root, scan it and optionally shuffle the result.
    ///
    /// Returns the details together with one counter slot per worker.
    #[instrument(skip(settings, scan_settings))]
    pub fn prepare(
        source: &Path,
        settings: &Settings,
        scan_settings: &ScanSettings,
    ) -> Result<(Self, Vec<CounterSlot>), Error> {
        if !source.is_dir() {
            return Err(Error::RootNotFound {
                path: source.to_path_buf(),
            });
        }
        let ScanResult {
            mut files,
            mut directories,
        } = scan::scan(source, &settings.exclusions, scan_settings)
            .map_err(|source| Error::Scan { source })?;
        if settings.randomize {
            tracing::debug!("randomizing processing order");
            shuffle::shuffle(&mut files);
            shuffle::shuffle(&mut directories);
        }
        let (counters, slots) = WorkerCounters::new(settings.runtime.workers());
        let details = Self {
            source: source.to_path_buf(),
            files: files.into(),
            directories: directories.into(),
            counters,
        };
        Ok((details, slots))
    }

    pub fn workers(&self) -> usize {
        self.counters.len()
    }

    pub fn counters(&self) -> WorkerCounters {
        self.counters.clone()
    }

    pub fn progress_monitor(
        &self,
        settings: Option<&ProgressSettings>,
    ) -> Result<Option<ProgressMonitor>, Error> {
        settings
            .map(|settings| ProgressMonitor::new(settings, self.counters()))
            .transpose()
            .map_err(|source| Error::Setup { source })
    }

    /// Fold the batch reports into the final statistics.
    ///
    /// `skipped` and `extra_errors` account for work done outside of the batches.
    pub fn conclude(
        &self,
        started: std::time::Instant,
        reports: Vec<BatchReport>,
        skipped: usize,
        extra_errors: Vec<anyhow::Error>,
    ) -> Result<Summary, Error> {
        let total_bytes = self.counters.total();
        let mut summary = Summary {
            directories: self.directories.len(),
            total_bytes,
            skipped,
            ..Default::default()
        };
        let mut errors = vec![];
        for report in reports {
            summary.files += report.processed;
            summary.skipped += report.skipped;
            errors.extend(report.errors);
        }
        errors.extend(extra_errors);
        summary.failed = errors.len();
        summary.elapsed = started.elapsed();
        tracing::info!(
            "finished {:?} in {:?}: {} files, {} bytes",
            &self.source,
            summary.elapsed,
            summary.files,
            total_bytes
        );
        match errors.into_iter().next() {
            None => Ok(summary),
            Some(first) if summary.failed == 1 => Err(Error::Batch {
                source: first,
                summary,
            }),
            Some(first) => Err(Error::Batch {
                source: first.context(format!("{} items failed, first failure", summary.failed)),
                summary,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reserved;

    fn scan_settings() -> ScanSettings {
        ScanSettings {
            follow_symlinks: true,
            reserved: &reserved::NoReservedRoots,
        }
    }

    #[test]
    fn rebase_replaces_the_prefix() {
        assert_eq!(
            rebase(Path::new("/src/a/b.txt"), Path::new("/src"), Path::new("/dst")),
            Some(PathBuf::from("/dst/a/b.txt"))
        );
        assert_eq!(
            rebase(Path::new("/src"), Path::new("/src"), Path::new("/dst")),
            Some(PathBuf::from("/dst"))
        );
    }

    #[test]
    fn rebase_rejects_foreign_and_identical_paths() {
        assert_eq!(
            rebase(Path::new("/other/a.txt"), Path::new("/src"), Path::new("/dst")),
            None
        );
        assert_eq!(
            rebase(Path::new("/src/a.txt"), Path::new("/src"), Path::new("/src")),
            None
        );
    }

    #[test]
    fn throughput_floors_elapsed_at_one_second() {
        let summary = Summary {
            elapsed: std::time::Duration::from_millis(10),
            total_bytes: 1000,
            ..Default::default()
        };
        assert_eq!(summary.throughput(), 1000);
        let summary = Summary {
            elapsed: std::time::Duration::from_secs(4),
            total_bytes: 1000,
            ..Default::default()
        };
        assert_eq!(summary.throughput(), 250);
        assert_eq!(Summary::default().throughput(), 0);
    }

    #[test]
    fn throughput_uses_whole_seconds() {
        let summary = Summary {
            elapsed: std::time::Duration::from_millis(1500),
            total_bytes: 3000,
            ..Default::default()
        };
        assert_eq!(summary.throughput(), 3000);
        let summary = Summary {
            elapsed: std::time::Duration::from_millis(2999),
            total_bytes: 3000,
            ..Default::default()
        };
        assert_eq!(summary.throughput(), 1500);
    }

    #[test]
    fn summary_display() {
        let summary = Summary {
            elapsed: std::time::Duration::from_secs(2),
            files: 3,
            directories: 1,
            total_bytes: 60,
            skipped: 0,
            failed: 0,
        };
        let text = summary.to_string();
        assert!(text.contains("files: 3"), "{text}");
        assert!(text.contains("directories: 1"), "{text}");
        assert!(text.contains("elapsed: 2s"), "{text}");
    }

    #[test]
    fn missing_root_is_reported_as_no_work() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let error = OperationDetails::prepare(
            &tmp_dir.path().join("missing"),
            &Settings::default(),
            &scan_settings(),
        )
        .unwrap_err();
        assert!(error.is_no_work());
        assert!(error.summary().is_none());
        assert!(error.to_string().contains("no work performed"));
    }

    #[test]
    fn conclude_aggregates_reports() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        std::fs::write(tmp_dir.path().join("a.txt"), "a")?;
        let settings = Settings {
            runtime: RuntimeConfig {
                max_workers: 2,
                worker_multiplier: 1.0,
            },
            ..Default::default()
        };
        let (details, slots) =
            OperationDetails::prepare(tmp_dir.path(), &settings, &scan_settings())?;
        assert_eq!(details.workers(), 2);
        assert_eq!(details.files.len(), 1);
        slots[0].add(7);
        slots[1].add(3);
        let mut first = BatchReport::new(0);
        first.processed = 1;
        let mut second = BatchReport::new(1);
        second.errors.push(anyhow::anyhow!("boom"));
        let started = std::time::Instant::now();
        let error = details
            .conclude(started, vec![first, second], 1, vec![])
            .unwrap_err();
        let summary = error.summary().copied().unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total_bytes, 10);
        assert_eq!(details.counters().total(), 10);
        assert!(error.to_string().contains("boom"));
        Ok(())
    }
}
