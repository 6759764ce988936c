//! Splitting the scanned file list into one contiguous batch per worker

use std::ops::Range;

/// Half-open index range `[start, end)` over the file list, owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub worker: usize,
    pub start: usize,
    pub end: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Number of files each batch is sized for. Over-allocates by one so the batches always cover
/// every file, at the price of trailing batches possibly being empty.
pub fn batch_size(file_count: usize, worker_count: usize) -> usize {
    file_count / worker_count + 1
}

/// Produce exactly `worker_count` disjoint batches whose union is `[0, file_count)`.
///
/// # Panics
/// When `worker_count` is zero.
pub fn partition(file_count: usize, worker_count: usize) -> Vec<Batch> {
    assert!(worker_count > 0, "at least one worker is required");
    let size = batch_size(file_count, worker_count);
    (0..worker_count)
        .map(|worker| Batch {
            worker,
            start: worker.saturating_mul(size).min(file_count),
            end: (worker + 1).saturating_mul(size).min(file_count),
        })
        .collect()
}
