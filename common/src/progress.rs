use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{ProgressSettings, ProgressType};

/// Per-worker byte counters of one operation.
///
/// Every worker index owns exactly one slot. Slots are handed out once, by [`WorkerCounters::new`],
/// and a [`CounterSlot`] is moved into the single task processing that worker's batch, so no
/// counter is ever written by two workers. This handle only reads.
#[derive(Debug, Clone)]
pub struct WorkerCounters {
    slots: Arc<[AtomicU64]>,
}

/// Write access to the counter of one worker
#[derive(Debug)]
pub struct CounterSlot {
    worker: usize,
    slots: Arc<[AtomicU64]>,
}

impl CounterSlot {
    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn add(&self, bytes: u64) {
        // single writer per slot, readers only need an eventually consistent view
        self.slots[self.worker].fetch_add(bytes, Ordering::Relaxed);
    }
}

impl WorkerCounters {
    pub fn new(workers: usize) -> (Self, Vec<CounterSlot>) {
        let slots: Arc<[AtomicU64]> = (0..workers).map(|_| AtomicU64::new(0)).collect();
        let handles = (0..workers)
            .map(|worker| CounterSlot {
                worker,
                slots: slots.clone(),
            })
            .collect();
        (Self { slots }, handles)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn per_worker(&self) -> Vec<u64> {
        self.slots
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.slots
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .sum()
    }
}

pub struct ProgressPrinter {
    counters: WorkerCounters,
    start_time: std::time::Instant,
    last_bytes: u64,
    last_update: std::time::Instant,
}

impl ProgressPrinter {
    pub fn new(counters: WorkerCounters) -> Self {
        let now = std::time::Instant::now();
        Self {
            last_bytes: counters.total(),
            counters,
            start_time: now,
            last_update: now,
        }
    }

    pub fn print(&mut self) -> String {
        let time_now = std::time::Instant::now();
        let total_duration_secs = (time_now - self.start_time).as_secs_f64().max(f64::EPSILON);
        let curr_duration_secs = (time_now - self.last_update).as_secs_f64().max(f64::EPSILON);
        let bytes = self.counters.total();
        let average_bytes_rate = bytes as f64 / total_duration_secs;
        let current_bytes_rate = bytes.saturating_sub(self.last_bytes) as f64 / curr_duration_secs;
        self.last_bytes = bytes;
        self.last_update = time_now;
        format!(
            "processed: {} | average: {}/s | current: {}/s | workers: {}",
            bytesize::ByteSize(bytes),
            bytesize::ByteSize(average_bytes_rate as u64),
            bytesize::ByteSize(current_bytes_rate as u64),
            self.counters.len(),
        )
    }
}

enum Output {
    Bar(indicatif::ProgressBar),
    Text,
}

/// Renders aggregate progress while the pool is busy
pub struct ProgressMonitor {
    printer: ProgressPrinter,
    output: Output,
    delay: std::time::Duration,
}

impl ProgressMonitor {
    pub fn new(settings: &ProgressSettings, counters: WorkerCounters) -> anyhow::Result<Self> {
        let progress_type = settings.progress_type.resolve();
        let delay = settings.delay(progress_type)?;
        let output = match progress_type {
            ProgressType::ProgressBar => {
                let bar = indicatif::ProgressBar::new_spinner();
                bar.set_style(
                    indicatif::ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
                );
                Output::Bar(bar)
            }
            _ => Output::Text,
        };
        Ok(Self {
            printer: ProgressPrinter::new(counters),
            output,
            delay,
        })
    }

    pub fn delay(&self) -> std::time::Duration {
        self.delay
    }

    pub fn update(&mut self) {
        let line = self.printer.print();
        match &self.output {
            Output::Bar(bar) => {
                bar.set_message(line);
                bar.tick();
            }
            Output::Text => eprintln!("{line}"),
        }
    }

    pub fn finish(self) {
        if let Output::Bar(bar) = self.output {
            bar.finish_and_clear();
        }
    }
}
