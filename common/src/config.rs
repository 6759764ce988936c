//! Configuration types for runtime and execution settings

use anyhow::Context;

/// Worker pool sizing
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Number of workers (0 = number of CPU cores)
    pub max_workers: usize,
    /// Scales the worker count, e.g. 2.0 runs twice as many workers as configured
    pub worker_multiplier: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_workers: 0,
            worker_multiplier: 1.0,
        }
    }
}

impl RuntimeConfig {
    /// Effective number of workers, never below 1
    pub fn workers(&self) -> usize {
        let base = if self.max_workers == 0 {
            num_cpus::get()
        } else {
            self.max_workers
        };
        let multiplier = if self.worker_multiplier.is_finite() && self.worker_multiplier > 0.0 {
            self.worker_multiplier
        } else {
            1.0
        };
        ((base as f64 * multiplier).round() as usize).max(1)
    }
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressType {
    /// Progress bar when stderr is a terminal, text updates otherwise
    #[default]
    #[value(alias = "Auto")]
    Auto,
    #[value(alias = "ProgressBar")]
    ProgressBar,
    #[value(alias = "TextUpdates")]
    TextUpdates,
}

impl ProgressType {
    /// Replace `Auto` with the concrete kind for the current stderr
    pub fn resolve(self) -> Self {
        match self {
            ProgressType::Auto => {
                if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
                    ProgressType::ProgressBar
                } else {
                    ProgressType::TextUpdates
                }
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgressSettings {
    pub progress_type: ProgressType,
    /// Human readable duration, e.g. "200ms" or "10s"
    pub progress_delay: Option<String>,
}

impl ProgressSettings {
    /// Delay between updates: the configured one, else 200ms for the bar and 10s for text
    pub fn delay(&self, resolved: ProgressType) -> anyhow::Result<std::time::Duration> {
        match &self.progress_delay {
            Some(delay) => humantime::parse_duration(delay)
                .with_context(|| format!("invalid progress delay: {:?}", delay)),
            None => Ok(match resolved {
                ProgressType::ProgressBar => std::time::Duration::from_millis(200),
                _ => std::time::Duration::from_secs(10),
            }),
        }
    }
}
