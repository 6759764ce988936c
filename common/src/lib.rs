//! Common library for the `tcopy` and `tdel` tools
//!
//! Both tools share one engine: the tree below a root directory is scanned once
//! ([`scan`]), optionally shuffled ([`shuffle`]), split into one contiguous batch per worker
//! ([`partition`]) and processed by a bounded pool ([`pool`]) that counts bytes per worker
//! ([`progress`]). [`perform_copy`] and [`perform_delete`] compose those steps and return a
//! [`Summary`].
//!
//! # Failure handling
//!
//! A missing root is refused before any work starts ([`Error::RootNotFound`]). A directory that
//! cannot be listed aborts the scan and with it the whole operation. Failures of individual
//! files are logged and counted; with `fail_early` a failure ends the batch it happened in.
//! Either way the operation reports [`Error::Batch`] together with the partial [`Summary`].
//!
//! # Example
//!
//! ```no_run
//! let settings = common::Settings::default();
//! let summary = common::perform_copy(
//!     std::path::Path::new("/data/src"),
//!     std::path::Path::new("/data/dst"),
//!     &settings,
//! )?;
//! println!("{summary}");
//! # Ok::<(), common::Error>(())
//! ```

pub mod config;
pub mod copy;
pub mod filter;
pub mod operation;
pub mod partition;
pub mod pool;
pub mod preserve;
pub mod progress;
pub mod reserved;
pub mod rm;
pub mod scan;
pub mod shuffle;

#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, ProgressSettings, ProgressType, RuntimeConfig};
pub use copy::perform_copy;
pub use operation::{Error, Settings, Summary};
pub use rm::perform_delete;

/// Install the stderr logger: quiet turns logging off, otherwise 0=ERROR, 1=INFO, 2=DEBUG,
/// 3+=TRACE. `RUST_LOG` takes precedence when set.
pub fn init_logging(output: &OutputConfig) -> anyhow::Result<()> {
    let level = if output.quiet {
        "off"
    } else {
        match output.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!(error))
}

/// Entry point shared by the binaries.
///
/// Sets up logging, runs `func` and reports its outcome. Returns None when the operation failed,
/// the caller is expected to exit with a non-zero status then. A missing root is not a failure:
/// it is reported as "no work performed".
pub fn run<F>(output: &OutputConfig, func: F) -> Option<Summary>
where
    F: FnOnce() -> Result<Summary, Error>,
{
    if let Err(error) = init_logging(output) {
        eprintln!("failed to initialize logging: {:#}", &error);
        return None;
    }
    match func() {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{}", &summary);
            }
            Some(summary)
        }
        Err(error) if error.is_no_work() => {
            if !output.quiet {
                eprintln!("{}", &error);
            }
            Some(Summary::default())
        }
        Err(error) => {
            if !output.quiet {
                eprintln!("{:#}", &error);
                let show_summary = output.print_summary || output.verbose > 0;
                if let Some(summary) = error.summary().filter(|_| show_summary) {
                    eprintln!("\n{}", summary);
                }
            }
            None
        }
    }
}
