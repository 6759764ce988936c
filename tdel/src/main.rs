use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tdel",
    version,
    about = "Remove a directory tree with a pool of parallel workers - equivalent to `rm -rf`",
    long_about = "`tdel` scans a directory tree, splits the files it found into one batch per worker and removes
them in parallel. Whatever remains afterwards is swept away together with the root directory.

EXAMPLE:
    # Remove a tree using 16 workers and print statistics at the end
    tdel /path/to/remove --max-workers 16 --summary

Note: Like `rm -rf`, this is a destructive operation. Use with caution."
)]
struct Args {
    // Removal options
    /// Stop a worker's batch at its first failure
    ///
    /// Batches of other workers run to completion.
    #[arg(short = 'e', long = "fail-early", help_heading = "Removal options")]
    fail_early: bool,

    /// Remove files in random order instead of scan order
    #[arg(long, help_heading = "Removal options")]
    randomize: bool,

    // Filtering options
    /// Pattern for files to leave out of the parallel phase (can be specified multiple times)
    ///
    /// Patterns are matched against full paths: * matches any run of characters including path
    /// separators, ? matches a single character. Excluded entries are still removed by the final
    /// sweep but are not counted.
    #[arg(long, value_name = "PATTERN", action = clap::ArgAction::Append, help_heading = "Filtering")]
    exclude_file: Vec<String>,

    /// Pattern for directories to leave out of the parallel phase, with everything below them
    #[arg(long, value_name = "PATTERN", action = clap::ArgAction::Append, help_heading = "Filtering")]
    exclude_dir: Vec<String>,

    /// Read exclusion patterns from file
    ///
    /// Each line is either `--exclude-file PATTERN` or `--exclude-dir PATTERN`, lines starting
    /// with # are comments.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["exclude_file", "exclude_dir"], help_heading = "Filtering")]
    filter_file: Option<std::path::PathBuf>,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Toggles the type of progress to show
    ///
    /// If specified, --progress flag is implied.
    ///
    /// Options are: `ProgressBar` (animated progress bar), `TextUpdates` (appropriate for logging), Auto (default, will
    /// choose between `ProgressBar` or `TextUpdates` depending on the type of terminal attached to stderr)
    #[arg(long, value_name = "TYPE", help_heading = "Progress & output")]
    progress_type: Option<common::ProgressType>,

    /// Sets the delay between progress updates
    ///
    /// - For the interactive (--progress-type=ProgressBar), the default is 200ms.
    /// - For the non-interactive (--progress-type=TextUpdates), the default is 10s.
    ///
    /// If specified, --progress flag is implied.
    ///
    /// This option accepts a human readable duration, e.g. "200ms", "10s", "5min" etc.
    #[arg(long, value_name = "DELAY", help_heading = "Progress & output")]
    progress_delay: Option<String>,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of workers, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Scales the number of workers, e.g. 2.0 doubles it
    #[arg(
        long,
        default_value = "1.0",
        value_name = "F",
        help_heading = "Advanced settings"
    )]
    worker_multiplier: f64,

    // ARGUMENTS
    /// Directory to remove
    #[arg()]
    path: std::path::PathBuf,
}

fn progress_settings(args: &Args) -> Result<Option<common::ProgressSettings>> {
    if let Some(delay) = &args.progress_delay {
        humantime::parse_duration(delay)
            .with_context(|| format!("invalid --progress-delay value: {:?}", delay))?;
    }
    if args.progress || args.progress_type.is_some() || args.progress_delay.is_some() {
        return Ok(Some(common::ProgressSettings {
            progress_type: args.progress_type.unwrap_or_default(),
            progress_delay: args.progress_delay.clone(),
        }));
    }
    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = common::Settings {
        exclusions: common::filter::ExclusionSettings::from_args(
            &args.exclude_file,
            &args.exclude_dir,
            args.filter_file.as_deref(),
        )?,
        randomize: args.randomize,
        fail_early: args.fail_early,
        runtime: common::RuntimeConfig {
            max_workers: args.max_workers,
            worker_multiplier: args.worker_multiplier,
        },
        progress: progress_settings(&args)?,
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let path = std::path::absolute(&args.path)
        .with_context(|| format!("cannot resolve path {:?}", &args.path))?;
    let res = common::run(&output, || {
        tracing::debug!("removing {:?} with {:?}", &path, &settings);
        common::perform_delete(&path, &settings)
    });
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
