//! Command-line interface components.
//!
//! Argument parsing, logging setup and the top-level run command that ties
//! the processor to the terminal.

use crate::config::{EmptyMetricPolicy, KpiConfig};
use crate::constants::SUCCESS_MESSAGE;
use crate::error::{KpiError, Result};
use crate::models::{RunDate, RunStats};
use crate::processor::KpiProcessor;

use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug, Clone)]
#[command(name = "taxi_kpis")]
#[command(about = "Compute daily KPIs from yellow taxi trip Parquet files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Folder containing yellow_tripdata_<YYYY-MM-DD>.parquet files
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Folder where the KPI document and log.txt are written
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Date of the trips to process (YYYY-MM-DD, defaults to today)
    #[arg(value_name = "DATE")]
    pub date: Option<String>,

    /// Aggregation workers (1 = serial, 0 = one per core)
    #[arg(short, long, default_value_t = crate::constants::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Minimum number of trips before aggregation is split across workers
    #[arg(long, value_name = "TRIPS", default_value_t = crate::constants::DEFAULT_PARALLEL_THRESHOLD)]
    pub parallel_threshold: usize,

    /// Write 0.0 for an average with no eligible trips instead of failing
    #[arg(long)]
    pub allow_empty: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

impl Args {
    /// Date to process, today if none was given
    pub fn run_date(&self) -> Result<RunDate> {
        match &self.date {
            Some(value) => RunDate::parse(value),
            None => Ok(RunDate::today()),
        }
    }

    /// Log level derived from the verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress and summaries (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.no_progress
    }

    /// Build the run configuration from the arguments
    pub fn to_config(&self) -> KpiConfig {
        let policy = if self.allow_empty {
            EmptyMetricPolicy::Zero
        } else {
            EmptyMetricPolicy::Fail
        };

        let config = KpiConfig::default()
            .with_workers(self.workers)
            .with_parallel_threshold(self.parallel_threshold)
            .with_empty_metric_policy(policy);

        if self.show_progress() {
            config
        } else {
            config.without_progress()
        }
    }

    /// Validate everything that can be checked before touching any file
    pub fn validate(&self) -> Result<RunDate> {
        let date = self.run_date()?;
        input_directory::check(&self.input_dir)
            .map_err(|e| KpiError::configuration(format!("{:#}", e)))?;
        Ok(date)
    }
}

/// Checks on the input directory given on the command line
pub mod input_directory {
    use anyhow::{Context, Result};
    use std::path::Path;

    /// The input path must be an existing, listable directory
    pub fn check(path: &Path) -> Result<()> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Input folder {} is not accessible", path.display()))?;

        if !metadata.is_dir() {
            anyhow::bail!("Input path {} is not a folder", path.display());
        }

        std::fs::read_dir(path)
            .with_context(|| format!("Input folder {} cannot be listed", path.display()))?;

        Ok(())
    }
}

/// Set up structured logging
///
/// Leaves an already installed global subscriber in place.
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    // Create filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("taxi_kpis={}", log_level)));

    let initialised = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    match initialised {
        Ok(()) => debug!("Logging initialized at level: {}", log_level),
        Err(e) => debug!("Keeping existing subscriber: {}", e),
    }
}

/// Main command runner
///
/// 1. Set up logging
/// 2. Validate the arguments before any file is read
/// 3. Run the processor for the requested date
/// 4. Report the summary
pub async fn run(args: Args) -> Result<RunStats> {
    setup_logging(&args);
    debug!("Command line arguments: {:?}", args);

    let date = args.validate()?;
    let config = args.to_config();
    info!(
        "Processing {} from {}",
        config.input_file_name(&date),
        args.input_dir.display()
    );

    let processor = KpiProcessor::new(args.input_dir.clone(), args.output_dir.clone(), date)
        .with_config(config);
    let stats = processor.process().await?;

    if !args.quiet {
        print_summary(&stats, &args.input_dir);
    }

    Ok(stats)
}

/// Print the run summary to stdout
pub fn print_summary(stats: &RunStats, input_dir: &Path) {
    println!("{}", "KPI Run Summary".bright_green().bold());
    println!("  {} {}", "Date:".bright_cyan(), stats.date);
    println!("  {} {}", "Input:".bright_cyan(), input_dir.display());
    println!(
        "  {} {}",
        "Trips read:".bright_cyan(),
        stats.records_read.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Price per mile eligible:".bright_cyan(),
        stats.price_per_mile_eligible.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Custom indicator eligible:".bright_cyan(),
        stats.custom_indicator_eligible.to_string().bright_white()
    );
    if stats.unclassified_payments > 0 {
        println!(
            "  {} {}",
            "Unclassified payment codes:".bright_yellow(),
            stats.unclassified_payments.to_string().bright_yellow().bold()
        );
    }
    println!(
        "  {} {}",
        "Document:".bright_cyan(),
        stats.output_path.display()
    );
    println!("  {} {}", "Log:".bright_cyan(), stats.log_path.display());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!("{}", SUCCESS_MESSAGE.bright_green());
}
