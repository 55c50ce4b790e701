//! Configuration management for KPI runs.
//!
//! Holds file naming conventions, the aggregation worker settings and the
//! policy applied when an average has no eligible records.

use crate::constants::{
    DEFAULT_PARALLEL_THRESHOLD, DEFAULT_WORKERS, INPUT_FILE_EXTENSION, INPUT_FILE_PREFIX,
    JSON_INDENT, LOG_FILE_NAME, OUTPUT_FILE_SUFFIX,
};
use crate::models::RunDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What to do when a metric has zero eligible records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyMetricPolicy {
    /// Abort the run with `KpiError::EmptyEligibleSet`
    #[default]
    Fail,
    /// Write 0.0 for the affected average and carry on
    Zero,
}

/// Global configuration for a KPI run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiConfig {
    /// File name prefix of the daily trip data files
    pub input_prefix: String,

    /// File extension of the daily trip data files
    pub input_extension: String,

    /// File name suffix of the KPI document
    pub output_suffix: String,

    /// Name of the run log inside the output directory
    pub log_file_name: String,

    /// Number of workers for the aggregation pass (0 = one per core)
    pub workers: usize,

    /// Minimum record count before the aggregation is split across workers
    pub parallel_threshold: usize,

    /// Behaviour when an average has nothing to average
    pub empty_metric_policy: EmptyMetricPolicy,

    /// Indentation used when writing the KPI document
    pub json_indent: String,

    /// Show a spinner while reading and aggregating
    pub show_progress: bool,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            input_prefix: INPUT_FILE_PREFIX.to_string(),
            input_extension: INPUT_FILE_EXTENSION.to_string(),
            output_suffix: OUTPUT_FILE_SUFFIX.to_string(),
            log_file_name: LOG_FILE_NAME.to_string(),
            workers: DEFAULT_WORKERS,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            empty_metric_policy: EmptyMetricPolicy::Fail,
            json_indent: JSON_INDENT.to_string(),
            show_progress: true,
        }
    }
}

impl KpiConfig {
    /// Create configuration with custom worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the record count from which the aggregation runs in parallel
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Set the empty metric policy
    pub fn with_empty_metric_policy(mut self, policy: EmptyMetricPolicy) -> Self {
        self.empty_metric_policy = policy;
        self
    }

    /// Disable the progress spinner
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Worker count with 0 resolved to the number of cores
    pub fn effective_workers(&self) -> usize {
        let workers = if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        };
        debug!(
            "Aggregation workers: {} (configured {})",
            workers, self.workers
        );
        workers.max(1)
    }

    /// Whether a batch of this size should be aggregated in parallel
    pub fn use_parallel(&self, record_count: usize) -> bool {
        self.effective_workers() > 1 && record_count >= self.parallel_threshold
    }

    /// File name of the trip data for a date: `yellow_tripdata_2023-01-01.parquet`
    pub fn input_file_name(&self, date: &RunDate) -> String {
        format!("{}{}.{}", self.input_prefix, date, self.input_extension)
    }

    /// Glob matching every trip data file in a directory
    pub fn input_glob(&self, input_dir: &Path) -> String {
        let escaped = glob::Pattern::escape(&input_dir.to_string_lossy());
        Path::new(&escaped)
            .join(format!("{}*.{}", self.input_prefix, self.input_extension))
            .to_string_lossy()
            .to_string()
    }

    /// Full path of the trip data file for a date
    pub fn input_path(&self, input_dir: &Path, date: &RunDate) -> PathBuf {
        input_dir.join(self.input_file_name(date))
    }

    /// Full path of the KPI document for a date: `20230101_yellow_taxi_kpis.json`
    pub fn output_path(&self, output_dir: &Path, date: &RunDate) -> PathBuf {
        output_dir.join(format!("{}{}", date.compact(), self.output_suffix))
    }

    /// Full path of the run log
    pub fn log_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.log_file_name)
    }

    /// Extract the date part from a trip data file name, if it has one
    pub fn date_from_file_name(&self, file_name: &str) -> Option<RunDate> {
        let stem = file_name
            .strip_prefix(&self.input_prefix)?
            .strip_suffix(&self.input_extension)?
            .strip_suffix('.')?;
        RunDate::parse(stem).ok()
    }
}
