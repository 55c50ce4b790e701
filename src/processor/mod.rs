//! Main processing engine for one dated batch.
//!
//! Orchestrates the run: locate and read the trip file, aggregate the KPIs,
//! write the KPI document and finally append the run log entry. The log entry
//! is only written once the document has been persisted.

pub mod aggregator;
pub mod source;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::aggregator::{KpiAccumulator, accumulate};
use self::source::TripSource;
use self::writer::{KpiWriter, RunLog};

use crate::config::KpiConfig;
use crate::error::{KpiError, Result};
use crate::models::{KpiResult, Metric, RunDate, RunStats, TripRecord};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{debug, info};

/// Processor for a single date of trip data
#[derive(Debug)]
pub struct KpiProcessor {
    input_dir: PathBuf,
    output_dir: PathBuf,
    date: RunDate,
    config: KpiConfig,
    source: TripSource,
    writer: KpiWriter,
    run_log: RunLog,
}

impl KpiProcessor {
    /// Create a processor with the default configuration
    pub fn new(input_dir: PathBuf, output_dir: PathBuf, date: RunDate) -> Self {
        Self::build(input_dir, output_dir, date, KpiConfig::default())
    }

    /// Configure the processor
    pub fn with_config(self, config: KpiConfig) -> Self {
        Self::build(self.input_dir, self.output_dir, self.date, config)
    }

    fn build(input_dir: PathBuf, output_dir: PathBuf, date: RunDate, config: KpiConfig) -> Self {
        Self {
            source: TripSource::new(input_dir.clone(), config.clone()),
            writer: KpiWriter::new(output_dir.clone(), config.clone()),
            run_log: RunLog::new(config.log_path(&output_dir)),
            input_dir,
            output_dir,
            date,
            config,
        }
    }

    pub fn date(&self) -> &RunDate {
        &self.date
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Main processing entry point
    pub async fn process(&self) -> Result<RunStats> {
        let start_time = Instant::now();
        info!("Computing KPIs for {}", self.date);

        let progress = self.progress_bar();
        let computed = self.compute(&progress).await;
        progress.finish_and_clear();
        let (result, accumulator, records_read) = computed?;

        // Step 3: Persist the document, then record the run
        let output_path = self.writer.write(&self.date, &result).await?;
        self.run_log
            .append(&self.date, &self.config.input_file_name(&self.date))
            .await?;

        log_result(&result);

        Ok(RunStats {
            date: self.date,
            records_read,
            price_per_mile_eligible: accumulator.eligible(Metric::PricePerMile),
            custom_indicator_eligible: accumulator.eligible(Metric::CustomIndicator),
            unclassified_payments: accumulator.payments().unclassified(),
            output_path,
            log_path: self.run_log.path().to_path_buf(),
            processing_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Read and aggregate the trip file for the configured date
    async fn compute(&self, progress: &ProgressBar) -> Result<(KpiResult, KpiAccumulator, usize)> {
        // Step 1: Read the trip file for the date
        progress.set_message(format!("Reading {}", self.config.input_file_name(&self.date)));
        let source = self.source.clone();
        let date = self.date;
        let records = task::spawn_blocking(move || source.load(&date))
            .await
            .map_err(|e| KpiError::Interrupted {
                reason: format!("trip reader task failed: {}", e),
            })??;
        info!("Read {} trip records", records.len());

        // Step 2: Aggregate
        progress.set_message(format!("Aggregating {} trips", records.len()));
        let records_read = records.len();
        let accumulator = self.aggregate(Arc::new(records)).await?;
        let result = accumulator.finish_with(self.config.empty_metric_policy)?;

        Ok((result, accumulator, records_read))
    }

    /// Aggregate serially, or split across workers for large batches
    async fn aggregate(&self, records: Arc<Vec<TripRecord>>) -> Result<KpiAccumulator> {
        if !self.config.use_parallel(records.len()) {
            return Ok(accumulate(records.iter()));
        }

        let workers = self.config.effective_workers();
        let ranges = partition(records.len(), workers);
        debug!(
            "Aggregating {} records in {} partitions",
            records.len(),
            ranges.len()
        );

        let partials: Vec<_> = stream::iter(ranges)
            .map(|range| {
                let records = Arc::clone(&records);
                task::spawn_blocking(move || accumulate(&records[range]))
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut merged = KpiAccumulator::new();
        for partial in partials {
            let partial = partial.map_err(|e| KpiError::Interrupted {
                reason: format!("aggregation task failed: {}", e),
            })?;
            merged.merge(&partial);
        }
        Ok(merged)
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.enable_steady_tick(Duration::from_millis(100));
        progress
    }
}

/// Split `len` items into at most `parts` contiguous ranges
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let chunk = len.div_ceil(parts.max(1));
    (0..len)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(len))
        .collect()
}

fn log_result(result: &KpiResult) {
    info!(
        average_price_per_mile = result.average_price_per_mile,
        average_custom_indicator = result.average_custom_indicator,
        classified_trips = result.classified_trips(),
        "KPIs computed"
    );
}
