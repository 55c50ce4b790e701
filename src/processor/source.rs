//! Trip data source for daily yellow taxi files
//!
//! Locates `yellow_tripdata_<date>.parquet` in the input directory, reads the
//! five columns the aggregation needs with Polars and decodes them into
//! [`TripRecord`]s. Nulls and NaN both become `None`.

use crate::config::KpiConfig;
use crate::constants::columns;
use crate::error::{KpiError, Result};
use crate::models::{RunDate, TripRecord, payment_code};

use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Record source rooted at one input directory
#[derive(Debug, Clone)]
pub struct TripSource {
    input_dir: PathBuf,
    config: KpiConfig,
}

impl TripSource {
    pub fn new(input_dir: PathBuf, config: KpiConfig) -> Self {
        Self { input_dir, config }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Path of the trip data file for a date (may not exist)
    pub fn path_for(&self, date: &RunDate) -> PathBuf {
        self.config.input_path(&self.input_dir, date)
    }

    /// Dates for which a trip data file exists, oldest first
    pub fn available_dates(&self) -> Vec<RunDate> {
        let pattern = self.config.input_glob(&self.input_dir);
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Invalid input glob {}: {}", pattern, e);
                return Vec::new();
            }
        };

        let mut dates: Vec<RunDate> = paths
            .filter_map(|entry| entry.ok())
            .filter_map(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| self.config.date_from_file_name(name))
            })
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// Resolve the trip data file for a date, listing alternatives if it is missing
    pub fn locate(&self, date: &RunDate) -> Result<PathBuf> {
        let path = self.path_for(date);
        if path.is_file() {
            return Ok(path);
        }

        let available = self
            .available_dates()
            .iter()
            .map(|d| d.to_string())
            .collect();
        Err(KpiError::InputNotFound { path, available })
    }

    /// Read every trip record for a date
    pub fn load(&self, date: &RunDate) -> Result<Vec<TripRecord>> {
        let path = self.locate(date)?;
        read_trip_file(&path)
    }
}

/// Read the aggregation columns of a trip data file
pub fn read_trip_file(path: &Path) -> Result<Vec<TripRecord>> {
    debug!("Reading trip data from {}", path.display());

    let mut frame = LazyFrame::scan_parquet(path, ScanArgsParquet::default())
        .map_err(|e| KpiError::record_source(path, e.to_string()))?;

    let schema = frame
        .collect_schema()
        .map_err(|e| KpiError::record_source(path, e.to_string()))?;

    if let Some(column) = columns::REQUIRED
        .iter()
        .find(|column| !schema.contains(column))
    {
        return Err(KpiError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        });
    }

    let df = frame
        .select([
            col(columns::FARE_AMOUNT).cast(DataType::Float64),
            col(columns::TRIP_DISTANCE).cast(DataType::Float64),
            // Float64 keeps fractional codes from truncating into a bucket
            col(columns::PAYMENT_TYPE).cast(DataType::Float64),
            col(columns::TIP_AMOUNT).cast(DataType::Float64),
            col(columns::EXTRA).cast(DataType::Float64),
        ])
        .collect()
        .map_err(|e| KpiError::record_source(path, e.to_string()))?;

    let records = records_from_frame(&df)?;
    debug!("Decoded {} trip records", records.len());
    Ok(records)
}

/// Decode trip records from a frame holding the aggregation columns
///
/// Every column, the payment code included, must already be `Float64`.
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<TripRecord>> {
    let fare = df.column(columns::FARE_AMOUNT)?.as_materialized_series().f64()?;
    let distance = df.column(columns::TRIP_DISTANCE)?.as_materialized_series().f64()?;
    let payment = df.column(columns::PAYMENT_TYPE)?.as_materialized_series().f64()?;
    let tip = df.column(columns::TIP_AMOUNT)?.as_materialized_series().f64()?;
    let extra = df.column(columns::EXTRA)?.as_materialized_series().f64()?;

    let records = fare
        .into_iter()
        .zip(distance)
        .zip(payment)
        .zip(tip)
        .zip(extra)
        .map(|((((fare, distance), payment), tip), extra)| {
            TripRecord::from_raw(fare, distance, payment_code(payment), tip, extra)
        })
        .collect();

    Ok(records)
}
