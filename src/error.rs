//! Error handling for KPI processing runs.
//!
//! One error type covers the whole run: argument and date validation,
//! locating and decoding the trip file, the aggregation itself, and
//! persisting the document and run log.

use crate::models::Metric;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Error in the date '{value}': must be in YYYY-MM-DD format")]
    InvalidDate { value: String },

    #[error("Trip data file not found: {}{}", path.display(), format_available(available))]
    InputNotFound {
        path: PathBuf,
        available: Vec<String>,
    },

    #[error("Failed to read trip data from {}: {reason}", path.display())]
    RecordSource { path: PathBuf, reason: String },

    #[error("Column '{column}' missing from trip data file {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("No eligible records to compute {}", format_metrics(metrics))]
    EmptyEligibleSet { metrics: Vec<Metric> },

    #[error("Failed to write {}: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl KpiError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a record source error for the given file
    pub fn record_source(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::RecordSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a sink error for the given output path
    pub fn sink(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Sink {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was raised before any file was touched
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            KpiError::Configuration { .. } | KpiError::InvalidDate { .. }
        )
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_configuration() { 2 } else { 1 }
    }
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(" (available dates: {})", available.join(", "))
    }
}

fn format_metrics(metrics: &[Metric]) -> String {
    metrics
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(" and ")
}

pub type Result<T> = std::result::Result<T, KpiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_eligible_set_names_every_metric() {
        let error = KpiError::EmptyEligibleSet {
            metrics: vec![Metric::PricePerMile, Metric::CustomIndicator],
        };

        assert_eq!(
            error.to_string(),
            "No eligible records to compute average price per mile and average custom indicator"
        );
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_input_not_found_lists_available_dates() {
        let error = KpiError::InputNotFound {
            path: PathBuf::from("/data/yellow_tripdata_2023-01-03.parquet"),
            available: vec!["2023-01-01".to_string(), "2023-01-02".to_string()],
        };

        let message = error.to_string();
        assert!(message.contains("yellow_tripdata_2023-01-03.parquet"));
        assert!(message.ends_with("(available dates: 2023-01-01, 2023-01-02)"));
    }

    #[test]
    fn test_configuration_errors_use_distinct_exit_code() {
        let error = KpiError::InvalidDate {
            value: "2023/01/01".to_string(),
        };
        assert!(error.is_configuration());
        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.to_string(),
            "Error in the date '2023/01/01': must be in YYYY-MM-DD format"
        );

        let error = KpiError::configuration("At least 2 arguments are needed");
        assert_eq!(error.exit_code(), 2);
    }
}
