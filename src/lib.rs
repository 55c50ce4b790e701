//! Taxi KPI Processor Library
//!
//! Computes daily key performance indicators from NYC yellow taxi trip
//! records stored as Parquet files:
//! - Average price per mile over trips with a fare and a positive distance
//! - Distribution of trips over the six payment types
//! - Average of (tip + extra) per mile over trips with both amounts
//!
//! Each run processes one date, writes a JSON document and appends a line
//! to the run log in the output directory.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod processor;

// Re-export commonly used types
pub use config::{EmptyMetricPolicy, KpiConfig};
pub use error::{KpiError, Result};
pub use models::{KpiResult, Metric, PaymentType, RunDate, RunStats, TripRecord};
pub use processor::KpiProcessor;
pub use processor::aggregator::{KpiAccumulator, accumulate, compute};
