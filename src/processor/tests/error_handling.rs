//! Error handling integration tests

use super::{reference_trips, write_trip_file};
use crate::config::KpiConfig;
use crate::error::KpiError;
use crate::models::{Metric, RunDate};
use crate::processor::KpiProcessor;
use polars::prelude::*;
use std::fs;
use tempfile::TempDir;

fn processor(input: &std::path::Path, output: &std::path::Path, day: &str) -> KpiProcessor {
    KpiProcessor::new(
        input.to_path_buf(),
        output.to_path_buf(),
        RunDate::parse(day).unwrap(),
    )
    .with_config(KpiConfig::default().without_progress())
}

#[tokio::test]
async fn test_missing_input_file() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    write_trip_file(&input_dir, "2023-01-01", &mut reference_trips());

    let result = processor(&input_dir, &output_dir, "2023-01-05").process().await;

    match result {
        Err(KpiError::InputNotFound { path, available }) => {
            assert!(path.ends_with("yellow_tripdata_2023-01-05.parquet"));
            assert_eq!(available, vec!["2023-01-01".to_string()]);
        }
        other => panic!("Expected InputNotFound error, got {:?}", other),
    }

    // Nothing is written when the source fails
    assert!(!output_dir.exists());
}

#[tokio::test]
async fn test_empty_file_reports_both_metrics() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    let mut df = reference_trips().head(Some(0));
    write_trip_file(&input_dir, "2023-01-01", &mut df);

    let result = processor(&input_dir, &output_dir, "2023-01-01").process().await;

    match result {
        Err(KpiError::EmptyEligibleSet { metrics }) => {
            assert_eq!(metrics, vec![Metric::PricePerMile, Metric::CustomIndicator]);
        }
        other => panic!("Expected EmptyEligibleSet error, got {:?}", other),
    }
    assert!(!output_dir.join("log.txt").exists());
}

#[tokio::test]
async fn test_no_positive_distance_is_empty_eligible_set() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    let mut df = df!(
        "fare_amount" => [10.0f64, 7.5],
        "trip_distance" => [0.0f64, -1.0],
        "payment_type" => [1i64, 2],
        "tip_amount" => [1.0f64, 1.0],
        "extra" => [0.5f64, 0.5],
    )
    .unwrap();
    write_trip_file(&input_dir, "2023-01-01", &mut df);

    let result = processor(&input_dir, &output_dir, "2023-01-01").process().await;

    assert!(matches!(result, Err(KpiError::EmptyEligibleSet { .. })));
    assert!(!output_dir.join("20230101_yellow_taxi_kpis.json").exists());
}

#[tokio::test]
async fn test_missing_column() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    let mut df = reference_trips().drop("extra").unwrap();
    write_trip_file(&input_dir, "2023-01-01", &mut df);

    let result = processor(&input_dir, &output_dir, "2023-01-01").process().await;

    match result {
        Err(KpiError::MissingColumn { column, .. }) => assert_eq!(column, "extra"),
        other => panic!("Expected MissingColumn error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unwritable_output_leaves_log_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    write_trip_file(&input_dir, "2023-01-01", &mut reference_trips());

    // A regular file where the output directory should be
    let output_dir = temp_dir.path().join("output");
    fs::write(&output_dir, "not a directory").unwrap();

    let result = processor(&input_dir, &output_dir, "2023-01-01").process().await;

    assert!(matches!(result, Err(KpiError::Sink { .. })));
    assert_eq!(fs::read_to_string(&output_dir).unwrap(), "not a directory");
}
