//! Integration tests for the processor module
//!
//! Runs the complete pipeline against Parquet fixtures written into a
//! temporary input directory.

pub mod error_handling;

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Write a trip frame as `yellow_tripdata_<date>.parquet` in `input_dir`
pub fn write_trip_file(input_dir: &Path, date: &str, df: &mut DataFrame) -> PathBuf {
    std::fs::create_dir_all(input_dir).unwrap();
    let path = input_dir.join(format!("yellow_tripdata_{}.parquet", date));
    let file = File::create(&path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();
    path
}

/// The two-trip reference batch: one cash trip without a fare
pub fn reference_trips() -> DataFrame {
    df!(
        "VendorID" => [1i32, 2],
        "fare_amount" => [Some(10.0f64), None],
        "trip_distance" => [5.0f64, 3.0],
        "payment_type" => [1i64, 2],
        "tip_amount" => [2.0f64, 1.0],
        "extra" => [1.0f64, 1.0],
        "total_amount" => [13.0f64, 2.0],
    )
    .unwrap()
}
