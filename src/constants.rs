//! Application constants for the taxi KPI processor
//!
//! File naming conventions, column names of the yellow taxi trip schema,
//! and payment type codes used throughout the processor.

// =============================================================================
// File Naming
// =============================================================================

/// Prefix of the daily trip data files (`yellow_tripdata_<YYYY-MM-DD>.parquet`)
pub const INPUT_FILE_PREFIX: &str = "yellow_tripdata_";

/// Extension of the daily trip data files
pub const INPUT_FILE_EXTENSION: &str = "parquet";

/// Suffix of the KPI document (`<YYYYMMDD>_yellow_taxi_kpis.json`)
pub const OUTPUT_FILE_SUFFIX: &str = "_yellow_taxi_kpis.json";

/// Name of the append-only run log in the output directory
pub const LOG_FILE_NAME: &str = "log.txt";

/// Date format accepted on the command line and used in file names
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Shape check applied before calendar validation
pub const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";

// =============================================================================
// Trip Schema
// =============================================================================

/// Column names read from the trip data files
pub mod columns {
    pub const FARE_AMOUNT: &str = "fare_amount";
    pub const TRIP_DISTANCE: &str = "trip_distance";
    pub const PAYMENT_TYPE: &str = "payment_type";
    pub const TIP_AMOUNT: &str = "tip_amount";
    pub const EXTRA: &str = "extra";

    /// Every column the aggregation needs
    pub const REQUIRED: &[&str] = &[FARE_AMOUNT, TRIP_DISTANCE, PAYMENT_TYPE, TIP_AMOUNT, EXTRA];
}

// =============================================================================
// Payment Types
// =============================================================================

/// Payment type codes as published in the TLC trip record data dictionary
pub mod payment_codes {
    pub const CREDIT_CARD: i64 = 1;
    pub const CASH: i64 = 2;
    pub const NO_CHARGE: i64 = 3;
    pub const DISPUTE: i64 = 4;
    pub const UNKNOWN: i64 = 5;
    pub const VOIDED_TRIP: i64 = 6;
}

// =============================================================================
// Processing Defaults
// =============================================================================

/// Default number of workers for the aggregation pass (1 = serial)
pub const DEFAULT_WORKERS: usize = 1;

/// Below this many records the aggregation always runs serially
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 250_000;

/// Indentation of the KPI document
pub const JSON_INDENT: &str = "    ";

/// Message printed once a run has finished
pub const SUCCESS_MESSAGE: &str = "KPIs successfully computed and saved";
