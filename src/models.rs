//! Core data structures and types for KPI processing.
//!
//! Defines the trip record read from the daily Parquet files, the KPI
//! document written for each run, the validated run date, and the run
//! statistics reported at the end of processing.

use crate::constants::{DATE_FORMAT, DATE_PATTERN, payment_codes};
use crate::error::{KpiError, Result};
use chrono::{Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

/// One taxi trip as read from the trip data file
///
/// Every field is independent: any subset may be missing. Missing values, NaN
/// and infinities are all represented as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TripRecord {
    pub fare_amount: Option<f64>,
    pub trip_distance: Option<f64>,
    pub payment_type: Option<i64>,
    pub tip_amount: Option<f64>,
    pub extra: Option<f64>,
}

impl TripRecord {
    /// Build a record from raw column values, mapping non-finite amounts to `None`
    pub fn from_raw(
        fare_amount: Option<f64>,
        trip_distance: Option<f64>,
        payment_type: Option<i64>,
        tip_amount: Option<f64>,
        extra: Option<f64>,
    ) -> Self {
        Self {
            fare_amount: known(fare_amount),
            trip_distance: known(trip_distance),
            payment_type,
            tip_amount: known(tip_amount),
            extra: known(extra),
        }
    }

    /// Trip distance, only when it is usable as a divisor
    pub fn positive_distance(&self) -> Option<f64> {
        self.trip_distance.filter(|d| *d > 0.0)
    }

    /// Payment bucket of this trip, `None` for codes outside 1-6
    pub fn payment(&self) -> Option<PaymentType> {
        self.payment_type.and_then(PaymentType::from_code)
    }
}

/// Treat NaN and infinities as missing values
pub fn known(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Payment code stored as a float column
///
/// Only whole numbers are codes; `1.5` matches no bucket rather than being
/// truncated into one.
pub fn payment_code(value: Option<f64>) -> Option<i64> {
    known(value)
        .filter(|v| v.fract() == 0.0 && v.abs() <= i64::MAX as f64)
        .map(|v| v as i64)
}

/// Ratio metrics averaged over their own eligible records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// fare_amount / trip_distance
    PricePerMile,
    /// (tip_amount + extra) / trip_distance
    CustomIndicator,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::PricePerMile, Metric::CustomIndicator];

    /// Value this record contributes to the metric, `None` if it is not eligible
    pub fn sample(self, record: &TripRecord) -> Option<f64> {
        let distance = record.positive_distance()?;
        match self {
            Metric::PricePerMile => known(record.fare_amount).map(|fare| fare / distance),
            Metric::CustomIndicator => {
                let tip = known(record.tip_amount)?;
                let extra = known(record.extra)?;
                Some((tip + extra) / distance)
            }
        }
    }

    /// Field name of the metric in the KPI document
    pub fn field_name(self) -> &'static str {
        match self {
            Metric::PricePerMile => "average_price_per_mile",
            Metric::CustomIndicator => "average_custom_indicator",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::PricePerMile => write!(f, "average price per mile"),
            Metric::CustomIndicator => write!(f, "average custom indicator"),
        }
    }
}

/// Payment method buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentType {
    CreditCard,
    Cash,
    NoCharge,
    Dispute,
    Unknown,
    VoidedTrip,
}

impl PaymentType {
    pub const ALL: [PaymentType; 6] = [
        PaymentType::CreditCard,
        PaymentType::Cash,
        PaymentType::NoCharge,
        PaymentType::Dispute,
        PaymentType::Unknown,
        PaymentType::VoidedTrip,
    ];

    /// Map a payment code to its bucket; other codes belong to no bucket
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            payment_codes::CREDIT_CARD => Some(PaymentType::CreditCard),
            payment_codes::CASH => Some(PaymentType::Cash),
            payment_codes::NO_CHARGE => Some(PaymentType::NoCharge),
            payment_codes::DISPUTE => Some(PaymentType::Dispute),
            payment_codes::UNKNOWN => Some(PaymentType::Unknown),
            payment_codes::VOIDED_TRIP => Some(PaymentType::VoidedTrip),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            PaymentType::CreditCard => payment_codes::CREDIT_CARD,
            PaymentType::Cash => payment_codes::CASH,
            PaymentType::NoCharge => payment_codes::NO_CHARGE,
            PaymentType::Dispute => payment_codes::DISPUTE,
            PaymentType::Unknown => payment_codes::UNKNOWN,
            PaymentType::VoidedTrip => payment_codes::VOIDED_TRIP,
        }
    }

    /// Position of the bucket in a frequency table
    pub fn index(self) -> usize {
        (self.code() - 1) as usize
    }
}

/// KPI document persisted once per run
///
/// Field order and names match the published document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiResult {
    pub average_price_per_mile: f64,
    pub credit_card_freq: u64,
    pub cash_freq: u64,
    pub no_charge_freq: u64,
    pub dispute_freq: u64,
    pub unknown_freq: u64,
    pub voided_trip_freq: u64,
    pub average_custom_indicator: f64,
}

impl KpiResult {
    /// Count of trips in the given payment bucket
    pub fn frequency(&self, payment: PaymentType) -> u64 {
        match payment {
            PaymentType::CreditCard => self.credit_card_freq,
            PaymentType::Cash => self.cash_freq,
            PaymentType::NoCharge => self.no_charge_freq,
            PaymentType::Dispute => self.dispute_freq,
            PaymentType::Unknown => self.unknown_freq,
            PaymentType::VoidedTrip => self.voided_trip_freq,
        }
    }

    /// Sum of all payment buckets
    pub fn classified_trips(&self) -> u64 {
        PaymentType::ALL.iter().map(|p| self.frequency(*p)).sum()
    }
}

/// Date of the batch being processed, always `YYYY-MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunDate(NaiveDate);

impl RunDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in the local time zone
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Parse a `YYYY-MM-DD` date, rejecting other shapes and impossible dates
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || KpiError::InvalidDate {
            value: value.to_string(),
        };

        if !date_pattern().is_match(value) {
            return Err(invalid());
        }

        NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map(Self)
            .map_err(|_| invalid())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// `YYYYMMDD`, as used in the KPI document file name
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }
}

impl fmt::Display for RunDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for RunDate {
    type Err = KpiError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DATE_PATTERN).expect("date pattern is a valid regex"))
}

/// Processing statistics
#[derive(Debug, Clone)]
pub struct RunStats {
    pub date: RunDate,
    pub records_read: usize,
    pub price_per_mile_eligible: u64,
    pub custom_indicator_eligible: u64,
    pub unclassified_payments: u64,
    pub output_path: PathBuf,
    pub log_path: PathBuf,
    pub processing_time_ms: u128,
}
