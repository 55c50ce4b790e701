//! Single-pass KPI aggregation over trip records
//!
//! Each ratio metric keeps its own running sum and eligible count, so a record
//! that is unusable for one metric still contributes to the others. The
//! payment distribution is an unconditional classification of every record.
//! Averages are divided once, after the pass.

use crate::config::EmptyMetricPolicy;
use crate::error::{KpiError, Result};
use crate::models::{KpiResult, Metric, PaymentType, TripRecord};
use tracing::{debug, warn};

/// Running sum and count of one ratio metric
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatioMean {
    sum: f64,
    count: u64,
}

impl RatioMean {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &RatioMean) {
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the accumulated values, `None` when nothing was eligible
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Trip counts per payment bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentDistribution {
    counts: [u64; 6],
    unclassified: u64,
}

impl PaymentDistribution {
    /// Count one trip; codes outside 1-6 (or missing) land in no bucket
    pub fn record(&mut self, code: Option<i64>) {
        match code.and_then(PaymentType::from_code) {
            Some(payment) => self.counts[payment.index()] += 1,
            None => self.unclassified += 1,
        }
    }

    pub fn merge(&mut self, other: &PaymentDistribution) {
        for (count, other) in self.counts.iter_mut().zip(other.counts.iter()) {
            *count += other;
        }
        self.unclassified += other.unclassified;
    }

    pub fn count(&self, payment: PaymentType) -> u64 {
        self.counts[payment.index()]
    }

    /// Trips whose payment code matched no bucket
    pub fn unclassified(&self) -> u64 {
        self.unclassified
    }
}

/// Accumulators for one aggregation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiAccumulator {
    price_per_mile: RatioMean,
    custom_indicator: RatioMean,
    payments: PaymentDistribution,
    records_seen: u64,
}

impl KpiAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one record through every metric gate
    pub fn push(&mut self, record: &TripRecord) {
        self.records_seen += 1;

        if let Some(value) = Metric::PricePerMile.sample(record) {
            self.price_per_mile.add(value);
        }

        self.payments.record(record.payment_type);

        if let Some(value) = Metric::CustomIndicator.sample(record) {
            self.custom_indicator.add(value);
        }
    }

    /// Feed every record of a sequence
    pub fn extend<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a TripRecord>,
    {
        for record in records {
            self.push(record);
        }
    }

    /// Combine with the accumulator of another partition
    pub fn merge(&mut self, other: &KpiAccumulator) {
        self.price_per_mile.merge(&other.price_per_mile);
        self.custom_indicator.merge(&other.custom_indicator);
        self.payments.merge(&other.payments);
        self.records_seen += other.records_seen;
    }

    pub fn metric(&self, metric: Metric) -> &RatioMean {
        match metric {
            Metric::PricePerMile => &self.price_per_mile,
            Metric::CustomIndicator => &self.custom_indicator,
        }
    }

    pub fn eligible(&self, metric: Metric) -> u64 {
        self.metric(metric).count()
    }

    pub fn payments(&self) -> &PaymentDistribution {
        &self.payments
    }

    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    /// Build the KPI document, failing if any average has no eligible records
    pub fn finish(&self) -> Result<KpiResult> {
        self.finish_with(EmptyMetricPolicy::Fail)
    }

    /// Build the KPI document, applying `policy` to averages with no eligible records
    pub fn finish_with(&self, policy: EmptyMetricPolicy) -> Result<KpiResult> {
        let empty: Vec<Metric> = Metric::ALL
            .into_iter()
            .filter(|m| self.eligible(*m) == 0)
            .collect();

        if !empty.is_empty() {
            match policy {
                EmptyMetricPolicy::Fail => {
                    return Err(KpiError::EmptyEligibleSet { metrics: empty });
                }
                EmptyMetricPolicy::Zero => {
                    for metric in &empty {
                        warn!("No eligible records for {}, writing 0.0", metric);
                    }
                }
            }
        }

        debug!(
            "Aggregated {} records: {} price-per-mile eligible, {} custom-indicator eligible, {} unclassified payments",
            self.records_seen,
            self.price_per_mile.count(),
            self.custom_indicator.count(),
            self.payments.unclassified()
        );

        Ok(KpiResult {
            average_price_per_mile: self.price_per_mile.mean().unwrap_or(0.0),
            credit_card_freq: self.payments.count(PaymentType::CreditCard),
            cash_freq: self.payments.count(PaymentType::Cash),
            no_charge_freq: self.payments.count(PaymentType::NoCharge),
            dispute_freq: self.payments.count(PaymentType::Dispute),
            unknown_freq: self.payments.count(PaymentType::Unknown),
            voided_trip_freq: self.payments.count(PaymentType::VoidedTrip),
            average_custom_indicator: self.custom_indicator.mean().unwrap_or(0.0),
        })
    }
}

/// Run the aggregation pass over a sequence of records
pub fn accumulate<'a, I>(records: I) -> KpiAccumulator
where
    I: IntoIterator<Item = &'a TripRecord>,
{
    let mut accumulator = KpiAccumulator::new();
    accumulator.extend(records);
    accumulator
}

/// Compute the KPI document for a sequence of records
pub fn compute<'a, I>(records: I) -> Result<KpiResult>
where
    I: IntoIterator<Item = &'a TripRecord>,
{
    accumulate(records).finish()
}
