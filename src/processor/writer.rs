//! Output sinks for KPI runs
//!
//! Writes the KPI document as an indented JSON object and appends one line per
//! successful run to the run log. The document goes through a temporary
//! sibling file and a rename so a failed write never leaves a partial file.

use crate::config::KpiConfig;
use crate::error::{KpiError, Result};
use crate::models::{KpiResult, Metric, RunDate};

use serde::Serialize;
use serde::ser::Error as _;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Writer for the per-date KPI document
#[derive(Debug, Clone)]
pub struct KpiWriter {
    output_dir: PathBuf,
    config: KpiConfig,
}

impl KpiWriter {
    pub fn new(output_dir: PathBuf, config: KpiConfig) -> Self {
        Self { output_dir, config }
    }

    /// Path the document for a date is written to
    pub fn path_for(&self, date: &RunDate) -> PathBuf {
        self.config.output_path(&self.output_dir, date)
    }

    /// Serialize a KPI document with the configured indentation
    ///
    /// JSON has no representation for NaN or infinities, so a non-finite
    /// average is rejected instead of being written as `null`.
    pub fn render(&self, result: &KpiResult) -> Result<Vec<u8>> {
        for (metric, value) in [
            (Metric::PricePerMile, result.average_price_per_mile),
            (Metric::CustomIndicator, result.average_custom_indicator),
        ] {
            if !value.is_finite() {
                return Err(serde_json::Error::custom(format!(
                    "{} is not a finite number ({})",
                    metric.field_name(),
                    value
                ))
                .into());
            }
        }

        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(self.config.json_indent.as_bytes());
        let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
        result.serialize(&mut serializer)?;
        Ok(buffer)
    }

    /// Write the document for a date, replacing any previous one
    pub async fn write(&self, date: &RunDate, result: &KpiResult) -> Result<PathBuf> {
        let path = self.path_for(date);
        let contents = self.render(result)?;

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| KpiError::sink(&self.output_dir, e))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &contents)
            .await
            .map_err(|e| KpiError::sink(&temp_path, e))?;

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(KpiError::sink(&path, e));
        }

        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(path)
    }
}

/// Append-only log of completed runs
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log line for a processed date and its source file
    pub fn entry(date: &RunDate, source_file: &str) -> String {
        format!(
            "{}: The KPIs for the file {} have been computed\n",
            date, source_file
        )
    }

    /// Append the entry for a run, creating the log if needed
    pub async fn append(&self, date: &RunDate, source_file: &str) -> Result<()> {
        let line = Self::entry(date, source_file);

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| KpiError::sink(&self.path, e))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| KpiError::sink(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| KpiError::sink(&self.path, e))?;

        debug!("Appended run entry to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_result() -> KpiResult {
        KpiResult {
            average_price_per_mile: 2.0,
            credit_card_freq: 1,
            cash_freq: 1,
            no_charge_freq: 0,
            dispute_freq: 0,
            unknown_freq: 0,
            voided_trip_freq: 0,
            average_custom_indicator: 0.6333333333333333,
        }
    }

    fn date() -> RunDate {
        RunDate::parse("2023-01-01").unwrap()
    }

    #[test]
    fn test_render_layout() {
        let writer = KpiWriter::new(PathBuf::from("out"), KpiConfig::default());
        let rendered = String::from_utf8(writer.render(&sample_result()).unwrap()).unwrap();

        let expected = r#"{
    "average_price_per_mile": 2.0,
    "credit_card_freq": 1,
    "cash_freq": 1,
    "no_charge_freq": 0,
    "dispute_freq": 0,
    "unknown_freq": 0,
    "voided_trip_freq": 0,
    "average_custom_indicator": 0.6333333333333333
}"#;
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_round_trip() {
        let writer = KpiWriter::new(PathBuf::from("out"), KpiConfig::default());
        let result = KpiResult {
            average_price_per_mile: 7.123456789012345,
            credit_card_freq: 2_345_678,
            cash_freq: 456_789,
            no_charge_freq: 12_345,
            dispute_freq: 6_789,
            unknown_freq: 3,
            voided_trip_freq: 1,
            average_custom_indicator: 1.0 / 3.0,
        };

        let parsed: KpiResult = serde_json::from_slice(&writer.render(&result).unwrap()).unwrap();

        assert!((parsed.average_price_per_mile - result.average_price_per_mile).abs() < 1e-12);
        assert!((parsed.average_custom_indicator - result.average_custom_indicator).abs() < 1e-12);
        assert_eq!(parsed.credit_card_freq, result.credit_card_freq);
        assert_eq!(parsed.cash_freq, result.cash_freq);
        assert_eq!(parsed.no_charge_freq, result.no_charge_freq);
        assert_eq!(parsed.dispute_freq, result.dispute_freq);
        assert_eq!(parsed.unknown_freq, result.unknown_freq);
        assert_eq!(parsed.voided_trip_freq, result.voided_trip_freq);
    }

    #[tokio::test]
    async fn test_non_finite_average_is_not_written() {
        let temp_dir = TempDir::new().unwrap();
        let writer = KpiWriter::new(temp_dir.path().to_path_buf(), KpiConfig::default());
        let result = KpiResult {
            average_price_per_mile: f64::INFINITY,
            ..sample_result()
        };

        match writer.write(&date(), &result).await {
            Err(KpiError::Serialization(e)) => {
                assert!(e.to_string().contains("average_price_per_mile"), "{}", e);
            }
            other => panic!("Expected Serialization error, got {:?}", other),
        }
        assert!(!writer.path_for(&date()).exists());
    }

    #[tokio::test]
    async fn test_write_creates_output_directory() {
        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("nested").join("out");
        let writer = KpiWriter::new(output_dir.clone(), KpiConfig::default());

        let path = writer.write(&date(), &sample_result()).await.unwrap();

        assert_eq!(path, output_dir.join("20230101_yellow_taxi_kpis.json"));
        let parsed: KpiResult = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.credit_card_freq, 1);
        assert!((parsed.average_custom_indicator - 0.6333333333333333).abs() < 1e-12);
        assert!(!output_dir.join("20230101_yellow_taxi_kpis.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_into_file_path_is_sink_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let writer = KpiWriter::new(blocker, KpiConfig::default());
        let result = writer.write(&date(), &sample_result()).await;

        assert!(matches!(result, Err(KpiError::Sink { .. })));
    }

    #[tokio::test]
    async fn test_run_log_appends() {
        let temp_dir = TempDir::new().unwrap();
        let log = RunLog::new(temp_dir.path().join("log.txt"));
        let second = RunDate::parse("2023-01-02").unwrap();

        log.append(&date(), "yellow_tripdata_2023-01-01.parquet").await.unwrap();
        log.append(&second, "yellow_tripdata_2023-01-02.parquet").await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            contents,
            "2023-01-01: The KPIs for the file yellow_tripdata_2023-01-01.parquet have been computed\n\
             2023-01-02: The KPIs for the file yellow_tripdata_2023-01-02.parquet have been computed\n"
        );
    }
}
