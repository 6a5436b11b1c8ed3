//! Report Emitter
//!
//! Writes aggregated metrics to the output directory. Serialization only:
//! nothing is recomputed, filtered or reordered here.
//!
//! # Files
//!
//! - `<report>.csv`: wide format, one row per group
//! - `metrics_long.csv`: one row per metric across all reports
//! - `quality_report.json`: run identity, validation, mapping, scope, metrics
//! - `validation_report.json`: written by the `validate` command
//!
//! Files are written to `<name>.tmp` and renamed into place, so a reader
//! never sees a half-written report.

pub mod quality;
pub mod tabular;

pub use quality::{QualityReport, ReportSummary, RulesSummary, RunSettings, ScopeSummary, ToolInfo};

use crate::aggregator::MetricSpec;
use crate::reports::{ReportDefinition, LONG_REPORT_STEM};
use crate::validator::ValidationReport;
use permits_common::models::AggregateMetric;
use permits_common::Result;
use std::path::PathBuf;
use tracing::{debug, info};

pub const QUALITY_REPORT_FILE: &str = "quality_report.json";
pub const VALIDATION_REPORT_FILE: &str = "validation_report.json";

/// Output format of one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    WideCsv,
    LongCsv,
    Json,
}

/// Writes report artifacts into one directory
pub struct ReportEmitter {
    output_dir: PathBuf,
}

impl ReportEmitter {
    /// Create the emitter, creating the directory if needed
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Serialize one report's metrics in `format` and write it
    pub fn emit(
        &self,
        report: &ReportDefinition,
        metrics: &[AggregateMetric],
        format: OutputFormat,
    ) -> Result<PathBuf> {
        match format {
            OutputFormat::WideCsv => self.emit_wide(report, metrics),
            OutputFormat::LongCsv => self.emit_long(&[(report.name.as_str(), metrics)]),
            OutputFormat::Json => {
                let map = quality::metrics_map(&[(report.name.as_str(), metrics)]);
                self.write(&format!("{}.json", report.name), &quality::to_json_bytes(&map)?)
            }
        }
    }

    /// `<report>.csv`
    pub fn emit_wide(&self, report: &ReportDefinition, metrics: &[AggregateMetric]) -> Result<PathBuf> {
        let group_columns: Vec<&str> = report.group_by.iter().map(|g| g.as_str()).collect();
        let metric_names = wide_metric_names(report, metrics);
        let bytes = tabular::wide_csv(&group_columns, &metric_names, metrics)?;
        self.write(&format!("{}.csv", report.name), &bytes)
    }

    /// `metrics_long.csv`
    pub fn emit_long(&self, reports: &[(&str, &[AggregateMetric])]) -> Result<PathBuf> {
        let bytes = tabular::long_csv(reports)?;
        self.write(&format!("{}.csv", LONG_REPORT_STEM), &bytes)
    }

    /// `quality_report.json`
    pub fn emit_quality(&self, report: &QualityReport) -> Result<PathBuf> {
        self.write(QUALITY_REPORT_FILE, &quality::to_json_bytes(report)?)
    }

    /// `validation_report.json`
    pub fn emit_validation(&self, report: &ValidationReport) -> Result<PathBuf> {
        self.write(VALIDATION_REPORT_FILE, &quality::to_json_bytes(report)?)
    }

    fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let tmp = self.output_dir.join(format!("{}.tmp", file_name));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Metric columns of a wide report, in emitted order
///
/// Taken from the first group so zero-policy companions appear where the
/// aggregator put them; falls back to the report definition when empty.
fn wide_metric_names(report: &ReportDefinition, metrics: &[AggregateMetric]) -> Vec<String> {
    match metrics.first() {
        Some(first) => metrics
            .iter()
            .take_while(|m| m.group_key == first.group_key)
            .map(|m| m.metric_name.clone())
            .collect(),
        None => report.metrics.iter().map(MetricSpec::name).collect(),
    }
}

/// Log a one-line summary of written files
pub fn log_written(paths: &[PathBuf]) {
    for path in paths {
        info!("Wrote {}", path.display());
    }
}
