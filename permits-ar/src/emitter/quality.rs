//! Quality report (JSON audit document)
//!
//! Carries everything a reader needs to trust the numbers: which exact files
//! were read, how the rows validated and mapped, what was scoped out, and the
//! full envelope of every metric under a fully qualified name.

use crate::mapper::MappingCoverage;
use crate::validator::ValidationReport;
use chrono::NaiveDate;
use permits_common::config::ZeroPolicy;
use permits_common::fingerprint::SourceFingerprint;
use permits_common::models::AggregateMetric;
use serde::Serialize;
use std::collections::BTreeMap;

/// Producer identity (no build hash or timestamp: outputs depend on inputs only)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Effective settings of the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSettings {
    pub as_of: Option<NaiveDate>,
    pub stale_after_days: i64,
    pub zero_policy: ZeroPolicy,
    pub window_since: Option<NaiveDate>,
    pub window_until: Option<NaiveDate>,
    pub top_n: usize,
}

/// Rows left out of aggregation by run scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeSummary {
    pub total_rows: usize,
    pub in_scope_rows: usize,
    pub outside_date_window: usize,
}

/// One emitted report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub name: String,
    pub file: String,
    pub group_by: Vec<String>,
    pub metrics: Vec<String>,
    pub groups: usize,
}

/// Rules source identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulesSummary {
    #[serde(flatten)]
    pub fingerprint: SourceFingerprint,
    pub rule_count: usize,
}

/// The `quality_report.json` document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub run_id: String,
    pub tool: ToolInfo,
    pub source: SourceFingerprint,
    pub rules: RulesSummary,
    pub settings: RunSettings,
    pub validation: ValidationReport,
    pub mapping: MappingCoverage,
    pub scope: ScopeSummary,
    pub reports: Vec<ReportSummary>,
    /// `<report>.<metric>[<field>=<label>|...]` → envelope
    pub metrics: BTreeMap<String, AggregateMetric>,
}

/// Fully qualified metric name
///
/// The group is spelled as `field=label` pairs with `\`, `=`, `|` and `]`
/// escaped, so distinct groups never share a name.
pub fn qualified_name(report: &str, metric: &AggregateMetric) -> String {
    let group: Vec<String> = metric
        .group_key
        .parts()
        .iter()
        .map(|(field, label)| format!("{}={}", escape_label(field), escape_label(label)))
        .collect();
    format!("{}.{}[{}]", report, metric.metric_name, group.join("|"))
}

fn escape_label(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '=' | '|' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Index every metric of every report by qualified name
pub fn metrics_map(reports: &[(&str, &[AggregateMetric])]) -> BTreeMap<String, AggregateMetric> {
    let mut map = BTreeMap::new();
    for (report, metrics) in reports {
        for metric in metrics.iter() {
            map.insert(qualified_name(report, metric), metric.clone());
        }
    }
    map
}

/// Pretty JSON with a trailing newline
pub fn to_json_bytes<T: Serialize>(document: &T) -> permits_common::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(document)?;
    bytes.push(b'\n');
    Ok(bytes)
}
