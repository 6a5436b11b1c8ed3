//! Report definitions
//!
//! A report is a named (group fields, metrics, optional ranking) triple.
//! The standard set covers the category summary, use-case analysis, top
//! applicants, neighborhoods, yearly volume, abandonment and mapping
//! coverage. A `[[reports]]` list in the TOML config replaces it.

use crate::aggregator::{GroupField, MetricSpec};
use crate::error::{AnalysisError, Result};
use permits_common::config::ReportConfig;

/// File stem of the long-format metrics CSV
pub const LONG_REPORT_STEM: &str = "metrics_long";

/// One report to compute and emit
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDefinition {
    /// File stem of the per-report CSV
    pub name: String,
    pub group_by: Vec<GroupField>,
    pub metrics: Vec<MetricSpec>,
    /// Metric name ordering groups (highest first)
    pub rank_by: Option<String>,
    pub limit: Option<usize>,
}

impl ReportDefinition {
    /// Build from string forms, validating every name
    pub fn parse(
        name: &str,
        group_by: &[&str],
        metrics: &[&str],
        rank_by: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Self> {
        let invalid = |message: String| AnalysisError::Report {
            report: name.to_string(),
            message,
        };

        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid(
                "name must be non-empty and use only letters, digits, '_' or '-'".to_string(),
            ));
        }
        if name == LONG_REPORT_STEM {
            return Err(invalid(format!("'{}' is reserved", LONG_REPORT_STEM)));
        }

        let group_by = group_by
            .iter()
            .map(|g| g.parse::<GroupField>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| invalid(e.to_string()))?;
        let metrics = metrics
            .iter()
            .map(|m| m.parse::<MetricSpec>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| invalid(e.to_string()))?;
        if metrics.is_empty() {
            return Err(invalid("no metrics".to_string()));
        }

        if let Some(rank_by) = rank_by {
            if !metrics.iter().any(|m| m.name() == rank_by) {
                return Err(invalid(format!(
                    "rank_by '{}' is not one of the report's metrics",
                    rank_by
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            group_by,
            metrics,
            rank_by: rank_by.map(str::to_string),
            limit,
        })
    }

    /// Build from a `[[reports]]` entry
    pub fn from_config(config: &ReportConfig) -> Result<Self> {
        let group_by: Vec<&str> = config.group_by.iter().map(String::as_str).collect();
        let metrics: Vec<&str> = config.metrics.iter().map(String::as_str).collect();
        Self::parse(
            &config.name,
            &group_by,
            &metrics,
            config.rank_by.as_deref(),
            config.limit,
        )
    }
}

/// The standard report set; `top_n` limits the applicant ranking
pub fn standard_reports(top_n: usize) -> Result<Vec<ReportDefinition>> {
    Ok(vec![
        ReportDefinition::parse(
            "category_summary",
            &["category", "sub_category"],
            &[
                "count",
                "share",
                "sum:value",
                "mean:value",
                "median:value",
                "sum:total_fees",
                "mean:total_fees",
                "processing:mean",
                "processing:median",
                "rate:completed",
            ],
            Some("count"),
            None,
        )?,
        ReportDefinition::parse(
            "use_case_analysis",
            &["sub_category", "use_case"],
            &[
                "count",
                "share",
                "sum:value",
                "mean:value",
                "median:value",
                "mean:total_fees",
                "processing:mean",
                "processing:median",
                "processing:p90",
                "distinct:applicant",
            ],
            Some("count"),
            None,
        )?,
        ReportDefinition::parse(
            "top_applicants",
            &["applicant", "applicant_type"],
            &[
                "count",
                "sum:value",
                "mean:value",
                "sum:total_fees",
                "distinct:sub_category",
                "distinct:neighborhood",
                "rate:completed",
                "processing:median",
            ],
            Some("count"),
            Some(top_n),
        )?,
        ReportDefinition::parse(
            "neighborhoods",
            &["neighborhood"],
            &[
                "count",
                "share",
                "sum:value",
                "mean:value",
                "distinct:applicant",
                "processing:median",
            ],
            Some("count"),
            None,
        )?,
        ReportDefinition::parse(
            "yearly_volume",
            &["issue_year"],
            &[
                "count",
                "sum:value",
                "sum:total_fees",
                "sum:dwelling_units_new",
                "processing:mean",
                "rate:completed",
            ],
            None,
            None,
        )?,
        ReportDefinition::parse(
            "abandonment",
            &["sub_category", "use_case"],
            &[
                "count",
                "rate:completed",
                "rate:active",
                "rate:abandoned",
                "rate:stale",
                "rate:status=Cancelled",
                "rate:status=Withdrawn",
            ],
            Some("count"),
            None,
        )?,
        ReportDefinition::parse(
            "mapping_coverage",
            &["match_basis", "category", "sub_category"],
            &["count", "share"],
            None,
            None,
        )?,
    ])
}

/// Reports from config, or the standard set when none are configured
pub fn resolve_reports(configured: &[ReportConfig], top_n: usize) -> Result<Vec<ReportDefinition>> {
    if configured.is_empty() {
        return standard_reports(top_n);
    }

    let mut reports = Vec::with_capacity(configured.len());
    for config in configured {
        let report = ReportDefinition::from_config(config)?;
        if reports.iter().any(|r: &ReportDefinition| r.name == report.name) {
            return Err(AnalysisError::Report {
                report: report.name,
                message: "duplicate report name".to_string(),
            });
        }
        reports.push(report);
    }
    Ok(reports)
}
