//! Aggregate metric envelope
//!
//! Every number the pipeline emits travels inside an [`AggregateMetric`]:
//! the value plus the sample it was computed from, what was excluded and why,
//! and where the data came from. Sample size is derived from the group size
//! and the exclusion tally at construction, so
//! `sample_size + excluded_count == group_size` holds for every instance.

use crate::format::serialize_fixed_opt;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Why a row was left out of one metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Field required by the metric is absent
    MissingValue,
    /// Field failed validation (unparseable or out of range)
    InvalidValue,
    /// Zero value excluded by the zero policy
    ZeroValue,
    /// Issue or completion date absent
    MissingDate,
    /// Completion date earlier than issue date
    NegativeDuration,
}

impl ExclusionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExclusionReason::MissingValue => "missing_value",
            ExclusionReason::InvalidValue => "invalid_value",
            ExclusionReason::ZeroValue => "zero_value",
            ExclusionReason::MissingDate => "missing_date",
            ExclusionReason::NegativeDuration => "negative_duration",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit attached to a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    /// Number of permits (or distinct values)
    Count,
    /// US dollars
    Usd,
    /// Calendar days
    Days,
    /// Percentage 0-100
    Percent,
    /// Dwelling / licensed units
    Units,
}

impl MetricUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricUnit::Count => "count",
            MetricUnit::Usd => "usd",
            MetricUnit::Days => "days",
            MetricUnit::Percent => "percent",
            MetricUnit::Units => "units",
        }
    }
}

/// Ordered (field, value) pairs identifying one aggregation group
///
/// Ordering compares values field by field, so groups of one report sort
/// alphabetically by their labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    parts: Vec<(String, String)>,
}

impl GroupKey {
    pub fn new(parts: Vec<(String, String)>) -> Self {
        Self { parts }
    }

    /// Key of the single all-rows group
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parts(&self) -> &[(String, String)] {
        &self.parts
    }

    /// Label for one field of the key
    pub fn value_of(&self, field: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return f.write_str("All");
        }
        let labels: Vec<&str> = self.parts.iter().map(|(_, v)| v.as_str()).collect();
        f.write_str(&labels.join(" / "))
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One computed number with its provenance envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateMetric {
    pub metric_name: String,
    /// `None` when no row survived exclusions (mean of nothing)
    #[serde(serialize_with = "serialize_fixed_opt")]
    pub value: Option<f64>,
    pub unit: MetricUnit,
    pub group_key: GroupKey,
    /// Rows in the group before exclusions
    pub group_size: usize,
    /// Rows actually used
    pub sample_size: usize,
    pub excluded_count: usize,
    /// Reasons present in `exclusions`, `;`-joined
    pub exclusion_reason: Option<String>,
    pub exclusions: BTreeMap<ExclusionReason, usize>,
    pub source_file: String,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
}

impl AggregateMetric {
    /// Build a metric, deriving sample size from the exclusion tally
    ///
    /// Exclusions exceeding the group size are a caller bug; the sample size
    /// saturates at zero rather than underflowing.
    pub fn new(
        metric_name: impl Into<String>,
        unit: MetricUnit,
        group_key: GroupKey,
        group_size: usize,
        exclusions: BTreeMap<ExclusionReason, usize>,
        value: Option<f64>,
    ) -> Self {
        let exclusions: BTreeMap<ExclusionReason, usize> =
            exclusions.into_iter().filter(|(_, n)| *n > 0).collect();
        let excluded_count: usize = exclusions.values().sum();
        debug_assert!(excluded_count <= group_size);

        let exclusion_reason = if exclusions.is_empty() {
            None
        } else {
            let names: Vec<&str> = exclusions.keys().map(|r| r.as_str()).collect();
            Some(names.join(";"))
        };

        Self {
            metric_name: metric_name.into(),
            value,
            unit,
            group_key,
            group_size,
            sample_size: group_size.saturating_sub(excluded_count),
            excluded_count,
            exclusion_reason,
            exclusions,
            source_file: String::new(),
            date_range_start: None,
            date_range_end: None,
        }
    }

    /// Attach source file and issue-date range
    pub fn with_provenance(
        mut self,
        source_file: &str,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> Self {
        self.source_file = source_file.to_string();
        if let Some((start, end)) = date_range {
            self.date_range_start = Some(start);
            self.date_range_end = Some(end);
        }
        self
    }

    /// `sample_size + excluded_count == group_size`
    pub fn is_conserved(&self) -> bool {
        self.sample_size + self.excluded_count == self.group_size
    }

    /// Rows excluded for one reason
    pub fn excluded_for(&self, reason: ExclusionReason) -> usize {
        self.exclusions.get(&reason).copied().unwrap_or(0)
    }
}
