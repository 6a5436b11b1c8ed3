//! Metrics Aggregator
//!
//! Groups mapped records and computes metrics with explicit sample-size and
//! exclusion accounting.
//!
//! # Architecture
//!
//! - [`GroupField`]: what a record is grouped by (labels, never fuzzy-merged)
//! - [`MetricSpec`]: what is computed per group, parsed from a compact
//!   string form (`count`, `median:value`, `processing:p90`, `rate:stale`)
//! - [`aggregate`]: one pass per group, groups in key order, metrics in
//!   request order
//! - [`parallel`]: the same computation split by the first group field and
//!   run on the blocking pool
//!
//! Every metric is built through [`AggregateMetric::new`], which derives the
//! sample size from the exclusion tally, so
//! `sample_size + excluded_count == group_size` cannot be violated here.

pub mod parallel;
pub mod ranking;
pub mod stats;

use crate::applicant::ApplicantType;
use chrono::{Datelike, NaiveDate};
use permits_common::config::ZeroPolicy;
use permits_common::models::{
    AggregateMetric, ExclusionReason, GroupKey, MappedRecord, MetricUnit, PermitField,
    PermitStatus, StatusClass,
};
use permits_common::time::{days_between, year_month};
use permits_common::Error;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Label for a missing non-classification value
pub const UNKNOWN_LABEL: &str = "Unknown";

// ============================================================================
// Group fields
// ============================================================================

/// Field a report groups by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupField {
    Category,
    SubCategory,
    UseCase,
    Applicant,
    ApplicantType,
    Neighborhood,
    Ward,
    PermitType,
    WorkType,
    Status,
    StatusClass,
    IssueYear,
    IssueMonth,
    MatchBasis,
}

impl GroupField {
    pub const ALL: [GroupField; 14] = [
        GroupField::Category,
        GroupField::SubCategory,
        GroupField::UseCase,
        GroupField::Applicant,
        GroupField::ApplicantType,
        GroupField::Neighborhood,
        GroupField::Ward,
        GroupField::PermitType,
        GroupField::WorkType,
        GroupField::Status,
        GroupField::StatusClass,
        GroupField::IssueYear,
        GroupField::IssueMonth,
        GroupField::MatchBasis,
    ];

    /// Column name in reports
    pub fn as_str(self) -> &'static str {
        match self {
            GroupField::Category => "category",
            GroupField::SubCategory => "sub_category",
            GroupField::UseCase => "use_case",
            GroupField::Applicant => "applicant",
            GroupField::ApplicantType => "applicant_type",
            GroupField::Neighborhood => "neighborhood",
            GroupField::Ward => "ward",
            GroupField::PermitType => "permit_type",
            GroupField::WorkType => "work_type",
            GroupField::Status => "status",
            GroupField::StatusClass => "status_class",
            GroupField::IssueYear => "issue_year",
            GroupField::IssueMonth => "issue_month",
            GroupField::MatchBasis => "match_basis",
        }
    }

    /// Present value of the field, `None` when the record lacks it
    ///
    /// Classification fields are always present (`Unmapped` /
    /// `Uncategorized` labels stand in for missing rule output).
    pub fn value(self, mapped: &MappedRecord) -> Option<String> {
        let record = &mapped.record;
        match self {
            GroupField::Category => Some(mapped.category_label().to_string()),
            GroupField::SubCategory => Some(mapped.sub_category_label().to_string()),
            GroupField::UseCase => Some(mapped.use_case_label().to_string()),
            GroupField::Applicant => record.text(PermitField::ApplicantName).map(str::to_string),
            GroupField::ApplicantType => record
                .applicant_name
                .as_deref()
                .map(|name| ApplicantType::classify(name).as_str().to_string()),
            GroupField::Neighborhood => record.text(PermitField::Neighborhood).map(str::to_string),
            GroupField::Ward => record.text(PermitField::Ward).map(str::to_string),
            GroupField::PermitType => record.text(PermitField::PermitType).map(str::to_string),
            GroupField::WorkType => record.text(PermitField::WorkType).map(str::to_string),
            GroupField::Status => record.text(PermitField::Status).map(str::to_string),
            GroupField::StatusClass => record.status.as_ref().map(|s| s.class().as_str().to_string()),
            GroupField::IssueYear => record.issue_date.map(|d| d.year().to_string()),
            GroupField::IssueMonth => record.issue_date.map(year_month),
            GroupField::MatchBasis => Some(mapped.match_basis.as_str().to_string()),
        }
    }

    /// Group label (`Unknown` when absent)
    pub fn label(self, mapped: &MappedRecord) -> String {
        self.value(mapped)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        GroupField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown group field '{}'", s)))
    }
}

/// Group key of a record for a list of fields
pub fn group_key(mapped: &MappedRecord, group_by: &[GroupField]) -> GroupKey {
    GroupKey::new(
        group_by
            .iter()
            .map(|f| (f.as_str().to_string(), f.label(mapped)))
            .collect(),
    )
}

// ============================================================================
// Metric specs
// ============================================================================

/// Numeric column a statistic can be computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    Value,
    TotalFees,
    DwellingUnitsNew,
    DwellingUnitsEliminated,
    LicensedUnits,
}

impl NumericField {
    const ALL: [NumericField; 5] = [
        NumericField::Value,
        NumericField::TotalFees,
        NumericField::DwellingUnitsNew,
        NumericField::DwellingUnitsEliminated,
        NumericField::LicensedUnits,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NumericField::Value => "value",
            NumericField::TotalFees => "total_fees",
            NumericField::DwellingUnitsNew => "dwelling_units_new",
            NumericField::DwellingUnitsEliminated => "dwelling_units_eliminated",
            NumericField::LicensedUnits => "licensed_units",
        }
    }

    pub fn permit_field(self) -> PermitField {
        match self {
            NumericField::Value => PermitField::Value,
            NumericField::TotalFees => PermitField::TotalFees,
            NumericField::DwellingUnitsNew => PermitField::DwellingUnitsNew,
            NumericField::DwellingUnitsEliminated => PermitField::DwellingUnitsEliminated,
            NumericField::LicensedUnits => PermitField::LicensedUnits,
        }
    }

    pub fn unit(self) -> MetricUnit {
        match self {
            NumericField::Value | NumericField::TotalFees => MetricUnit::Usd,
            _ => MetricUnit::Units,
        }
    }

    /// Whether the zero policy applies (currency columns)
    pub fn zero_sensitive(self) -> bool {
        matches!(self, NumericField::Value | NumericField::TotalFees)
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == s)
    }
}

/// Statistic over collected samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Sum,
    Mean,
    Median,
    /// Percentile 1-99
    Percentile(u8),
    Max,
}

impl Statistic {
    fn as_string(self) -> String {
        match self {
            Statistic::Sum => "sum".to_string(),
            Statistic::Mean => "mean".to_string(),
            Statistic::Median => "median".to_string(),
            Statistic::Percentile(p) => format!("p{}", p),
            Statistic::Max => "max".to_string(),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "sum" => Some(Statistic::Sum),
            "mean" => Some(Statistic::Mean),
            "median" => Some(Statistic::Median),
            "max" => Some(Statistic::Max),
            _ => {
                let p: u8 = s.strip_prefix('p')?.parse().ok()?;
                (1..=99).contains(&p).then_some(Statistic::Percentile(p))
            }
        }
    }

    fn compute(self, values: &[f64]) -> Option<f64> {
        match self {
            Statistic::Sum => Some(stats::sum(values)),
            Statistic::Mean => stats::mean(values),
            Statistic::Median => stats::median(values),
            Statistic::Percentile(p) => stats::percentile(values, f64::from(p)),
            Statistic::Max => stats::max(values),
        }
    }
}

/// What a rate counts as a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateTarget {
    Class(StatusClass),
    /// Issued, never completed, older than the stale threshold
    Stale,
    Status(PermitStatus),
}

impl RateTarget {
    fn name(&self) -> String {
        match self {
            RateTarget::Class(class) => class.as_str().to_string(),
            RateTarget::Stale => "stale".to_string(),
            RateTarget::Status(status) => format!(
                "status_{}",
                status.as_str().to_lowercase().replace(' ', "_")
            ),
        }
    }
}

/// One metric requested for every group of a report
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSpec {
    /// Rows in the group
    Count,
    /// Group size as a percentage of all in-scope rows
    Share,
    Numeric { field: NumericField, stat: Statistic },
    /// Mean over non-zero values only
    MeanNonzero(NumericField),
    /// `completeDate - issueDate` in days
    Processing(Statistic),
    Rate(RateTarget),
    Distinct(GroupField),
}

impl MetricSpec {
    /// Column / metric name, e.g. `median_value`, `processing_days_p90`
    pub fn name(&self) -> String {
        match self {
            MetricSpec::Count => "count".to_string(),
            MetricSpec::Share => "share".to_string(),
            MetricSpec::Numeric { field, stat } => {
                format!("{}_{}", stat.as_string(), field.as_str())
            }
            MetricSpec::MeanNonzero(field) => format!("mean_nonzero_{}", field.as_str()),
            MetricSpec::Processing(stat) => format!("processing_days_{}", stat.as_string()),
            MetricSpec::Rate(target) => format!("rate_{}", target.name()),
            MetricSpec::Distinct(field) => format!("distinct_{}", field.as_str()),
        }
    }

    pub fn unit(&self) -> MetricUnit {
        match self {
            MetricSpec::Count | MetricSpec::Distinct(_) => MetricUnit::Count,
            MetricSpec::Share | MetricSpec::Rate(_) => MetricUnit::Percent,
            MetricSpec::Numeric { field, .. } | MetricSpec::MeanNonzero(field) => field.unit(),
            MetricSpec::Processing(_) => MetricUnit::Days,
        }
    }
}

impl fmt::Display for MetricSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for MetricSpec {
    type Err = Error;

    /// Parse `count`, `share`, `<stat>:<field>`, `mean_nonzero:<field>`,
    /// `processing:<stat>`, `rate:<class>`, `rate:status=<Status>`,
    /// `distinct:<group field>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |why: &str| Error::InvalidInput(format!("metric '{}': {}", s, why));

        match s {
            "count" => return Ok(MetricSpec::Count),
            "share" => return Ok(MetricSpec::Share),
            _ => {}
        }

        let (kind, arg) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected <kind>:<argument>"))?;
        let arg = arg.trim();

        match kind.trim() {
            "processing" => match Statistic::parse(arg) {
                Some(Statistic::Sum) | None => Err(invalid("expected mean, median, max or pNN")),
                Some(stat) => Ok(MetricSpec::Processing(stat)),
            },
            "rate" => {
                if let Some(status) = arg.strip_prefix("status=") {
                    return Ok(MetricSpec::Rate(RateTarget::Status(PermitStatus::from_raw(
                        status,
                    ))));
                }
                let target = match arg {
                    "completed" => RateTarget::Class(StatusClass::Completed),
                    "active" => RateTarget::Class(StatusClass::Active),
                    "abandoned" => RateTarget::Class(StatusClass::Abandoned),
                    "stale" => RateTarget::Stale,
                    _ => {
                        return Err(invalid(
                            "expected completed, active, abandoned, stale or status=<Status>",
                        ))
                    }
                };
                Ok(MetricSpec::Rate(target))
            }
            "distinct" => Ok(MetricSpec::Distinct(arg.parse()?)),
            "mean_nonzero" => NumericField::parse(arg)
                .map(MetricSpec::MeanNonzero)
                .ok_or_else(|| invalid("unknown numeric field")),
            stat => {
                let stat = Statistic::parse(stat).ok_or_else(|| invalid("unknown metric kind"))?;
                let field = NumericField::parse(arg).ok_or_else(|| invalid("unknown numeric field"))?;
                Ok(MetricSpec::Numeric { field, stat })
            }
        }
    }
}

// ============================================================================
// Context
// ============================================================================

/// Run-wide inputs to metric computation
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationContext {
    /// Source file name recorded in every metric
    pub source_file: String,
    /// Reference date for stale detection (`None` disables stale matches)
    pub as_of: Option<NaiveDate>,
    pub stale_after_days: i64,
    pub zero_policy: ZeroPolicy,
}

impl AggregationContext {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            as_of: None,
            stale_after_days: 730,
            zero_policy: ZeroPolicy::Include,
        }
    }

    pub fn with_as_of(mut self, as_of: Option<NaiveDate>) -> Self {
        self.as_of = as_of;
        self
    }

    pub fn with_stale_after_days(mut self, days: i64) -> Self {
        self.stale_after_days = days;
        self
    }

    pub fn with_zero_policy(mut self, policy: ZeroPolicy) -> Self {
        self.zero_policy = policy;
        self
    }

    /// Issued, no completion, older than the threshold as of the reference date
    pub fn is_stale(&self, mapped: &MappedRecord) -> bool {
        let record = &mapped.record;
        match (self.as_of, record.issue_date, &record.status) {
            (Some(as_of), Some(issued), Some(PermitStatus::Issued)) => {
                record.complete_date.is_none()
                    && days_between(issued, as_of) > self.stale_after_days
            }
            _ => false,
        }
    }
}

/// Metric list with the zero-policy companions added
///
/// Under [`ZeroPolicy::Include`] every mean over a currency column is
/// followed by its `mean_nonzero_<field>` companion (unless already listed).
pub fn expand_metrics(metrics: &[MetricSpec], policy: ZeroPolicy) -> Vec<MetricSpec> {
    let mut expanded: Vec<MetricSpec> = Vec::with_capacity(metrics.len());
    for spec in metrics {
        if !expanded.contains(spec) {
            expanded.push(spec.clone());
        }
        if let (ZeroPolicy::Include, MetricSpec::Numeric { field, stat: Statistic::Mean }) =
            (policy, spec)
        {
            let companion = MetricSpec::MeanNonzero(*field);
            if field.zero_sensitive() && !metrics.contains(&companion) && !expanded.contains(&companion) {
                expanded.push(companion);
            }
        }
    }
    expanded
}

// ============================================================================
// Aggregation
// ============================================================================

/// Aggregate all rows
pub fn aggregate(
    rows: &[MappedRecord],
    group_by: &[GroupField],
    metrics: &[MetricSpec],
    ctx: &AggregationContext,
) -> Vec<AggregateMetric> {
    let indices: Vec<usize> = (0..rows.len()).collect();
    aggregate_indices(rows, &indices, rows.len(), group_by, metrics, ctx)
}

/// Aggregate the rows at `indices`
///
/// `population` is the number of in-scope rows overall (the `share`
/// denominator), which differs from `indices.len()` for a partition.
/// Output is ordered by group key, then by metric request order.
pub fn aggregate_indices(
    rows: &[MappedRecord],
    indices: &[usize],
    population: usize,
    group_by: &[GroupField],
    metrics: &[MetricSpec],
    ctx: &AggregationContext,
) -> Vec<AggregateMetric> {
    let mut groups: BTreeMap<GroupKey, Vec<&MappedRecord>> = BTreeMap::new();
    for &i in indices {
        if let Some(row) = rows.get(i) {
            groups.entry(group_key(row, group_by)).or_default().push(row);
        }
    }

    let metrics = expand_metrics(metrics, ctx.zero_policy);
    let mut out = Vec::with_capacity(groups.len() * metrics.len());

    for (key, members) in groups {
        let date_range = issue_date_range(&members);
        for spec in &metrics {
            let metric = compute_metric(spec, &key, &members, population, ctx)
                .with_provenance(&ctx.source_file, date_range);
            out.push(metric);
        }
    }
    out
}

fn issue_date_range(members: &[&MappedRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = members.iter().filter_map(|m| m.record.issue_date);
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

/// Compute one metric for one group
pub fn compute_metric(
    spec: &MetricSpec,
    key: &GroupKey,
    members: &[&MappedRecord],
    population: usize,
    ctx: &AggregationContext,
) -> AggregateMetric {
    let group_size = members.len();
    let mut exclusions: BTreeMap<ExclusionReason, usize> = BTreeMap::new();

    let value = match spec {
        MetricSpec::Count => Some(group_size as f64),
        MetricSpec::Share => {
            if population == 0 {
                None
            } else {
                Some(group_size as f64 * 100.0 / population as f64)
            }
        }
        MetricSpec::Numeric { field, stat } => {
            let exclude_zero = ctx.zero_policy == ZeroPolicy::Exclude && field.zero_sensitive();
            let samples = numeric_samples(members, *field, exclude_zero, &mut exclusions);
            stat.compute(&samples)
        }
        MetricSpec::MeanNonzero(field) => {
            let samples = numeric_samples(members, *field, true, &mut exclusions);
            stats::mean(&samples)
        }
        MetricSpec::Processing(stat) => {
            let samples = processing_samples(members, &mut exclusions);
            stat.compute(&samples)
        }
        MetricSpec::Rate(target) => {
            let matches = members
                .iter()
                .filter(|m| rate_matches(target, m, ctx))
                .count();
            if group_size == 0 {
                None
            } else {
                Some(matches as f64 * 100.0 / group_size as f64)
            }
        }
        MetricSpec::Distinct(field) => {
            let mut seen: BTreeSet<String> = BTreeSet::new();
            for member in members {
                match field.value(member) {
                    Some(v) => {
                        seen.insert(v);
                    }
                    None => *exclusions.entry(ExclusionReason::MissingValue).or_default() += 1,
                }
            }
            Some(seen.len() as f64)
        }
    };

    AggregateMetric::new(spec.name(), spec.unit(), key.clone(), group_size, exclusions, value)
}

/// Collect usable values of a numeric field, tallying exclusions
fn numeric_samples(
    members: &[&MappedRecord],
    field: NumericField,
    exclude_zero: bool,
    exclusions: &mut BTreeMap<ExclusionReason, usize>,
) -> Vec<f64> {
    let permit_field = field.permit_field();
    let mut samples = Vec::with_capacity(members.len());

    for member in members {
        let record = &member.record;
        let reason = if record.is_flagged(permit_field) {
            Some(ExclusionReason::InvalidValue)
        } else {
            match record.numeric(permit_field) {
                None => Some(ExclusionReason::MissingValue),
                Some(v) if exclude_zero && v == 0.0 => Some(ExclusionReason::ZeroValue),
                Some(v) => {
                    samples.push(v);
                    None
                }
            }
        };
        if let Some(reason) = reason {
            *exclusions.entry(reason).or_default() += 1;
        }
    }
    samples
}

/// Collect processing durations in days, tallying exclusions
fn processing_samples(
    members: &[&MappedRecord],
    exclusions: &mut BTreeMap<ExclusionReason, usize>,
) -> Vec<f64> {
    let mut samples = Vec::with_capacity(members.len());
    for member in members {
        let record = &member.record;
        match (record.issue_date, record.complete_date) {
            (Some(issued), Some(completed)) => {
                let days = days_between(issued, completed);
                if days < 0 {
                    *exclusions.entry(ExclusionReason::NegativeDuration).or_default() += 1;
                } else {
                    samples.push(days as f64);
                }
            }
            _ => *exclusions.entry(ExclusionReason::MissingDate).or_default() += 1,
        }
    }
    samples
}

fn rate_matches(target: &RateTarget, mapped: &MappedRecord, ctx: &AggregationContext) -> bool {
    match target {
        RateTarget::Class(class) => mapped
            .record
            .status
            .as_ref()
            .map_or(false, |s| s.class() == *class),
        RateTarget::Stale => ctx.is_stale(mapped),
        RateTarget::Status(status) => mapped.record.status.as_ref() == Some(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permits_common::models::{Classification, MatchBasis, PermitRecord};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mapped(sub_category: &str, record: PermitRecord) -> MappedRecord {
        MappedRecord {
            record,
            classification: Classification {
                category: Some("Trades".to_string()),
                sub_category: Some(sub_category.to_string()),
                use_case: None,
            },
            match_basis: MatchBasis::PrimaryField,
            rule_index: Some(0),
        }
    }

    fn ctx() -> AggregationContext {
        AggregationContext::new("test.csv")
    }

    fn find<'a>(metrics: &'a [AggregateMetric], name: &str, group: &str) -> &'a AggregateMetric {
        metrics
            .iter()
            .find(|m| m.metric_name == name && m.group_key.to_string() == group)
            .unwrap_or_else(|| panic!("no {} for {}", name, group))
    }

    #[test]
    fn test_parse_metric_specs() {
        let cases = [
            ("count", "count"),
            ("share", "share"),
            ("sum:value", "sum_value"),
            ("mean:total_fees", "mean_total_fees"),
            ("median:value", "median_value"),
            ("p90:value", "p90_value"),
            ("processing:mean", "processing_days_mean"),
            ("processing:p90", "processing_days_p90"),
            ("rate:completed", "rate_completed"),
            ("rate:stale", "rate_stale"),
            ("rate:status=Stop Work", "rate_status_stop_work"),
            ("distinct:neighborhood", "distinct_neighborhood"),
            ("mean_nonzero:value", "mean_nonzero_value"),
        ];
        for (text, name) in cases {
            let spec: MetricSpec = text.parse().unwrap();
            assert_eq!(spec.name(), name, "{}", text);
        }
    }

    #[test]
    fn test_reject_bad_metric_specs() {
        for text in ["avg:value", "sum:comments", "processing:sum", "rate:maybe", "p100:value", "distinct:x", "sum"] {
            assert!(text.parse::<MetricSpec>().is_err(), "{} accepted", text);
        }
    }

    #[test]
    fn test_parse_group_fields() {
        for field in GroupField::ALL {
            assert_eq!(field.as_str().parse::<GroupField>().unwrap(), field);
        }
        assert!("zip".parse::<GroupField>().is_err());
    }

    #[test]
    fn test_count_groups_by_label() {
        let rows = vec![
            mapped("Plumbing", PermitRecord::default()),
            mapped("Plumbing", PermitRecord::default()),
            mapped("Mechanical", PermitRecord::default()),
        ];
        let metrics = aggregate(&rows, &[GroupField::SubCategory], &[MetricSpec::Count], &ctx());

        assert_eq!(metrics.len(), 2);
        // Key order: Mechanical < Plumbing
        assert_eq!(metrics[0].group_key.to_string(), "Mechanical");
        let plumbing = find(&metrics, "count", "Plumbing");
        assert_eq!(plumbing.value, Some(2.0));
        assert_eq!(plumbing.sample_size, 2);
        assert_eq!(plumbing.excluded_count, 0);
        assert_eq!(plumbing.source_file, "test.csv");
    }

    #[test]
    fn test_numeric_exclusions_and_zero_companion() {
        let mut flagged = PermitRecord {
            value: Some(-5.0),
            ..Default::default()
        };
        flagged.flagged.insert(PermitField::Value);
        let rows = vec![
            mapped("Plumbing", PermitRecord { value: Some(0.0), ..Default::default() }),
            mapped("Plumbing", PermitRecord { value: Some(300.0), ..Default::default() }),
            mapped("Plumbing", PermitRecord::default()),
            mapped("Plumbing", flagged),
        ];
        let spec: MetricSpec = "mean:value".parse().unwrap();
        let metrics = aggregate(&rows, &[GroupField::SubCategory], &[spec], &ctx());

        let mean = find(&metrics, "mean_value", "Plumbing");
        assert_eq!(mean.value, Some(150.0));
        assert_eq!(mean.sample_size, 2);
        assert_eq!(mean.excluded_for(ExclusionReason::MissingValue), 1);
        assert_eq!(mean.excluded_for(ExclusionReason::InvalidValue), 1);
        assert!(mean.is_conserved());

        let nonzero = find(&metrics, "mean_nonzero_value", "Plumbing");
        assert_eq!(nonzero.value, Some(300.0));
        assert_eq!(nonzero.excluded_for(ExclusionReason::ZeroValue), 1);
        assert_eq!(nonzero.sample_size, 1);
        assert!(nonzero.is_conserved());
    }

    #[test]
    fn test_zero_policy_exclude() {
        let rows = vec![
            mapped("Plumbing", PermitRecord { value: Some(0.0), ..Default::default() }),
            mapped("Plumbing", PermitRecord { value: Some(100.0), ..Default::default() }),
        ];
        let ctx = ctx().with_zero_policy(ZeroPolicy::Exclude);
        let spec: MetricSpec = "mean:value".parse().unwrap();
        let metrics = aggregate(&rows, &[GroupField::SubCategory], &[spec], &ctx);

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].value, Some(100.0));
        assert_eq!(metrics[0].excluded_for(ExclusionReason::ZeroValue), 1);
    }

    #[test]
    fn test_processing_time_exclusions() {
        let rows = vec![
            mapped("Plumbing", PermitRecord {
                issue_date: Some(ymd(2024, 1, 1)),
                complete_date: Some(ymd(2024, 1, 11)),
                ..Default::default()
            }),
            mapped("Plumbing", PermitRecord {
                issue_date: Some(ymd(2024, 1, 1)),
                ..Default::default()
            }),
            mapped("Plumbing", PermitRecord {
                issue_date: Some(ymd(2024, 3, 1)),
                complete_date: Some(ymd(2024, 2, 1)),
                ..Default::default()
            }),
        ];
        let spec: MetricSpec = "processing:max".parse().unwrap();
        let metrics = aggregate(&rows, &[], &[spec], &ctx());

        let m = &metrics[0];
        assert_eq!(m.group_key.to_string(), "All");
        assert_eq!(m.value, Some(10.0));
        assert_eq!(m.excluded_for(ExclusionReason::MissingDate), 1);
        assert_eq!(m.excluded_for(ExclusionReason::NegativeDuration), 1);
        assert_eq!(m.date_range_start, Some(ymd(2024, 1, 1)));
        assert_eq!(m.date_range_end, Some(ymd(2024, 3, 1)));
    }

    #[test]
    fn test_rates_use_full_group() {
        let status = |s: PermitStatus, issued: NaiveDate| PermitRecord {
            status: Some(s),
            issue_date: Some(issued),
            ..Default::default()
        };
        let rows = vec![
            mapped("Plumbing", status(PermitStatus::Closed, ymd(2024, 1, 1))),
            mapped("Plumbing", status(PermitStatus::Cancelled, ymd(2024, 1, 1))),
            mapped("Plumbing", status(PermitStatus::Issued, ymd(2020, 1, 1))),
            mapped("Plumbing", PermitRecord::default()),
        ];
        let specs: Vec<MetricSpec> = ["rate:completed", "rate:abandoned", "rate:stale", "rate:status=Cancelled"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let ctx = ctx().with_as_of(Some(ymd(2024, 6, 1)));
        let metrics = aggregate(&rows, &[GroupField::SubCategory], &specs, &ctx);

        for m in &metrics {
            assert_eq!(m.value, Some(25.0), "{}", m.metric_name);
            assert_eq!(m.sample_size, 4);
            assert_eq!(m.unit, MetricUnit::Percent);
        }
    }

    #[test]
    fn test_distinct_excludes_missing() {
        let with = |n: &str| PermitRecord {
            neighborhood: Some(n.to_string()),
            ..Default::default()
        };
        let rows = vec![
            mapped("Plumbing", with("Whittier")),
            mapped("Plumbing", with("Whittier")),
            mapped("Plumbing", with("Phillips")),
            mapped("Plumbing", PermitRecord::default()),
        ];
        let spec: MetricSpec = "distinct:neighborhood".parse().unwrap();
        let metrics = aggregate(&rows, &[], &[spec], &ctx());

        assert_eq!(metrics[0].value, Some(2.0));
        assert_eq!(metrics[0].excluded_for(ExclusionReason::MissingValue), 1);
    }

    #[test]
    fn test_missing_group_values_labelled_unknown() {
        let rows = vec![mapped("Plumbing", PermitRecord::default())];
        let metrics = aggregate(
            &rows,
            &[GroupField::Neighborhood, GroupField::IssueYear],
            &[MetricSpec::Count, MetricSpec::Share],
            &ctx(),
        );
        assert_eq!(metrics[0].group_key.value_of("neighborhood"), Some("Unknown"));
        assert_eq!(metrics[0].group_key.value_of("issue_year"), Some("Unknown"));
        assert_eq!(metrics[1].value, Some(100.0));
    }

    #[test]
    fn test_expand_metrics_once() {
        let specs: Vec<MetricSpec> = ["mean:value", "mean:value", "mean:licensed_units"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let names: Vec<String> = expand_metrics(&specs, ZeroPolicy::Include)
            .iter()
            .map(MetricSpec::name)
            .collect();
        assert_eq!(names, vec!["mean_value", "mean_nonzero_value", "mean_licensed_units"]);
    }
}
