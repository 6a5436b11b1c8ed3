//! Pipeline Orchestrator
//!
//! Runs the four stages in one direction:
//! raw rows → validated rows → mapped rows → grouped aggregates → emitted reports.
//!
//! # Architecture
//! - **Load**: read and fingerprint the permits CSV (all reads happen first)
//! - **Validate**: type/range checks, schema check (only fatal stage besides I/O)
//! - **Map**: every row gets exactly one classification
//! - **Scope**: optional issue-date window; out-of-window rows are counted, not aggregated
//! - **Aggregate**: one pass per report, optionally partitioned on the blocking pool
//! - **Emit**: all writes happen after aggregation completes
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let summary = pipeline.run().await?;
//! ```

use crate::aggregator::parallel::aggregate_partitioned;
use crate::aggregator::ranking::rank;
use crate::aggregator::{aggregate, AggregationContext};
use crate::emitter::{
    OutputFormat, QualityReport, ReportEmitter, ReportSummary, RulesSummary, RunSettings,
    ScopeSummary, ToolInfo,
};
use crate::error::Result;
use crate::loader::load_table;
use crate::mapper::{MappingCoverage, UseCaseMapper};
use crate::reports::{resolve_reports, ReportDefinition};
use crate::rules::RuleSet;
use crate::schema::PermitsSchema;
use crate::validator::{SchemaValidator, ValidationReport};
use chrono::NaiveDate;
use permits_common::config::{
    resolve_path, CompiledDefaults, DateWindow, ReportConfig, TomlConfig, ZeroPolicy,
    OUTPUT_ENV_VAR, RULES_ENV_VAR, SOURCE_ENV_VAR,
};
use permits_common::fingerprint::SourceFingerprint;
use permits_common::models::{AggregateMetric, MappedRecord, PermitRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Command-line overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub source_file: Option<PathBuf>,
    pub rules_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub top_n: Option<usize>,
    pub as_of: Option<NaiveDate>,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub sequential: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub source_file: PathBuf,
    /// Built-in rules when `None`
    pub rules_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub required_columns: Option<Vec<String>>,
    /// Stale reference date; latest issue date when `None`
    pub as_of: Option<NaiveDate>,
    pub stale_after_days: i64,
    pub top_n: usize,
    pub parallel: bool,
    pub zero_policy: ZeroPolicy,
    pub max_examples: usize,
    pub window: DateWindow,
    /// Replaces the standard report set when non-empty
    pub reports: Vec<ReportConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::default();
        Self {
            source_file: defaults.source_file,
            rules_file: None,
            output_dir: defaults.output_dir,
            required_columns: None,
            as_of: None,
            stale_after_days: defaults.stale_after_days,
            top_n: defaults.top_n,
            parallel: defaults.parallel,
            zero_policy: ZeroPolicy::default(),
            max_examples: defaults.max_examples,
            window: DateWindow::default(),
            reports: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Resolve every setting: CLI > ENV > TOML > compiled default
    pub fn resolve(toml: &TomlConfig, cli: &CliOverrides) -> Self {
        let defaults = CompiledDefaults::default();

        let source_file = resolve_path(
            "source_file",
            cli.source_file.as_deref(),
            SOURCE_ENV_VAR,
            toml.source_file.as_deref(),
            Some(defaults.source_file.as_path()),
        )
        .unwrap_or(defaults.source_file.clone());
        let rules_file = resolve_path(
            "rules_file",
            cli.rules_file.as_deref(),
            RULES_ENV_VAR,
            toml.rules_file.as_deref(),
            None,
        );
        let output_dir = resolve_path(
            "output_dir",
            cli.output_dir.as_deref(),
            OUTPUT_ENV_VAR,
            toml.output_dir.as_deref(),
            Some(defaults.output_dir.as_path()),
        )
        .unwrap_or(defaults.output_dir.clone());

        let window = DateWindow {
            since: cli.since.or(toml.window.since),
            until: cli.until.or(toml.window.until),
        };

        Self {
            source_file,
            rules_file,
            output_dir,
            required_columns: toml.required_columns.clone(),
            as_of: cli.as_of.or(toml.as_of),
            stale_after_days: toml.stale_after_days.unwrap_or(defaults.stale_after_days),
            top_n: cli.top_n.or(toml.top_n).unwrap_or(defaults.top_n),
            parallel: !cli.sequential && toml.parallel.unwrap_or(defaults.parallel),
            zero_policy: toml.zero_policy.unwrap_or_default(),
            max_examples: toml.max_examples.unwrap_or(defaults.max_examples),
            window,
            reports: toml.reports.clone(),
        }
    }
}

/// Outcome of a full run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub flagged_rows: usize,
    pub in_scope_rows: usize,
    pub outside_date_window: usize,
    pub unmapped_rows: usize,
    pub metrics_emitted: usize,
    pub files_written: Vec<PathBuf>,
}

/// Pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn validator(&self) -> Result<SchemaValidator> {
        let schema = match &self.config.required_columns {
            Some(columns) => PermitsSchema::with_required(columns)?,
            None => PermitsSchema::standard(),
        };
        Ok(SchemaValidator::new(schema).with_max_examples(self.config.max_examples))
    }

    /// Load and validate the source table
    pub fn load_and_validate(
        &self,
    ) -> Result<(Vec<PermitRecord>, ValidationReport, SourceFingerprint)> {
        let validator = self.validator()?;
        let (table, fingerprint) = load_table(&self.config.source_file)?;
        let (records, report) = validator.validate(&table)?;
        Ok((records, report, fingerprint))
    }

    /// Validate only and write `validation_report.json`
    pub fn validate_only(&self) -> Result<(ValidationReport, PathBuf)> {
        let (_, report, _) = self.load_and_validate()?;
        let emitter = ReportEmitter::new(&self.config.output_dir)?;
        let path = emitter.emit_validation(&report)?;
        Ok((report, path))
    }

    /// Full run: validate, map, aggregate every report, emit
    pub async fn run(&self) -> Result<RunSummary> {
        let config = &self.config;
        info!("Pipeline processing {}", config.source_file.display());

        // Inputs
        let (records, validation, source) = self.load_and_validate()?;
        let rules = RuleSet::load(config.rules_file.as_deref())?;
        let reports = resolve_reports(&config.reports, config.top_n)?;

        // Mapping covers every row, in or out of the date window
        let mapper = UseCaseMapper::new(&rules);
        let mapped = mapper.map_all(records);
        let coverage = MappingCoverage::from_records(&mapped);

        let as_of = config
            .as_of
            .or_else(|| mapped.iter().filter_map(|m| m.record.issue_date).max());

        let total_rows = mapped.len();
        let in_scope: Vec<MappedRecord> = mapped
            .into_iter()
            .filter(|m| config.window.contains(m.record.issue_date))
            .collect();
        let scope = ScopeSummary {
            total_rows,
            in_scope_rows: in_scope.len(),
            outside_date_window: total_rows - in_scope.len(),
        };
        if scope.outside_date_window > 0 {
            info!(
                "{} rows outside date window excluded from aggregation",
                scope.outside_date_window
            );
        }
        if scope.in_scope_rows == 0 {
            warn!("No rows in scope; reports will contain headers only");
        }

        let ctx = AggregationContext::new(source.path.clone())
            .with_as_of(as_of)
            .with_stale_after_days(config.stale_after_days)
            .with_zero_policy(config.zero_policy);

        // Aggregation
        let rows = Arc::new(in_scope);
        let mut results: Vec<(ReportDefinition, Vec<AggregateMetric>)> = Vec::new();
        for report in reports {
            let metrics = self.aggregate_report(&rows, &report, &ctx).await?;
            info!("Report {}: {} metrics", report.name, metrics.len());
            results.push((report, metrics));
        }

        // Emission
        let settings = RunSettings {
            as_of,
            stale_after_days: config.stale_after_days,
            zero_policy: config.zero_policy,
            window_since: config.window.since,
            window_until: config.window.until,
            top_n: config.top_n,
        };
        let run_id = run_id(&source, rules.fingerprint(), &settings, &results)?;

        let emitter = ReportEmitter::new(&config.output_dir)?;
        let mut files_written = Vec::new();
        let mut summaries = Vec::new();
        for (report, metrics) in &results {
            let path = emitter.emit(report, metrics, OutputFormat::WideCsv)?;
            summaries.push(ReportSummary {
                name: report.name.clone(),
                file: file_name(&path),
                group_by: report.group_by.iter().map(|g| g.to_string()).collect(),
                metrics: report.metrics.iter().map(|m| m.name()).collect(),
                groups: count_groups(metrics),
            });
            files_written.push(path);
        }

        let flat: Vec<(&str, &[AggregateMetric])> = results
            .iter()
            .map(|(r, m)| (r.name.as_str(), m.as_slice()))
            .collect();
        files_written.push(emitter.emit_long(&flat)?);

        let metrics = crate::emitter::quality::metrics_map(&flat);
        let metrics_emitted = metrics.len();
        let quality = QualityReport {
            run_id: run_id.clone(),
            tool: ToolInfo::default(),
            source,
            rules: RulesSummary {
                fingerprint: rules.fingerprint().clone(),
                rule_count: rules.len(),
            },
            settings,
            validation: validation.clone(),
            mapping: coverage.clone(),
            scope: scope.clone(),
            reports: summaries,
            metrics,
        };
        files_written.push(emitter.emit_quality(&quality)?);

        info!(
            "Run {} complete: {} rows, {} unmapped, {} metrics, {} files",
            run_id,
            total_rows,
            coverage.unmapped,
            metrics_emitted,
            files_written.len()
        );

        Ok(RunSummary {
            run_id,
            total_rows,
            valid_rows: validation.valid_rows,
            flagged_rows: validation.flagged_rows,
            in_scope_rows: scope.in_scope_rows,
            outside_date_window: scope.outside_date_window,
            unmapped_rows: coverage.unmapped,
            metrics_emitted,
            files_written,
        })
    }

    async fn aggregate_report(
        &self,
        rows: &Arc<Vec<MappedRecord>>,
        report: &ReportDefinition,
        ctx: &AggregationContext,
    ) -> Result<Vec<AggregateMetric>> {
        let metrics = if self.config.parallel {
            aggregate_partitioned(Arc::clone(rows), &report.group_by, &report.metrics, ctx).await?
        } else {
            aggregate(rows, &report.group_by, &report.metrics, ctx)
        };

        Ok(match &report.rank_by {
            Some(rank_by) => rank(metrics, rank_by, report.limit),
            None => match report.limit {
                Some(limit) => limit_groups(metrics, limit),
                None => metrics,
            },
        })
    }
}

/// Keep the first `limit` groups in key order
fn limit_groups(metrics: Vec<AggregateMetric>, limit: usize) -> Vec<AggregateMetric> {
    let mut groups = 0;
    let mut last = None;
    metrics
        .into_iter()
        .take_while(|m| {
            if last.as_ref() != Some(&m.group_key) {
                groups += 1;
                last = Some(m.group_key.clone());
            }
            groups <= limit
        })
        .collect()
}

fn count_groups(metrics: &[AggregateMetric]) -> usize {
    let mut count = 0;
    for (i, m) in metrics.iter().enumerate() {
        if i == 0 || metrics[i - 1].group_key != m.group_key {
            count += 1;
        }
    }
    count
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Deterministic run identity: UUID v5 over inputs and settings
fn run_id(
    source: &SourceFingerprint,
    rules: &SourceFingerprint,
    settings: &RunSettings,
    results: &[(ReportDefinition, Vec<AggregateMetric>)],
) -> Result<String> {
    let mut name = Vec::new();
    name.extend_from_slice(source.sha256.as_bytes());
    name.push(b'\n');
    name.extend_from_slice(rules.sha256.as_bytes());
    name.push(b'\n');
    name.extend_from_slice(&serde_json::to_vec(settings)?);
    for (report, _) in results {
        name.push(b'\n');
        name.extend_from_slice(report.name.as_bytes());
        for metric in &report.metrics {
            name.push(b',');
            name.extend_from_slice(metric.name().as_bytes());
        }
    }
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, &name).to_string())
}
