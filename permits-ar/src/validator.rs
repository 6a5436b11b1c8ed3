//! Schema Validator
//!
//! Turns a [`RawTable`] into typed [`PermitRecord`]s plus a
//! [`ValidationReport`].
//!
//! # Policy
//!
//! - A missing required column aborts the run ([`Error::Schema`] lists all of them)
//! - A cell that fails its declared type is stored as absent and the field is flagged
//! - Negative currency / unit counts are kept and flagged
//! - `completeDate` earlier than `issueDate` flags `completeDate` (`date_order`)
//! - No row is ever dropped
//!
//! A row is *valid* when none of its required fields is flagged. Issues on
//! optional columns are still flagged and counted, they just do not make the
//! row invalid.

use crate::loader::RawTable;
use crate::schema::{ColumnDefinition, ColumnType, PermitsSchema};
use chrono::NaiveDate;
use permits_common::models::{PermitField, PermitRecord, PermitStatus};
use permits_common::time::parse_date;
use permits_common::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Default cap on example issues kept in the report
pub const DEFAULT_MAX_EXAMPLES: usize = 50;

/// Kind of per-field problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Cell does not parse to the declared type
    Unparseable,
    /// Negative value in a non-negative column
    Negative,
    /// Completion date before issue date
    DateOrder,
}

/// One flagged cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub row_number: usize,
    pub permit_number: String,
    pub field: String,
    pub kind: IssueKind,
    pub raw_value: String,
}

/// Issue tally for one field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub unparseable: usize,
    pub negative: usize,
    pub date_order: usize,
}

impl IssueCounts {
    fn record(&mut self, kind: IssueKind) {
        match kind {
            IssueKind::Unparseable => self.unparseable += 1,
            IssueKind::Negative => self.negative += 1,
            IssueKind::DateOrder => self.date_order += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.unparseable + self.negative + self.date_order
    }
}

/// Result of validating one table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub source_file: String,
    pub required_columns: Vec<String>,
    /// Known optional columns the export does not carry
    pub absent_optional_columns: Vec<String>,
    /// Header names outside the known schema (ignored)
    pub unknown_columns: Vec<String>,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub flagged_rows: usize,
    /// Blank cells per present column
    pub missing_by_column: BTreeMap<String, usize>,
    pub issues_by_field: BTreeMap<String, IssueCounts>,
    /// First issues in row order, capped at `max_examples`
    pub examples: Vec<FieldIssue>,
    /// Issues not listed in `examples`
    pub examples_truncated: usize,
}

impl ValidationReport {
    pub fn total_issues(&self) -> usize {
        self.issues_by_field.values().map(IssueCounts::total).sum()
    }

    /// Issue count for one (field, kind) pair
    pub fn issue_count(&self, field: PermitField, kind: IssueKind) -> usize {
        self.issues_by_field
            .get(field.column())
            .map(|c| match kind {
                IssueKind::Unparseable => c.unparseable,
                IssueKind::Negative => c.negative,
                IssueKind::DateOrder => c.date_order,
            })
            .unwrap_or(0)
    }
}

/// Schema Validator
pub struct SchemaValidator {
    schema: PermitsSchema,
    max_examples: usize,
}

impl SchemaValidator {
    pub fn new(schema: PermitsSchema) -> Self {
        Self {
            schema,
            max_examples: DEFAULT_MAX_EXAMPLES,
        }
    }

    pub fn with_max_examples(mut self, max_examples: usize) -> Self {
        self.max_examples = max_examples;
        self
    }

    /// Check the header row against required columns
    pub fn check_columns(&self, table: &RawTable) -> Result<()> {
        let missing: Vec<String> = self
            .schema
            .required_columns()
            .into_iter()
            .filter(|name| table.column_index(name).is_none())
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Schema { missing })
        }
    }

    /// Validate every row of `table`
    pub fn validate(&self, table: &RawTable) -> Result<(Vec<PermitRecord>, ValidationReport)> {
        self.check_columns(table)?;

        let mut report = ValidationReport {
            source_file: table.source_name.clone(),
            required_columns: self
                .schema
                .required_columns()
                .into_iter()
                .map(str::to_string)
                .collect(),
            total_rows: table.len(),
            ..Default::default()
        };

        // (definition, column position) for every known column present
        let mut present: Vec<(&ColumnDefinition, usize)> = Vec::new();
        for column in self.schema.columns() {
            match table.column_index(column.name()) {
                Some(index) => {
                    present.push((column, index));
                    report.missing_by_column.insert(column.name().to_string(), 0);
                }
                None => report.absent_optional_columns.push(column.name().to_string()),
            }
        }
        report.unknown_columns = table
            .headers
            .iter()
            .filter(|h| PermitField::from_column(h).is_none())
            .cloned()
            .collect();
        if !report.unknown_columns.is_empty() {
            debug!("Ignoring unknown columns: {:?}", report.unknown_columns);
        }

        let mut records = Vec::with_capacity(table.len());
        let mut issues: Vec<FieldIssue> = Vec::new();

        for (i, row) in table.rows.iter().enumerate() {
            let mut record = PermitRecord {
                row_number: i + 1,
                ..Default::default()
            };
            let mut row_issues: Vec<(PermitField, IssueKind, String)> = Vec::new();

            for (column, index) in &present {
                let raw = row.get(*index).unwrap_or("").trim();
                if raw.is_empty() {
                    if let Some(n) = report.missing_by_column.get_mut(column.name()) {
                        *n += 1;
                    }
                    continue;
                }
                if let Err(kind) = assign(&mut record, column, raw) {
                    row_issues.push((column.field, kind, raw.to_string()));
                }
            }

            if let (Some(issued), Some(completed)) = (record.issue_date, record.complete_date) {
                if completed < issued {
                    row_issues.push((
                        PermitField::CompleteDate,
                        IssueKind::DateOrder,
                        completed.to_string(),
                    ));
                }
            }

            let mut required_failed = false;
            for (field, kind, raw) in row_issues {
                record.flagged.insert(field);
                required_failed |= self.schema.column(field).required;
                report
                    .issues_by_field
                    .entry(field.column().to_string())
                    .or_default()
                    .record(kind);
                issues.push(FieldIssue {
                    row_number: record.row_number,
                    permit_number: record.permit_number.clone(),
                    field: field.column().to_string(),
                    kind,
                    raw_value: raw,
                });
            }

            if !record.flagged.is_empty() {
                report.flagged_rows += 1;
            }
            if !required_failed {
                report.valid_rows += 1;
            }
            records.push(record);
        }

        // Rows are visited in order; stable sort keeps field order within a row
        issues.sort_by_key(|issue| issue.row_number);
        report.examples_truncated = issues.len().saturating_sub(self.max_examples);
        issues.truncate(self.max_examples);
        report.examples = issues;

        info!(
            "Validated {} rows: {} valid, {} flagged, {} issues",
            report.total_rows,
            report.valid_rows,
            report.flagged_rows,
            report.total_issues()
        );
        if report.total_rows > 0 && report.flagged_rows * 10 > report.total_rows {
            warn!(
                "More than 10% of rows flagged ({} of {})",
                report.flagged_rows, report.total_rows
            );
        }

        Ok((records, report))
    }
}

/// Parse one non-blank cell into the record
fn assign(
    record: &mut PermitRecord,
    column: &ColumnDefinition,
    raw: &str,
) -> std::result::Result<(), IssueKind> {
    use PermitField as F;

    match column.column_type {
        ColumnType::Text => {
            let text = Some(raw.to_string());
            match column.field {
                F::PermitNumber => record.permit_number = raw.to_string(),
                F::PermitType => record.permit_type = text,
                F::WorkType => record.work_type = text,
                F::OccupancyType => record.occupancy_type = text,
                F::Milestone => record.milestone = text,
                F::ApplicantName => record.applicant_name = text,
                F::FullName => record.full_name = text,
                F::ApplicantAddress1 => record.applicant_address1 = text,
                F::ApplicantCity => record.applicant_city = text,
                F::Comments => record.comments = text,
                F::Neighborhood => record.neighborhood = text,
                F::Ward => record.ward = text,
                F::ShortTermRental => record.short_term_rental = text,
                F::ObjectId => record.object_id = text,
                _ => {}
            }
            Ok(())
        }
        ColumnType::Status => {
            record.status = Some(PermitStatus::from_raw(raw));
            Ok(())
        }
        ColumnType::Date => {
            let date: NaiveDate = parse_date(raw).ok_or(IssueKind::Unparseable)?;
            match column.field {
                F::IssueDate => record.issue_date = Some(date),
                F::CompleteDate => record.complete_date = Some(date),
                _ => {}
            }
            Ok(())
        }
        ColumnType::Decimal => {
            let value = parse_decimal(raw).ok_or(IssueKind::Unparseable)?;
            match column.field {
                F::Value => record.value = Some(value),
                F::TotalFees => record.total_fees = Some(value),
                F::X => record.x = Some(value),
                F::Y => record.y = Some(value),
                F::Longitude => record.longitude = Some(value),
                F::Latitude => record.latitude = Some(value),
                _ => {}
            }
            check_sign(column, value)
        }
        ColumnType::Integer => {
            let value = parse_integer(raw).ok_or(IssueKind::Unparseable)?;
            match column.field {
                F::DwellingUnitsNew => record.dwelling_units_new = Some(value),
                F::DwellingUnitsEliminated => record.dwelling_units_eliminated = Some(value),
                F::LicensedUnits => record.licensed_units = Some(value),
                _ => {}
            }
            check_sign(column, value as f64)
        }
    }
}

fn check_sign(column: &ColumnDefinition, value: f64) -> std::result::Result<(), IssueKind> {
    if column.non_negative && value < 0.0 {
        Err(IssueKind::Negative)
    } else {
        Ok(())
    }
}

/// Parse a decimal cell, tolerating `$` and thousands separators
fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a whole number; integral floats (`2.0`) are accepted
fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let v = parse_decimal(raw)?;
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}
