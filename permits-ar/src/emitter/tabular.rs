//! CSV serialization of metric lists
//!
//! Pure formatting: rows come out in the order the metrics are given, and
//! every value goes through [`fixed_opt`] so repeated runs are byte-identical.

use csv::Writer;
use permits_common::format::fixed_opt;
use permits_common::models::AggregateMetric;
use permits_common::{Error, Result};

/// Envelope columns repeated for every metric of a wide row
const METRIC_SUFFIXES: [&str; 4] = ["_unit", "_sample_size", "_excluded", "_exclusion_reason"];

/// Long-format header
pub const LONG_HEADER: [&str; 13] = [
    "report",
    "metric_name",
    "group_key",
    "value",
    "unit",
    "group_size",
    "sample_size",
    "excluded_count",
    "exclusion_reason",
    "exclusions",
    "source_file",
    "date_range_start",
    "date_range_end",
];

fn date_cell(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

/// `reason=count;...` breakdown
fn exclusions_cell(metric: &AggregateMetric) -> String {
    metric
        .exclusions
        .iter()
        .map(|(reason, n)| format!("{}={}", reason, n))
        .collect::<Vec<_>>()
        .join(";")
}

fn finish(writer: Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| Error::InvalidInput(format!("CSV flush failed: {}", e)))
}

/// One row per group: group columns, `group_size`, then each metric with its envelope
///
/// `metric_names` fixes the column order (and the header when there are no
/// groups). Metrics of one group must be contiguous.
pub fn wide_csv(
    group_columns: &[&str],
    metric_names: &[String],
    metrics: &[AggregateMetric],
) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());

    let mut header: Vec<String> = group_columns.iter().map(|c| c.to_string()).collect();
    header.push("group_size".to_string());
    for name in metric_names {
        header.push(name.clone());
        header.extend(METRIC_SUFFIXES.iter().map(|s| format!("{}{}", name, s)));
    }
    header.extend(
        ["source_file", "date_range_start", "date_range_end"]
            .iter()
            .map(|s| s.to_string()),
    );
    writer.write_record(&header)?;

    let mut start = 0;
    while start < metrics.len() {
        let key = &metrics[start].group_key;
        let end = metrics[start..]
            .iter()
            .position(|m| &m.group_key != key)
            .map_or(metrics.len(), |offset| start + offset);
        let group = &metrics[start..end];
        let first = &group[0];

        let mut row: Vec<String> = group_columns
            .iter()
            .map(|c| key.value_of(c).unwrap_or_default().to_string())
            .collect();
        row.push(first.group_size.to_string());

        for name in metric_names {
            match group.iter().find(|m| &m.metric_name == name) {
                Some(m) => {
                    row.push(fixed_opt(m.value));
                    row.push(m.unit.as_str().to_string());
                    row.push(m.sample_size.to_string());
                    row.push(m.excluded_count.to_string());
                    row.push(m.exclusion_reason.clone().unwrap_or_default());
                }
                None => row.extend(std::iter::repeat(String::new()).take(5)),
            }
        }

        row.push(first.source_file.clone());
        row.push(date_cell(first.date_range_start));
        row.push(date_cell(first.date_range_end));
        writer.write_record(&row)?;

        start = end;
    }

    finish(writer)
}

/// One row per metric across reports
pub fn long_csv(reports: &[(&str, &[AggregateMetric])]) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(LONG_HEADER)?;

    for (report, metrics) in reports {
        for m in metrics.iter() {
            writer.write_record([
                report.to_string(),
                m.metric_name.clone(),
                m.group_key.to_string(),
                fixed_opt(m.value),
                m.unit.as_str().to_string(),
                m.group_size.to_string(),
                m.sample_size.to_string(),
                m.excluded_count.to_string(),
                m.exclusion_reason.clone().unwrap_or_default(),
                exclusions_cell(m),
                m.source_file.clone(),
                date_cell(m.date_range_start),
                date_cell(m.date_range_end),
            ])?;
        }
    }

    finish(writer)
}
