//! Fixture builders for permits-ar integration tests

#![allow(dead_code)]

use permits_ar::PipelineConfig;
use permits_common::models::PermitField;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One source row, keyed by header name; unset columns are blank
#[derive(Debug, Clone, Default)]
pub struct Row {
    cells: BTreeMap<&'static str, String>,
}

impl Row {
    pub fn new(permit_number: &str) -> Self {
        Self::default().set("permitNumber", permit_number)
    }

    pub fn set(mut self, column: &'static str, value: &str) -> Self {
        self.cells.insert(column, value.to_string());
        self
    }

    pub fn permit_type(self, value: &str) -> Self {
        self.set("permitType", value)
    }

    pub fn comments(self, value: &str) -> Self {
        self.set("comments", value)
    }

    pub fn applicant(self, value: &str) -> Self {
        self.set("applicantName", value)
    }

    pub fn dates(self, issued: &str, completed: &str) -> Self {
        self.set("issueDate", issued).set("completeDate", completed)
    }
}

/// Header of the full 26-column export
pub fn header() -> Vec<&'static str> {
    PermitField::ALL.iter().map(|f| f.column()).collect()
}

/// Permits CSV text with the full header
pub fn permits_csv(rows: &[Row]) -> String {
    permits_csv_with_header(&header(), rows)
}

pub fn permits_csv_with_header(header: &[&str], rows: &[Row]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header).unwrap();
    for row in rows {
        let cells: Vec<&str> = header
            .iter()
            .map(|h| row.cells.get(h).map(String::as_str).unwrap_or(""))
            .collect();
        writer.write_record(&cells).unwrap();
    }
    String::from_utf8(writer.into_inner().unwrap()).unwrap()
}

pub fn write_permits(dir: &Path, rows: &[Row]) -> PathBuf {
    let path = dir.join("permits.csv");
    std::fs::write(&path, permits_csv(rows)).unwrap();
    path
}

/// Rules CSV with the standard header followed by `body` lines
pub fn write_rules(dir: &Path, body: &[&str]) -> PathBuf {
    let path = dir.join("rules.csv");
    let mut text = String::from("category,sub_category,use_case,permit_types,keywords,work_types\n");
    for line in body {
        text.push_str(line);
        text.push('\n');
    }
    std::fs::write(&path, text).unwrap();
    path
}

/// Sequential pipeline config over the given files
pub fn config(source: &Path, rules: Option<&Path>, output_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        source_file: source.to_path_buf(),
        rules_file: rules.map(Path::to_path_buf),
        output_dir: output_dir.to_path_buf(),
        parallel: false,
        ..Default::default()
    }
}

/// Rows of a CSV file as header → cell maps
pub fn read_csv(path: &Path) -> Vec<BTreeMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|r| {
            let record = r.unwrap();
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

/// Every file of a directory with its bytes, sorted by name
pub fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let path = e.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, std::fs::read(&path).unwrap())
        })
        .collect()
}

const PERMIT_TYPES: [&str; 7] = [
    "Plumbing",
    "Residential",
    "Mechanical",
    "Commercial",
    "Wrecking",
    "Site",
    "Zoning",
];
const STATUSES: [&str; 6] = ["Closed", "Issued", "Open", "Cancelled", "Withdrawn", ""];
const COMMENTS: [&str; 6] = [
    "replace water heater",
    "new deck addition",
    "install furnace",
    "roof mounted solar panels",
    "",
    "misc repairs",
];
const APPLICANTS: [&str; 5] = [
    "Acme Plumbing LLC",
    "Beta Builders Inc",
    "Jane Smith",
    "CENTERPOINT ENERGY",
    "",
];
const NEIGHBORHOODS: [&str; 4] = ["Downtown", "Riverside", "Hillcrest", ""];

/// Deterministic mixed rows: every status, blank cells, bad values and
/// completion-before-issue dates all occur
pub fn synthetic_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let year = 2019 + (i % 6);
            let month = 1 + (i % 12);
            let issued = format!("{}-{:02}-{:02}", year, month, 1 + (i % 28));
            let completed = match i % 5 {
                0 => String::new(),
                // Completion before issue
                1 => format!("{}-{:02}-01", year - 1, month),
                _ => format!("{}-{:02}-{:02}", year + 1, month, 1 + (i % 28)),
            };
            let value = match i % 7 {
                0 => "0".to_string(),
                1 => String::new(),
                2 => "-25".to_string(),
                3 => "n/a".to_string(),
                _ => format!("{}", (i * 137) % 50_000),
            };

            Row::new(&format!("P{:05}", i))
                .permit_type(PERMIT_TYPES[i % PERMIT_TYPES.len()])
                .set("workType", if i % 11 == 0 { "WRECK" } else { "" })
                .set("status", STATUSES[i % STATUSES.len()])
                .set("value", &value)
                .set("totalFees", &format!("{}.50", i % 300))
                .dates(&issued, &completed)
                .applicant(APPLICANTS[i % APPLICANTS.len()])
                .comments(COMMENTS[i % COMMENTS.len()])
                .set("Neighborhoods_Desc", NEIGHBORHOODS[i % NEIGHBORHOODS.len()])
                .set("Wards", &format!("Ward {}", 1 + i % 3))
        })
        .collect()
}
