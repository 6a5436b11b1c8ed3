//! Raw CSV table loading
//!
//! Reads the permits export into memory as untyped string cells. Typing and
//! range checks happen in [`crate::validator`]; this layer only guarantees
//! one header row and one [`csv::StringRecord`] per data row.
//!
//! Rows with a different cell count than the header are accepted (missing
//! cells read as blank). Invalid UTF-8 is replaced rather than aborting the
//! run, so a single corrupt row cannot block the report.

use csv::{ReaderBuilder, StringRecord, Trim};
use permits_common::fingerprint::SourceFingerprint;
use permits_common::Result;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// In-memory permits table
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Display name of the source (file name), recorded in every metric
    pub source_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl RawTable {
    /// Position of a header, exact match
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse CSV from any reader
pub fn read_table<R: Read>(source_name: &str, reader: R) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        rows.push(StringRecord::from_byte_record_lossy(record?));
    }

    debug!(
        "Read {} data rows, {} columns from {}",
        rows.len(),
        headers.len(),
        source_name
    );

    Ok(RawTable {
        source_name: source_name.to_string(),
        headers,
        rows,
    })
}

/// Load the permits CSV and fingerprint its bytes
///
/// The file is read once into memory; the fingerprint and the parsed table
/// come from the same bytes.
pub fn load_table(path: &Path) -> Result<(RawTable, SourceFingerprint)> {
    let bytes = std::fs::read(path)?;
    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let fingerprint = SourceFingerprint::of_bytes(&source_name, &bytes);
    let table = read_table(&source_name, bytes.as_slice())?;

    info!(
        "Loaded {} rows from {} (sha256 {})",
        table.len(),
        path.display(),
        &fingerprint.sha256[..12.min(fingerprint.sha256.len())]
    );

    Ok((table, fingerprint))
}
