//! Date utilities
//!
//! The permits export mixes several date encodings (ArcGIS style
//! `2019/01/02 06:00:00+00`, RFC 3339, plain ISO dates and US dates).
//! All of them are reduced to a calendar date; processing time is measured
//! in whole calendar days.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Offset-carrying timestamp formats, tried in order
const OFFSET_FORMATS: &[&str] = &["%Y/%m/%d %H:%M:%S%#z", "%Y-%m-%d %H:%M:%S%#z"];

/// Naive timestamp formats, tried in order
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Date-only formats, tried in order
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a source date cell into a calendar date.
///
/// Returns `None` for blank cells and for text matching none of the known
/// encodings. Callers distinguish the two by checking for blank input first.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use permits_common::time::parse_date;
///
/// let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
/// assert_eq!(parse_date("2024/01/15 06:00:00+00"), expected);
/// assert_eq!(parse_date("2024-01-15"), expected);
/// assert_eq!(parse_date("01/15/2024"), expected);
/// assert_eq!(parse_date(""), None);
/// ```
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.date_naive());
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Whole calendar days from `start` to `end` (negative if `end` precedes `start`)
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// `YYYY-MM` label used for monthly grouping
pub fn year_month(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}
