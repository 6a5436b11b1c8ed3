//! Fixed-precision number formatting
//!
//! Every number written to a report uses exactly two decimal places so that
//! repeated runs over identical data never produce spurious diffs.

use serde::Serializer;
use serde_json::value::RawValue;

/// Decimal places used for every emitted number
pub const DECIMAL_PLACES: usize = 2;

/// Format a number with fixed precision.
///
/// Negative zero is normalized to `0.00`.
///
/// # Examples
///
/// ```
/// use permits_common::format::fixed;
///
/// assert_eq!(fixed(1.5), "1.50");
/// assert_eq!(fixed(2.0 / 3.0), "0.67");
/// assert_eq!(fixed(-0.0), "0.00");
/// ```
pub fn fixed(value: f64) -> String {
    let text = format!("{:.*}", DECIMAL_PLACES, value);
    if text.starts_with('-') && text[1..].chars().all(|c| c == '0' || c == '.') {
        text[1..].to_string()
    } else {
        text
    }
}

/// Format an optional number; `None` becomes an empty cell
pub fn fixed_opt(value: Option<f64>) -> String {
    value.map(fixed).unwrap_or_default()
}

/// serde helper: write an optional number as a JSON number literal with
/// fixed precision (`12.30`, not `12.3`), or `null`.
pub fn serialize_fixed_opt<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) if v.is_finite() => {
            let raw = RawValue::from_string(fixed(*v)).map_err(serde::ser::Error::custom)?;
            serializer.serialize_some(&raw)
        }
        _ => serializer.serialize_none(),
    }
}
