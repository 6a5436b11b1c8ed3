//! Classified permit records

use super::permit::PermitRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Group label for records no rule matched
pub const UNMAPPED_LABEL: &str = "Unmapped";

/// Group label for mapped records whose rule carries no use case
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// Which rule tier produced a record's labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchBasis {
    /// Exact permit type match
    #[serde(rename = "primaryField")]
    PrimaryField,
    /// Keyword found in comments
    #[serde(rename = "keyword")]
    Keyword,
    /// Work type match
    #[serde(rename = "fallback")]
    Fallback,
    /// No rule fired
    #[serde(rename = "unmapped")]
    Unmapped,
}

impl MatchBasis {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchBasis::PrimaryField => "primaryField",
            MatchBasis::Keyword => "keyword",
            MatchBasis::Fallback => "fallback",
            MatchBasis::Unmapped => "unmapped",
        }
    }
}

impl fmt::Display for MatchBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category / Sub-Category / Use Case labels
///
/// All three are `None` for an unmapped record. A mapped record always has
/// category and sub-category; the use case may be absent when the matching
/// rule only identifies the sub-category.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub use_case: Option<String>,
}

impl Classification {
    pub fn unmapped() -> Self {
        Self::default()
    }

    pub fn is_mapped(&self) -> bool {
        self.sub_category.is_some()
    }
}

/// A permit with its classification attached
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRecord {
    pub record: PermitRecord,
    pub classification: Classification,
    pub match_basis: MatchBasis,
    /// Declaration index of the rule that fired, for audit
    pub rule_index: Option<usize>,
}

impl MappedRecord {
    /// Category label for grouping (`Unmapped` when absent)
    pub fn category_label(&self) -> &str {
        self.classification
            .category
            .as_deref()
            .unwrap_or(UNMAPPED_LABEL)
    }

    /// Sub-category label for grouping (`Unmapped` when absent)
    pub fn sub_category_label(&self) -> &str {
        self.classification
            .sub_category
            .as_deref()
            .unwrap_or(UNMAPPED_LABEL)
    }

    /// Use case label for grouping
    ///
    /// `Uncategorized` for a mapped record without a use case, `Unmapped`
    /// for a record no rule matched.
    pub fn use_case_label(&self) -> &str {
        match (&self.classification.use_case, self.classification.is_mapped()) {
            (Some(use_case), _) => use_case,
            (None, true) => UNCATEGORIZED_LABEL,
            (None, false) => UNMAPPED_LABEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(classification: Classification, basis: MatchBasis) -> MappedRecord {
        MappedRecord {
            record: PermitRecord::default(),
            classification,
            match_basis: basis,
            rule_index: None,
        }
    }

    #[test]
    fn test_labels_for_unmapped() {
        let rec = mapped(Classification::unmapped(), MatchBasis::Unmapped);
        assert_eq!(rec.category_label(), "Unmapped");
        assert_eq!(rec.sub_category_label(), "Unmapped");
        assert_eq!(rec.use_case_label(), "Unmapped");
    }

    #[test]
    fn test_labels_for_sub_category_only() {
        let rec = mapped(
            Classification {
                category: Some("Trades".into()),
                sub_category: Some("Plumbing".into()),
                use_case: None,
            },
            MatchBasis::PrimaryField,
        );
        assert_eq!(rec.category_label(), "Trades");
        assert_eq!(rec.use_case_label(), "Uncategorized");
    }

    #[test]
    fn test_match_basis_serializes_camel_case() {
        let json = serde_json::to_string(&MatchBasis::PrimaryField).unwrap();
        assert_eq!(json, "\"primaryField\"");
        assert_eq!(MatchBasis::Unmapped.to_string(), "unmapped");
    }
}
