//! Use-Case Mapper
//!
//! Assigns Category / Sub-Category / Use Case to every permit.
//!
//! # Tiers (first match wins)
//!
//! 1. **primaryField**: rules listing the record's `permitType`. Among them
//!    the first whose keywords hit `comments` wins, else the first listed.
//! 2. **keyword**: first rule (declaration order) with a keyword contained
//!    in `comments`.
//! 3. **fallback**: first rule listing the record's `workType`.
//! 4. **unmapped**: no labels.
//!
//! All comparisons are case-insensitive. Every input record yields exactly
//! one [`MappedRecord`].

use crate::rules::{keyword_haystack, RuleSet};
use permits_common::models::{Classification, MappedRecord, MatchBasis, PermitRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Classification outcome before it is attached to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    pub basis: MatchBasis,
    pub rule_index: Option<usize>,
}

impl RuleMatch {
    fn unmapped() -> Self {
        Self {
            basis: MatchBasis::Unmapped,
            rule_index: None,
        }
    }
}

/// Use-Case Mapper over an immutable rule set
pub struct UseCaseMapper<'a> {
    rules: &'a RuleSet,
}

impl<'a> UseCaseMapper<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Decide which rule (if any) fires for a record
    pub fn find_match(&self, record: &PermitRecord) -> RuleMatch {
        let comments = record
            .comments
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(keyword_haystack)
            .unwrap_or_default();

        // Tier 1: primary field
        if let Some(permit_type) = record.permit_type.as_deref() {
            let candidates = self
                .rules
                .candidates_for_permit_type(&permit_type.trim().to_lowercase());
            if let Some(&first) = candidates.first() {
                let chosen = candidates
                    .iter()
                    .copied()
                    .find(|&i| {
                        self.rules
                            .get(i)
                            .map_or(false, |r| r.keyword_hit(&comments).is_some())
                    })
                    .unwrap_or(first);
                return RuleMatch {
                    basis: MatchBasis::PrimaryField,
                    rule_index: Some(chosen),
                };
            }
        }

        // Tier 2: keyword in comments
        if !comments.is_empty() {
            if let Some(index) = self
                .rules
                .rules()
                .iter()
                .position(|r| r.keyword_hit(&comments).is_some())
            {
                return RuleMatch {
                    basis: MatchBasis::Keyword,
                    rule_index: Some(index),
                };
            }
        }

        // Tier 3: work type
        if let Some(work_type) = record.work_type.as_deref() {
            if let Some(index) = self
                .rules
                .first_for_work_type(&work_type.trim().to_lowercase())
            {
                return RuleMatch {
                    basis: MatchBasis::Fallback,
                    rule_index: Some(index),
                };
            }
        }

        RuleMatch::unmapped()
    }

    /// Classify one record
    pub fn map(&self, record: PermitRecord) -> MappedRecord {
        let found = self.find_match(&record);
        let classification = found
            .rule_index
            .and_then(|i| self.rules.get(i))
            .map(|rule| rule.classification())
            .unwrap_or_else(Classification::unmapped);

        MappedRecord {
            record,
            classification,
            match_basis: found.basis,
            rule_index: found.rule_index,
        }
    }

    /// Classify every record; output length always equals input length
    pub fn map_all(&self, records: Vec<PermitRecord>) -> Vec<MappedRecord> {
        let mapped: Vec<MappedRecord> = records.into_iter().map(|r| self.map(r)).collect();

        let coverage = MappingCoverage::from_records(&mapped);
        info!(
            "Mapped {} records ({:.1}%): {} primaryField, {} keyword, {} fallback, {} unmapped",
            coverage.total,
            coverage.mapped_percent(),
            coverage.primary_field,
            coverage.keyword,
            coverage.fallback,
            coverage.unmapped
        );
        if let Some((rule, hits)) = coverage.rule_hits.iter().max_by_key(|(_, n)| **n) {
            debug!("Most frequent rule: #{} ({} hits)", rule, hits);
        }

        mapped
    }
}

/// Counts of records per match basis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingCoverage {
    pub total: usize,
    pub primary_field: usize,
    pub keyword: usize,
    pub fallback: usize,
    pub unmapped: usize,
    /// Records mapped to a sub-category only (use case `Uncategorized`)
    pub without_use_case: usize,
    /// 1-based rule number → records it classified
    pub rule_hits: BTreeMap<usize, usize>,
}

impl MappingCoverage {
    pub fn from_records(records: &[MappedRecord]) -> Self {
        let mut coverage = Self {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.match_basis {
                MatchBasis::PrimaryField => coverage.primary_field += 1,
                MatchBasis::Keyword => coverage.keyword += 1,
                MatchBasis::Fallback => coverage.fallback += 1,
                MatchBasis::Unmapped => coverage.unmapped += 1,
            }
            if record.classification.is_mapped() && record.classification.use_case.is_none() {
                coverage.without_use_case += 1;
            }
            if let Some(index) = record.rule_index {
                *coverage.rule_hits.entry(index + 1).or_default() += 1;
            }
        }
        coverage
    }

    /// Mapped share in percent (0 for an empty input)
    pub fn mapped_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.total - self.unmapped) as f64 * 100.0 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{builtin_rules, UseCaseRule};

    fn record(permit_type: Option<&str>, work_type: Option<&str>, comments: Option<&str>) -> PermitRecord {
        PermitRecord {
            permit_type: permit_type.map(str::to_string),
            work_type: work_type.map(str::to_string),
            comments: comments.map(str::to_string),
            ..Default::default()
        }
    }

    fn small_rules() -> RuleSet {
        RuleSet::new(
            vec![
                UseCaseRule::new("Trades", "Plumbing", None, &["plumbing"], &[], &[]),
                UseCaseRule::new("Trades", "Plumbing", Some("Water heater"), &["plumbing"], &["water heater"], &[]),
                UseCaseRule::new("Energy", "Solar", Some("Solar panels"), &[], &["solar"], &[]),
                UseCaseRule::new("Trades", "Heating", Some("Furnace"), &[], &["furnace", "heat"], &[]),
                UseCaseRule::new("Construction", "Fence", Some("Fence"), &[], &[], &["fence"]),
            ],
            "test",
        )
        .unwrap()
    }

    #[test]
    fn test_primary_field_prefers_keyword_candidate() {
        let rules = small_rules();
        let mapper = UseCaseMapper::new(&rules);

        let m = mapper.map(record(Some("PLUMBING"), None, Some("Replace Water Heater")));
        assert_eq!(m.match_basis, MatchBasis::PrimaryField);
        assert_eq!(m.classification.use_case.as_deref(), Some("Water heater"));
        assert_eq!(m.rule_index, Some(1));

        let m = mapper.map(record(Some("Plumbing"), None, Some("new toilet")));
        assert_eq!(m.rule_index, Some(0));
        assert_eq!(m.use_case_label(), "Uncategorized");
    }

    #[test]
    fn test_primary_field_beats_keyword_tier() {
        let rules = small_rules();
        let mapper = UseCaseMapper::new(&rules);

        // Comments also hit the Solar keyword rule; permit type wins
        let m = mapper.map(record(Some("Plumbing"), None, Some("solar water heater")));
        assert_eq!(m.match_basis, MatchBasis::PrimaryField);
        assert_eq!(m.sub_category_label(), "Plumbing");
    }

    #[test]
    fn test_keyword_tie_broken_by_declaration_order() {
        let rules = small_rules();
        let mapper = UseCaseMapper::new(&rules);

        let m = mapper.map(record(Some("Misc"), None, Some("solar heat install")));
        assert_eq!(m.match_basis, MatchBasis::Keyword);
        assert_eq!(m.sub_category_label(), "Solar");
    }

    #[test]
    fn test_fallback_on_work_type() {
        let rules = small_rules();
        let mapper = UseCaseMapper::new(&rules);

        let m = mapper.map(record(Some("Misc"), Some(" FENCE "), Some("backyard")));
        assert_eq!(m.match_basis, MatchBasis::Fallback);
        assert_eq!(m.sub_category_label(), "Fence");
    }

    #[test]
    fn test_unmapped_when_nothing_fires() {
        let rules = small_rules();
        let mapper = UseCaseMapper::new(&rules);

        let m = mapper.map(record(Some("Misc"), Some("Other"), Some("nothing relevant")));
        assert_eq!(m.match_basis, MatchBasis::Unmapped);
        assert_eq!(m.classification, Classification::unmapped());
        assert_eq!(m.category_label(), "Unmapped");

        let m = mapper.map(PermitRecord::default());
        assert_eq!(m.match_basis, MatchBasis::Unmapped);
    }

    #[test]
    fn test_map_all_is_total_and_counts_coverage() {
        let rules = small_rules();
        let mapper = UseCaseMapper::new(&rules);
        let input = vec![
            record(Some("Plumbing"), None, None),
            record(None, None, Some("solar")),
            record(None, Some("fence"), None),
            record(None, None, None),
        ];

        let mapped = mapper.map_all(input);
        assert_eq!(mapped.len(), 4);

        let coverage = MappingCoverage::from_records(&mapped);
        assert_eq!(coverage.primary_field, 1);
        assert_eq!(coverage.keyword, 1);
        assert_eq!(coverage.fallback, 1);
        assert_eq!(coverage.unmapped, 1);
        assert_eq!(coverage.without_use_case, 1);
        assert_eq!(coverage.rule_hits.get(&1), Some(&1));
        assert!((coverage.mapped_percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_builtin_commercial_sign() {
        let rules = builtin_rules().unwrap();
        let mapper = UseCaseMapper::new(&rules);

        let m = mapper.map(record(Some("Commercial"), None, Some("install new sign and window")));
        assert_eq!(m.sub_category_label(), "Sign");

        let m = mapper.map(record(Some("Commercial"), None, Some("tenant remodel")));
        assert_eq!(m.sub_category_label(), "Building");
        assert_eq!(m.use_case_label(), "Remodel");
    }

    #[test]
    fn test_builtin_ac_keyword_needs_word_edges() {
        let rules = builtin_rules().unwrap();
        let mapper = UseCaseMapper::new(&rules);

        let m = mapper.map(record(Some("Mechanical"), None, Some("Replace furnace")));
        assert_eq!(m.use_case_label(), "Change out furnace (plenum work included)");

        let m = mapper.map(record(Some("Mechanical"), None, Some("replace boiler")));
        assert_eq!(m.use_case_label(), "Change out boiler (incidental piping included)");

        let m = mapper.map(record(Some("Mechanical"), None, Some("AC replacement")));
        assert_eq!(m.use_case_label(), "A/C or Heat pump add on or replacement");

        let m = mapper.map(record(Some("Mechanical"), None, Some("service call, install hrv")));
        assert_eq!(m.use_case_label(), "HRV/ERV");

        let m = mapper.map(record(Some("Mechanical"), None, Some("server room cooling")));
        assert_eq!(m.use_case_label(), "A/C or Heat pump add on or replacement");

        let m = mapper.map(record(Some("Mechanical"), None, Some("dryer vent service")));
        assert_eq!(m.use_case_label(), "Dryer vent");

        let m = mapper.map(record(Some("Misc"), None, Some("replace retaining wall")));
        assert_eq!(m.match_basis, MatchBasis::Unmapped);
    }
}
