//! Use-case rule set
//!
//! **Purpose:** Immutable, ordered classification rules loaded once per run
//! and passed explicitly to the [`UseCaseMapper`](crate::mapper::UseCaseMapper).
//!
//! # Rules CSV
//!
//! ```text
//! category,sub_category,use_case,permit_types,keywords,work_types
//! Trades,Plumbing,,plumbing,,
//! Trades,Plumbing,Water heater,plumbing,water heater|hot water,
//! ```
//!
//! List cells are `|`-separated. `Category`, `Sub-Category` and `Use Case`
//! are accepted as header aliases. Declaration order is significant: it is
//! the tie-break of every mapper tier.
//!
//! All matchers are stored lowercased; comparisons against record fields are
//! case-insensitive. Permit and work types are trimmed. Keywords keep their
//! spaces: a leading or trailing space only matches at a word edge, so
//! `" ac "` hits "new ac unit" but not "replace".

mod builtin;

pub use builtin::builtin_rules;

use permits_common::fingerprint::SourceFingerprint;
use permits_common::models::Classification;
use permits_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Separator of list cells in the rules CSV
pub const LIST_SEPARATOR: char = '|';

/// One classification rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseCaseRule {
    pub category: String,
    pub sub_category: String,
    /// `None` for a rule that only identifies the sub-category
    pub use_case: Option<String>,
    /// Lowercased `permitType` values (primary tier)
    pub permit_types: Vec<String>,
    /// Lowercased substrings searched in `comments`
    pub keywords: Vec<String>,
    /// Lowercased `workType` values (fallback tier)
    pub work_types: Vec<String>,
}

impl UseCaseRule {
    /// Create a rule; matchers are lowercased and blanks dropped
    pub fn new<S: AsRef<str>>(
        category: &str,
        sub_category: &str,
        use_case: Option<&str>,
        permit_types: &[S],
        keywords: &[S],
        work_types: &[S],
    ) -> Self {
        Self {
            category: category.trim().to_string(),
            sub_category: sub_category.trim().to_string(),
            use_case: use_case
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            permit_types: normalize(permit_types),
            keywords: normalize_keywords(keywords),
            work_types: normalize(work_types),
        }
    }

    /// First keyword contained in a [`keyword_haystack`]
    pub fn keyword_hit(&self, haystack: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| haystack.contains(k.as_str()))
            .map(String::as_str)
    }

    /// Labels this rule assigns
    pub fn classification(&self) -> Classification {
        Classification {
            category: Some(self.category.clone()),
            sub_category: Some(self.sub_category.clone()),
            use_case: self.use_case.clone(),
        }
    }

    /// `Category / Sub-Category / Use Case` for log lines
    pub fn label(&self) -> String {
        match &self.use_case {
            Some(use_case) => format!("{} / {} / {}", self.category, self.sub_category, use_case),
            None => format!("{} / {}", self.category, self.sub_category),
        }
    }
}

fn normalize<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.as_ref().trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn normalize_keywords<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .filter(|v| !v.as_ref().trim().is_empty())
        .map(|v| v.as_ref().to_lowercase())
        .collect()
}

/// Lowercased comments padded with a space at each end, so edge-spaced
/// keywords also match at the start and end of the text
pub fn keyword_haystack(comments: &str) -> String {
    format!(" {} ", comments.to_lowercase())
}

/// Ordered, immutable rule list with lookup indexes
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<UseCaseRule>,
    /// permit type → rule indices in declaration order
    by_permit_type: HashMap<String, Vec<usize>>,
    /// work type → first rule index
    by_work_type: HashMap<String, usize>,
    fingerprint: SourceFingerprint,
}

impl RuleSet {
    /// Build a rule set, rejecting rules that can never fire
    pub fn new(rules: Vec<UseCaseRule>, source_label: &str) -> Result<Self> {
        if rules.is_empty() {
            return Err(Error::Rules(format!("{}: rule set is empty", source_label)));
        }

        for (i, rule) in rules.iter().enumerate() {
            if rule.category.is_empty() || rule.sub_category.is_empty() {
                return Err(Error::Rules(format!(
                    "{}: rule {} has no category or sub-category",
                    source_label,
                    i + 1
                )));
            }
            if rule.permit_types.is_empty() && rule.keywords.is_empty() && rule.work_types.is_empty()
            {
                return Err(Error::Rules(format!(
                    "{}: rule {} ({}) has no permit types, keywords or work types",
                    source_label,
                    i + 1,
                    rule.label()
                )));
            }
        }

        let mut by_permit_type: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_work_type: HashMap<String, usize> = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            for permit_type in &rule.permit_types {
                let indices = by_permit_type.entry(permit_type.clone()).or_default();
                if !indices.contains(&i) {
                    indices.push(i);
                }
            }
            for work_type in &rule.work_types {
                by_work_type.entry(work_type.clone()).or_insert(i);
            }
        }

        let fingerprint = SourceFingerprint::of_bytes(source_label, &to_csv_bytes(&rules)?);

        Ok(Self {
            rules,
            by_permit_type,
            by_work_type,
            fingerprint,
        })
    }

    /// Load a rules CSV from disk
    pub fn from_csv_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Rules(format!("{}: {}", path.display(), e)))?;
        let label = path.display().to_string();
        let rules = parse_rules(&label, bytes.as_slice())?;
        let mut rule_set = Self::new(rules, &label)?;
        // Fingerprint the file as read, not the normalized export
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(label);
        rule_set.fingerprint = SourceFingerprint::of_bytes(&file_name, &bytes);

        info!("Loaded {} rules from {}", rule_set.len(), path.display());
        Ok(rule_set)
    }

    /// Rules file if given, else the built-in table
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_csv_file(path),
            None => {
                let rule_set = builtin_rules()?;
                info!("Using {} built-in rules", rule_set.len());
                Ok(rule_set)
            }
        }
    }

    pub fn rules(&self) -> &[UseCaseRule] {
        &self.rules
    }

    pub fn get(&self, index: usize) -> Option<&UseCaseRule> {
        self.rules.get(index)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Identity of the rule source for the quality report
    pub fn fingerprint(&self) -> &SourceFingerprint {
        &self.fingerprint
    }

    /// Rules listing a lowercased permit type, in declaration order
    pub fn candidates_for_permit_type(&self, permit_type_lower: &str) -> &[usize] {
        self.by_permit_type
            .get(permit_type_lower)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First rule listing a lowercased work type
    pub fn first_for_work_type(&self, work_type_lower: &str) -> Option<usize> {
        self.by_work_type.get(work_type_lower).copied()
    }

    /// Write the rules as CSV
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, to_csv_bytes(&self.rules)?)?;
        debug!("Wrote {} rules to {}", self.len(), path.display());
        Ok(())
    }
}

/// Wire shape of one rules CSV row
#[derive(Debug, Serialize, Deserialize)]
struct RuleRow {
    #[serde(alias = "Category")]
    category: String,
    #[serde(alias = "Sub-Category", alias = "Sub Category")]
    sub_category: String,
    #[serde(alias = "Use Case", default)]
    use_case: Option<String>,
    #[serde(default)]
    permit_types: String,
    #[serde(default)]
    keywords: String,
    #[serde(default)]
    work_types: String,
}

fn split_list(cell: &str) -> Vec<&str> {
    cell.split(LIST_SEPARATOR).collect()
}

fn parse_rules<R: std::io::Read>(label: &str, reader: R) -> Result<Vec<UseCaseRule>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut rules = Vec::new();
    for (i, row) in reader.deserialize::<RuleRow>().enumerate() {
        let row = row.map_err(|e| Error::Rules(format!("{}: row {}: {}", label, i + 1, e)))?;
        rules.push(UseCaseRule::new(
            &row.category,
            &row.sub_category,
            row.use_case.as_deref(),
            &split_list(&row.permit_types),
            &split_list(&row.keywords),
            &split_list(&row.work_types),
        ));
    }
    Ok(rules)
}

fn to_csv_bytes(rules: &[UseCaseRule]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for rule in rules {
        let separator = LIST_SEPARATOR.to_string();
        writer.serialize(RuleRow {
            category: rule.category.clone(),
            sub_category: rule.sub_category.clone(),
            use_case: rule.use_case.clone(),
            permit_types: rule.permit_types.join(&separator),
            keywords: rule.keywords.join(&separator),
            work_types: rule.work_types.join(&separator),
        })?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Rules(format!("CSV flush failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RULES_CSV: &str = "\
Category,Sub-Category,Use Case,permit_types,keywords,work_types
Trades,Plumbing,,Plumbing,,
Trades,Plumbing,Water heater,plumbing,Water Heater|hot water,
Construction,Building,Remodel,res|commercial,remodel,remodel
";

    #[test]
    fn test_parse_with_aliases_and_lists() {
        let rules = parse_rules("rules.csv", RULES_CSV.as_bytes()).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].use_case, None);
        assert_eq!(rules[0].permit_types, vec!["plumbing"]);
        assert!(rules[0].keywords.is_empty());
        assert_eq!(rules[1].keywords, vec!["water heater", "hot water"]);
        assert_eq!(rules[2].permit_types, vec!["res", "commercial"]);
    }

    #[test]
    fn test_keyword_edge_spaces_survive_parsing() {
        let csv = "category,sub_category,use_case,permit_types,keywords,work_types\n\
Trades,Mechanical,A/C,mechanical,\"a/c| ac \",\n";
        let rules = parse_rules("rules.csv", csv.as_bytes()).unwrap();
        assert_eq!(rules[0].keywords, vec!["a/c", " ac "]);

        let rule = &rules[0];
        assert_eq!(rule.keyword_hit(&keyword_haystack("New AC unit")), Some(" ac "));
        assert_eq!(rule.keyword_hit(&keyword_haystack("install ac")), Some(" ac "));
        assert_eq!(rule.keyword_hit(&keyword_haystack("Replace furnace")), None);
        assert_eq!(rule.keyword_hit(&keyword_haystack("back porch")), None);
    }

    #[test]
    fn test_indexes_preserve_declaration_order() {
        let rules = parse_rules("rules.csv", RULES_CSV.as_bytes()).unwrap();
        let set = RuleSet::new(rules, "rules.csv").unwrap();

        assert_eq!(set.candidates_for_permit_type("plumbing"), &[0, 1]);
        assert_eq!(set.candidates_for_permit_type("mechanical"), &[] as &[usize]);
        assert_eq!(set.first_for_work_type("remodel"), Some(2));
    }

    #[test]
    fn test_rule_without_matchers_rejected() {
        let rules = vec![UseCaseRule::new::<&str>("A", "B", None, &[], &[], &[])];
        let err = RuleSet::new(rules, "rules.csv").unwrap_err();
        assert!(matches!(err, Error::Rules(_)));
        assert!(err.to_string().contains("rule 1"));
    }

    #[test]
    fn test_empty_and_malformed_rules_rejected() {
        assert!(RuleSet::new(Vec::new(), "empty").is_err());

        let bad = "permit_types,keywords\nplumbing,\n";
        let err = parse_rules("bad.csv", bad.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("bad.csv"));
    }

    #[test]
    fn test_export_then_load_preserves_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.csv");

        let builtin = builtin_rules().unwrap();
        builtin.write_csv(&path).unwrap();
        let loaded = RuleSet::from_csv_file(&path).unwrap();

        assert_eq!(loaded.rules(), builtin.rules());
        assert_eq!(loaded.fingerprint().sha256, builtin.fingerprint().sha256);
    }

    #[test]
    fn test_missing_rules_file_is_rules_error() {
        let err = RuleSet::from_csv_file(Path::new("/nonexistent/rules.csv")).unwrap_err();
        assert!(matches!(err, Error::Rules(_)));
    }
}
