//! Configuration loading and resolution
//!
//! Bootstrap configuration lives in a TOML file. Every setting resolves in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file found by the implicit search is not
//! fatal: a warning is logged and compiled defaults apply. A file named
//! explicitly (`--config` or `PERMITS_CONFIG`) must exist and parse.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PERMITS_CONFIG";
/// Environment variable overriding the permits CSV path
pub const SOURCE_ENV_VAR: &str = "PERMITS_SOURCE_FILE";
/// Environment variable overriding the rules CSV path
pub const RULES_ENV_VAR: &str = "PERMITS_RULES_FILE";
/// Environment variable overriding the output directory
pub const OUTPUT_ENV_VAR: &str = "PERMITS_OUTPUT_DIR";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Permits export CSV
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,

    /// Use-case rules CSV (built-in rule set when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,

    /// Directory receiving report files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Override of the required source columns (header names)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_columns: Option<Vec<String>>,

    /// Reference date for stale-permit detection (default: latest issue date)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,

    /// Days after issue before an open permit without completion counts as stale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after_days: Option<i64>,

    /// Length of ranked lists (top applicants)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,

    /// Aggregate partitions on the blocking thread pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    /// Treatment of zero currency values in means
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_policy: Option<ZeroPolicy>,

    /// Example issues kept in the validation report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_examples: Option<usize>,

    /// Issue-date scope of the analysis
    #[serde(default)]
    pub window: DateWindow,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Report definitions replacing the standard set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<ReportConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Zero-value treatment for currency means
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroPolicy {
    /// Zeros count toward the mean; a mean-of-nonzero is reported alongside
    #[default]
    Include,
    /// Zeros are excluded from the mean with reason `zero_value`
    Exclude,
}

/// Inclusive issue-date window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,
}

impl DateWindow {
    /// Whether the window restricts anything
    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }

    /// Whether a record with this issue date is in scope
    ///
    /// Records without an issue date are out of scope of a bounded window.
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.since.map_or(true, |s| date >= s) && self.until.map_or(true, |u| date <= u)
    }
}

/// One report definition from TOML
///
/// ```toml
/// [[reports]]
/// name = "plumbing_use_cases"
/// group_by = ["sub_category", "use_case"]
/// metrics = ["count", "median:value", "processing:p90", "rate:abandoned"]
/// rank_by = "count"
/// limit = 25
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub name: String,
    #[serde(default)]
    pub group_by: Vec<String>,
    pub metrics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Compiled defaults used when no other source provides a value
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub source_file: PathBuf,
    pub output_dir: PathBuf,
    pub stale_after_days: i64,
    pub top_n: usize,
    pub parallel: bool,
    pub max_examples: usize,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            source_file: PathBuf::from("source/CCS_Permits.csv"),
            output_dir: PathBuf::from("reports/data"),
            stale_after_days: 730,
            top_n: 100,
            parallel: true,
            max_examples: 50,
            log_level: default_log_level(),
        }
    }
}

/// Platform config file location: `<config_dir>/permits/permits-ar.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("permits").join("permits-ar.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Locate and load the bootstrap config
///
/// Explicit locations (`cli_path`, then `PERMITS_CONFIG`) must load.
/// The implicit platform location degrades to defaults with a warning.
pub fn load_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = cli_path {
        info!("Loading config from command line: {}", path.display());
        return load_toml_config(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        info!("Loading config from {}: {}", CONFIG_ENV_VAR, path.display());
        return load_toml_config(&path);
    }

    match default_config_path() {
        Some(path) if path.exists() => match load_toml_config(&path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Ok(TomlConfig::default())
            }
        },
        _ => {
            debug!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Resolve one path setting: CLI > ENV > TOML > default
pub fn resolve_path(
    setting: &str,
    cli_value: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
    default: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = cli_value {
        debug!("{} from command line: {}", setting, path.display());
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            debug!("{} from {}: {}", setting, env_var_name, path);
            return Some(PathBuf::from(path));
        }
    }

    if let Some(path) = toml_value {
        debug!("{} from config file: {}", setting, path.display());
        return Some(path.to_path_buf());
    }

    default.map(Path::to_path_buf)
}

/// Write a config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: TomlConfig = toml::from_str("source_file = \"permits.csv\"").unwrap();
        assert_eq!(config.source_file, Some(PathBuf::from("permits.csv")));
        assert_eq!(config.logging.level, "info");
        assert!(config.reports.is_empty());
        assert!(config.window.is_unbounded());
    }

    #[test]
    fn test_parse_full_config() {
        let text = r#"
            source_file = "source/CCS_Permits.csv"
            rules_file = "rules.csv"
            output_dir = "out"
            as_of = "2025-06-30"
            stale_after_days = 365
            top_n = 20
            parallel = false
            zero_policy = "exclude"

            [window]
            since = "2024-06-01"

            [logging]
            level = "debug"

            [[reports]]
            name = "by_ward"
            group_by = ["ward"]
            metrics = ["count", "sum:value"]
            rank_by = "count"
            limit = 5
        "#;
        let config: TomlConfig = toml::from_str(text).unwrap();

        assert_eq!(config.as_of, Some(ymd(2025, 6, 30)));
        assert_eq!(config.zero_policy, Some(ZeroPolicy::Exclude));
        assert_eq!(config.parallel, Some(false));
        assert_eq!(config.window.since, Some(ymd(2024, 6, 1)));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.reports.len(), 1);
        assert_eq!(config.reports[0].limit, Some(5));
    }

    #[test]
    fn test_unknown_zero_policy_rejected() {
        let result: std::result::Result<TomlConfig, _> = toml::from_str("zero_policy = \"maybe\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_window_contains() {
        let window = DateWindow {
            since: Some(ymd(2024, 6, 1)),
            until: Some(ymd(2024, 12, 31)),
        };
        assert!(window.contains(Some(ymd(2024, 6, 1))));
        assert!(window.contains(Some(ymd(2024, 12, 31))));
        assert!(!window.contains(Some(ymd(2024, 5, 31))));
        assert!(!window.contains(None));

        assert!(DateWindow::default().contains(None));
    }

    #[test]
    fn test_resolve_path_cli_wins() {
        let resolved = resolve_path(
            "source_file",
            Some(Path::new("cli.csv")),
            "PERMITS_TEST_UNSET_VARIABLE",
            Some(Path::new("toml.csv")),
            Some(Path::new("default.csv")),
        );
        assert_eq!(resolved, Some(PathBuf::from("cli.csv")));
    }

    #[test]
    fn test_resolve_path_toml_then_default() {
        let resolved = resolve_path(
            "source_file",
            None,
            "PERMITS_TEST_UNSET_VARIABLE",
            Some(Path::new("toml.csv")),
            Some(Path::new("default.csv")),
        );
        assert_eq!(resolved, Some(PathBuf::from("toml.csv")));

        let resolved = resolve_path(
            "source_file",
            None,
            "PERMITS_TEST_UNSET_VARIABLE",
            None,
            Some(Path::new("default.csv")),
        );
        assert_eq!(resolved, Some(PathBuf::from("default.csv")));
    }
}
