//! Config file location and graceful degradation
//!
//! Uses serial_test: PERMITS_CONFIG is process-global.

use permits_common::config::{
    load_config, load_toml_config, write_toml_config, ReportConfig, TomlConfig, ZeroPolicy,
    CONFIG_ENV_VAR,
};
use permits_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_explicit_path_loads() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("permits-ar.toml");
    std::fs::write(&path, "top_n = 7\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config = load_config(Some(&path)).unwrap();

    assert_eq!(config.top_n, Some(7));
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_explicit_missing_path_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();

    let result = load_config(Some(&dir.path().join("absent.toml")));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_var_names_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("from-env.toml");
    std::fs::write(&path, "stale_after_days = 365\n").unwrap();
    env::set_var(CONFIG_ENV_VAR, &path);

    let config = load_config(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().stale_after_days, Some(365));
}

#[test]
#[serial]
fn test_cli_path_beats_env_var() {
    let dir = TempDir::new().unwrap();
    let env_path = dir.path().join("env.toml");
    let cli_path = dir.path().join("cli.toml");
    std::fs::write(&env_path, "top_n = 1\n").unwrap();
    std::fs::write(&cli_path, "top_n = 2\n").unwrap();
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let config = load_config(Some(&cli_path));
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().top_n, Some(2));
}

#[test]
fn test_malformed_toml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "top_n = \"many\"\n").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Toml(_))));
}

#[test]
fn test_write_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("permits-ar.toml");
    let config = TomlConfig {
        source_file: Some(PathBuf::from("source/CCS_Permits.csv")),
        zero_policy: Some(ZeroPolicy::Exclude),
        reports: vec![ReportConfig {
            name: "by_ward".to_string(),
            group_by: vec!["ward".to_string()],
            metrics: vec!["count".to_string(), "median:value".to_string()],
            rank_by: Some("count".to_string()),
            limit: Some(10),
        }],
        ..Default::default()
    };

    write_toml_config(&config, &path).unwrap();

    assert_eq!(load_toml_config(&path).unwrap(), config);
    assert!(!dir.path().join("nested").join("permits-ar.toml.tmp").exists());
}

#[test]
fn test_write_replaces_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("permits-ar.toml");
    std::fs::write(&path, "garbage that is not toml {{{").unwrap();

    let config = TomlConfig {
        top_n: Some(3),
        ..Default::default()
    };
    write_toml_config(&config, &path).unwrap();

    assert_eq!(load_toml_config(&path).unwrap().top_n, Some(3));
}
