//! permits-ar - Permit Analysis & Reporting
//!
//! **Commands:**
//! - `run`: validate, map, aggregate and emit every report
//! - `validate`: schema/row validation only (`validation_report.json`)
//! - `export-rules`: write the active rule set as a rules CSV
//! - `init-config`: write a default TOML configuration file
//!
//! Settings resolve CLI > environment > TOML > compiled defaults.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use permits_ar::emitter::log_written;
use permits_ar::pipeline::{CliOverrides, Pipeline, PipelineConfig};
use permits_ar::rules::RuleSet;
use permits_common::config::{
    default_config_path, load_config, resolve_path, write_toml_config, CompiledDefaults,
    LoggingConfig, TomlConfig, ZeroPolicy, RULES_ENV_VAR,
};
use permits_common::logging::init_tracing;
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments for permits-ar
#[derive(Parser, Debug)]
#[command(name = "permits-ar")]
#[command(about = "Permit categorization and metrics reporting")]
#[command(version)]
struct Cli {
    /// TOML config file (else PERMITS_CONFIG, else the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write all reports
    Run(RunArgs),
    /// Validate the permits CSV and write validation_report.json
    Validate(SourceArgs),
    /// Write the active rule set as a rules CSV
    ExportRules {
        /// Destination CSV
        #[arg(short, long)]
        output: PathBuf,
        /// Rules CSV to re-export (default: built-in rules)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Write a default configuration file
    InitConfig {
        /// Destination (default: platform config path)
        #[arg(short, long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Permits export CSV
    #[arg(short, long)]
    source: Option<PathBuf>,
    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    io: SourceArgs,
    /// Use-case rules CSV (default: built-in rules)
    #[arg(short, long)]
    rules: Option<PathBuf>,
    /// Length of ranked applicant list
    #[arg(long)]
    top_n: Option<usize>,
    /// Reference date for stale permits (default: latest issue date)
    #[arg(long)]
    as_of: Option<NaiveDate>,
    /// First issue date in scope (inclusive)
    #[arg(long)]
    since: Option<NaiveDate>,
    /// Last issue date in scope (inclusive)
    #[arg(long)]
    until: Option<NaiveDate>,
    /// Aggregate on the current thread only
    #[arg(long)]
    sequential: bool,
}

fn log_build_info() {
    info!(
        "permits-ar v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        config,
        log_level,
        command,
    } = Cli::parse();

    // init-config must work without (or with a broken) existing config
    if let Command::InitConfig { path, force } = command {
        init_tracing(&LoggingConfig {
            level: log_level.unwrap_or_else(|| "info".to_string()),
            file: None,
        })?;
        return init_config(path, force);
    }

    let toml = load_config(config.as_deref()).context("Failed to load configuration")?;

    let mut logging = toml.logging.clone();
    if let Some(level) = log_level {
        logging.level = level;
    }
    init_tracing(&logging).context("Failed to initialize logging")?;
    log_build_info();

    execute(command, &toml).await
}

async fn execute(command: Command, toml: &TomlConfig) -> Result<()> {
    match command {
        Command::Run(args) => {
            let overrides = CliOverrides {
                source_file: args.io.source,
                rules_file: args.rules,
                output_dir: args.io.output_dir,
                top_n: args.top_n,
                as_of: args.as_of,
                since: args.since,
                until: args.until,
                sequential: args.sequential,
            };
            let config = PipelineConfig::resolve(toml, &overrides);
            let source = config.source_file.clone();
            let summary = Pipeline::new(config)
                .run()
                .await
                .with_context(|| format!("Run failed for {}", source.display()))?;

            log_written(&summary.files_written);
            println!(
                "run {}: {} rows ({} valid, {} flagged), {} in scope, {} unmapped, {} metrics",
                summary.run_id,
                summary.total_rows,
                summary.valid_rows,
                summary.flagged_rows,
                summary.in_scope_rows,
                summary.unmapped_rows,
                summary.metrics_emitted
            );
        }
        Command::Validate(args) => {
            let overrides = CliOverrides {
                source_file: args.source,
                output_dir: args.output_dir,
                ..Default::default()
            };
            let config = PipelineConfig::resolve(toml, &overrides);
            let source = config.source_file.clone();
            let (report, path) = Pipeline::new(config)
                .validate_only()
                .with_context(|| format!("Validation failed for {}", source.display()))?;

            println!(
                "{}: {} rows, {} valid, {} flagged, {} issues -> {}",
                report.source_file,
                report.total_rows,
                report.valid_rows,
                report.flagged_rows,
                report.total_issues(),
                path.display()
            );
        }
        Command::ExportRules { output, rules } => {
            let rules_path = resolve_path(
                "rules_file",
                rules.as_deref(),
                RULES_ENV_VAR,
                toml.rules_file.as_deref(),
                None,
            );
            let rule_set = RuleSet::load(rules_path.as_deref()).context("Failed to load rules")?;
            rule_set
                .write_csv(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{} rules -> {}", rule_set.len(), output.display());
        }
        Command::InitConfig { path, force } => init_config(path, force)?,
    }

    Ok(())
}

/// Default config with every compiled default spelled out
fn default_toml() -> TomlConfig {
    let defaults = CompiledDefaults::default();
    TomlConfig {
        source_file: Some(defaults.source_file),
        output_dir: Some(defaults.output_dir),
        stale_after_days: Some(defaults.stale_after_days),
        top_n: Some(defaults.top_n),
        parallel: Some(defaults.parallel),
        zero_policy: Some(ZeroPolicy::Include),
        max_examples: Some(defaults.max_examples),
        ..Default::default()
    }
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path.or_else(default_config_path) {
        Some(path) => path,
        None => bail!("No platform config directory; pass --path"),
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    write_toml_config(&default_toml(), &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote default config to {}", path.display());
    println!("{}", path.display());
    Ok(())
}
