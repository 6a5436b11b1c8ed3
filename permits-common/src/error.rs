//! Common error types for the permits workspace
//!
//! Only file-level and schema-level problems are errors. Row-level problems
//! (bad values, unmapped rows, metric exclusions) are recorded as data in the
//! validation report and metric envelopes instead.

use thiserror::Error;

/// Common result type for permit pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the permits crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read or write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required columns absent from the source table (fatal to the run)
    #[error("Schema error: missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Rule set could not be loaded or is malformed (fatal to the run)
    #[error("Rule set error: {0}")]
    Rules(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
