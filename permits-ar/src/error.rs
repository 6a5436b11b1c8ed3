//! Error types for permits-ar

use thiserror::Error;

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Analysis error type
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// permits-common error (I/O, schema, rules, configuration)
    #[error(transparent)]
    Common(#[from] permits_common::Error),

    /// Aggregation worker panicked or was cancelled
    #[error("Aggregation worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// Report definition names an unknown group field or metric
    #[error("Invalid report '{report}': {message}")]
    Report { report: String, message: String },
}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        AnalysisError::Common(err.into())
    }
}

impl From<csv::Error> for AnalysisError {
    fn from(err: csv::Error) -> Self {
        AnalysisError::Common(err.into())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Common(err.into())
    }
}
