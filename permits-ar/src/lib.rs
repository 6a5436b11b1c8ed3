//! permits-ar library interface
//!
//! Analysis & Reporting over the municipal permits export: schema
//! validation, use-case mapping, grouped metrics with exclusion accounting,
//! and CSV/JSON report emission. The `permits-ar` binary is a thin CLI over
//! [`pipeline::Pipeline`]; integration tests drive the same API.

pub mod aggregator;
pub mod applicant;
pub mod emitter;
pub mod error;
pub mod loader;
pub mod mapper;
pub mod pipeline;
pub mod reports;
pub mod rules;
pub mod schema;
pub mod validator;

pub use crate::error::{AnalysisError, Result};
pub use crate::pipeline::{CliOverrides, Pipeline, PipelineConfig, RunSummary};
