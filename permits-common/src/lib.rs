//! # Permits Common Library
//!
//! Shared code for the permit analysis workspace including:
//! - Error taxonomy (schema, rules, I/O, configuration)
//! - Configuration loading and resolution
//! - Logging initialization
//! - Permit / mapped record / aggregate metric data model
//! - Date parsing and fixed-precision number formatting
//! - Source file fingerprinting

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod format;
pub mod logging;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{AggregateMetric, MappedRecord, MatchBasis, PermitRecord};
