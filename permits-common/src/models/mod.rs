//! Pipeline data model
//!
//! - [`PermitRecord`]: one source row, read-only once loaded
//! - [`MappedRecord`]: a permit plus its classification labels and match basis
//! - [`AggregateMetric`]: one computed number with its provenance envelope

pub mod mapped;
pub mod metric;
pub mod permit;

pub use mapped::{Classification, MappedRecord, MatchBasis};
pub use metric::{AggregateMetric, ExclusionReason, GroupKey, MetricUnit};
pub use permit::{PermitField, PermitRecord, PermitStatus, StatusClass};
