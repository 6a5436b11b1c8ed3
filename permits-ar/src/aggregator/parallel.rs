//! Partitioned aggregation on the blocking pool
//!
//! Rows are split by the label of the first group field, so no group spans
//! two partitions. Each partition runs [`aggregate_indices`] in its own
//! `spawn_blocking` task over a shared read-only `Arc` of the rows and
//! returns its own metric list. Lists are concatenated and stably sorted by
//! group key, which reproduces the sequential output exactly.

use super::{aggregate, aggregate_indices, AggregationContext, GroupField, MetricSpec};
use crate::error::Result;
use permits_common::models::{AggregateMetric, MappedRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Aggregate with one blocking task per partition
///
/// Falls back to the sequential path when there is nothing to partition on.
pub async fn aggregate_partitioned(
    rows: Arc<Vec<MappedRecord>>,
    group_by: &[GroupField],
    metrics: &[MetricSpec],
    ctx: &AggregationContext,
) -> Result<Vec<AggregateMetric>> {
    let Some(&partition_field) = group_by.first() else {
        return Ok(aggregate(&rows, group_by, metrics, ctx));
    };

    let mut partitions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        partitions
            .entry(partition_field.label(row))
            .or_default()
            .push(i);
    }

    debug!(
        "Aggregating {} rows in {} partitions by {}",
        rows.len(),
        partitions.len(),
        partition_field
    );

    let population = rows.len();
    let group_by: Arc<[GroupField]> = Arc::from(group_by);
    let metrics: Arc<[MetricSpec]> = Arc::from(metrics);
    let ctx = Arc::new(ctx.clone());

    let mut handles = Vec::with_capacity(partitions.len());
    for (_, indices) in partitions {
        let rows = Arc::clone(&rows);
        let group_by = Arc::clone(&group_by);
        let metrics = Arc::clone(&metrics);
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::task::spawn_blocking(move || {
            aggregate_indices(&rows, &indices, population, &group_by, &metrics, &ctx)
        }));
    }

    let mut merged = Vec::new();
    for handle in handles {
        merged.extend(handle.await?);
    }
    merged.sort_by(|a, b| a.group_key.cmp(&b.group_key));

    Ok(merged)
}
