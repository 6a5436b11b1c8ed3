//! Ranked report ordering
//!
//! Groups are ordered by one metric's value, highest first. Equal values
//! (and groups without a value, which sort last) fall back to ascending
//! group key, so ties always come out alphabetically.

use permits_common::models::{AggregateMetric, GroupKey};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Order groups of a flat metric list by `rank_by`, keeping at most `limit`
///
/// Metrics of one group stay together and keep their relative order.
pub fn rank(
    metrics: Vec<AggregateMetric>,
    rank_by: &str,
    limit: Option<usize>,
) -> Vec<AggregateMetric> {
    // Group keys in first-appearance order, with their ranking value
    let mut order: Vec<(GroupKey, Option<f64>)> = Vec::new();
    let mut position: HashMap<GroupKey, usize> = HashMap::new();
    for metric in &metrics {
        let slot = *position.entry(metric.group_key.clone()).or_insert_with(|| {
            order.push((metric.group_key.clone(), None));
            order.len() - 1
        });
        if metric.metric_name == rank_by {
            order[slot].1 = metric.value;
        }
    }

    order.sort_by(|(key_a, a), (key_b, b)| compare_ranked(*a, *b).then_with(|| key_a.cmp(key_b)));
    if let Some(limit) = limit {
        order.truncate(limit);
    }

    let rank_of: HashMap<&GroupKey, usize> = order
        .iter()
        .enumerate()
        .map(|(i, (key, _))| (key, i))
        .collect();

    let mut kept: Vec<(usize, AggregateMetric)> = metrics
        .into_iter()
        .filter_map(|m| rank_of.get(&m.group_key).map(|&r| (r, m)))
        .collect();
    // Stable: per-group metric order survives
    kept.sort_by_key(|(r, _)| *r);
    kept.into_iter().map(|(_, m)| m).collect()
}

/// Descending by value, `None` last
fn compare_ranked(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
