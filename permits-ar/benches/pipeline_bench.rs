//! Mapping and Aggregation Benchmark
//!
//! Measures use-case mapping and grouped aggregation over synthetic rows.
//!
//! **Goal:** the full export (~358K rows) maps and aggregates in seconds
//! **Target:** 50K rows map + category summary < 250ms

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use permits_ar::aggregator::{aggregate, AggregationContext};
use permits_ar::mapper::UseCaseMapper;
use permits_ar::reports::standard_reports;
use permits_ar::rules::RuleSet;
use permits_common::models::{PermitRecord, PermitStatus};

const PERMIT_TYPES: [&str; 6] = ["Plumbing", "Residential", "Mechanical", "Commercial", "Site", "Wrecking"];
const COMMENTS: [&str; 5] = [
    "replace water heater",
    "new deck addition",
    "install furnace and ac",
    "roof mounted solar",
    "interior remodel",
];
const STATUSES: [&str; 4] = ["Closed", "Issued", "Cancelled", "Open"];

fn synthetic_records(n: usize) -> Vec<PermitRecord> {
    let base = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default();
    (0..n)
        .map(|i| {
            let issued = base + chrono::Duration::days((i % 2_000) as i64);
            PermitRecord {
                row_number: i + 1,
                permit_number: format!("P{}", i),
                permit_type: Some(PERMIT_TYPES[i % PERMIT_TYPES.len()].to_string()),
                status: Some(PermitStatus::from_raw(STATUSES[i % STATUSES.len()])),
                value: Some(((i * 7919) % 100_000) as f64),
                total_fees: Some((i % 500) as f64),
                issue_date: Some(issued),
                complete_date: (i % 3 != 0).then(|| issued + chrono::Duration::days((i % 90) as i64)),
                applicant_name: Some(format!("Applicant {}", i % 250)),
                comments: Some(COMMENTS[i % COMMENTS.len()].to_string()),
                neighborhood: Some(format!("Neighborhood {}", i % 40)),
                ..Default::default()
            }
        })
        .collect()
}

fn bench_mapping(c: &mut Criterion) {
    let rules = RuleSet::load(None).expect("built-in rules");
    let mapper = UseCaseMapper::new(&rules);
    let mut group = c.benchmark_group("mapping");

    for n in [10_000, 50_000] {
        let records = synthetic_records(n);
        group.bench_with_input(BenchmarkId::new("map_all", n), &records, |b, records| {
            b.iter(|| black_box(mapper.map_all(records.clone())));
        });
    }
    group.finish();
}

fn bench_aggregation(c: &mut Criterion) {
    let rules = RuleSet::load(None).expect("built-in rules");
    let mapped = UseCaseMapper::new(&rules).map_all(synthetic_records(50_000));
    let ctx = AggregationContext::new("bench.csv");
    let reports = standard_reports(100).expect("standard reports");
    let mut group = c.benchmark_group("aggregation");

    for report in &reports {
        group.bench_function(report.name.as_str(), |b| {
            b.iter(|| black_box(aggregate(&mapped, &report.group_by, &report.metrics, &ctx)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mapping, bench_aggregation);
criterion_main!(benches);
