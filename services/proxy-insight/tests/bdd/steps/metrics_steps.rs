//! Step definitions for metrics.feature

use cucumber::{given, then, when};
use proxy_insight::metrics::{MetricsAggregator, StatsSnapshot};
use proxy_insight::record::TransactionRecord;

use crate::world::InsightWorld;

#[given("an empty aggregator")]
fn empty_aggregator(world: &mut InsightWorld) {
    world.metrics = Some(MetricsAggregator::new(15));
}

#[given(
    expr = "a stats snapshot with total {int}, success {int}, error {int} and average latency {int}"
)]
fn stats_snapshot(world: &mut InsightWorld, total: u64, success: u64, error: u64, avg: u64) {
    world.metrics().init_from_snapshot(&StatsSnapshot {
        total,
        success,
        error,
        avg_latency: avg,
    });
}

#[when(expr = "a transaction with status {string} and time {string} is ingested")]
fn ingest_transaction(world: &mut InsightWorld, status: String, time: String) {
    let record = TransactionRecord::new("GET", "http://bdd.test/")
        .with_status(status)
        .with_time(time);
    world.metrics().ingest(&record);
}

#[when(expr = "{int} transactions with times 1 to {int} ms are ingested")]
fn ingest_series(world: &mut InsightWorld, count: u64, last: u64) {
    assert_eq!(count, last, "series must count up from 1");
    for ms in 1..=last {
        let record = TransactionRecord::new("GET", "http://bdd.test/").with_time(format!("{}ms", ms));
        world.metrics().ingest(&record);
    }
}

#[then(expr = "the average latency is {int} ms")]
fn average_latency(world: &mut InsightWorld, expected: u64) {
    assert_eq!(world.metrics().stats().average_latency_ms, expected);
}

#[then(expr = "the cumulative latency is {int} ms")]
fn cumulative_latency(world: &mut InsightWorld, expected: u64) {
    assert_eq!(world.metrics().stats().cumulative_latency_ms, expected);
}

#[then(expr = "the totals are {int} requests, {int} successes and {int} errors")]
fn totals(world: &mut InsightWorld, total: u64, success: u64, error: u64) {
    let stats = world.metrics().stats();
    assert_eq!(
        (stats.total, stats.success, stats.error),
        (total, success, error)
    );
}

#[then(expr = "the success rate is {int} percent")]
fn success_rate(world: &mut InsightWorld, expected: u64) {
    assert_eq!(world.metrics().stats().success_rate, expected);
}

#[then(expr = "the trend holds the samples {int} to {int}")]
fn trend_holds(world: &mut InsightWorld, first: u64, last: u64) {
    let samples: Vec<u64> = world.metrics().trend().samples().collect();
    assert_eq!(samples, (first..=last).collect::<Vec<_>>());
}
