//! Step definitions for history.feature

use std::time::Duration;

use cucumber::{given, then, when};
use proxy_insight::history::{HistoryCache, PageOutcome};
use proxy_insight::record::TransactionRecord;

use crate::common::FakeBackend;
use crate::world::InsightWorld;

fn page(prefix: &str, count: usize) -> Vec<TransactionRecord> {
    (0..count)
        .map(|i| TransactionRecord::new("GET", format!("http://{}.test/{}", prefix, i)))
        .collect()
}

#[given("a history cache")]
fn history_cache(world: &mut InsightWorld) {
    world.history = Some(HistoryCache::new(50, Duration::from_millis(500), 500));
}

#[given("a page request is issued for the current query")]
fn page_request_issued(world: &mut InsightWorld) {
    let request = world.history().begin_load().expect("load refused");
    world.requests.push(request);
}

#[given(expr = "a dashboard bootstrapped against a backend with {int} stored records")]
async fn bootstrapped_dashboard(world: &mut InsightWorld, count: usize) {
    world.backend = Some(std::sync::Arc::new(FakeBackend::with_records(count)));
    world.bootstrap().await;
}

#[when("the next page is loaded")]
async fn next_page(world: &mut InsightWorld) {
    let session = world.session();
    assert!(session.load_more(), "no page was requested");
    session.settle().await;
}

#[when(expr = "the query is typed as {string} at {int} ms")]
fn type_query(world: &mut InsightWorld, query: String, ms: u64) {
    let now = world.at(ms);
    world.history().set_query(&query, now);
}

#[when(expr = "the debounce is checked at {int} ms")]
fn check_debounce(world: &mut InsightWorld, ms: u64) {
    let now = world.at(ms);
    if let Some(request) = world.history().commit_due(now) {
        world.requests.push(request);
    }
}

#[when(expr = "the first page request returns {int} records")]
fn first_request_returns(world: &mut InsightWorld, count: usize) {
    let request = world.requests.first().cloned().expect("no request issued");
    let outcome = world
        .history()
        .complete_load(&request, page(&request.query, count));
    world.last_outcome = Some(outcome);
}

#[when(expr = "the latest page request returns {int} records")]
fn latest_request_returns(world: &mut InsightWorld, count: usize) {
    let request = world.requests.last().cloned().expect("no request issued");
    let outcome = world
        .history()
        .complete_load(&request, page(&request.query, count));
    world.last_outcome = Some(outcome);
}

#[then(expr = "exactly one search for {string} was committed")]
fn one_search_committed(world: &mut InsightWorld, query: String) {
    let queries: Vec<&str> = world.requests.iter().map(|r| r.query.as_str()).collect();
    assert_eq!(queries, vec![query.as_str()]);
}

#[then("no search was committed")]
fn no_search_committed(world: &mut InsightWorld) {
    assert!(world.requests.is_empty(), "{:?}", world.requests);
}

#[then("the page is discarded")]
fn page_discarded(world: &mut InsightWorld) {
    assert_eq!(world.last_outcome, Some(PageOutcome::Stale));
}

#[then(expr = "the cache holds {int} records for {string}")]
fn cache_holds(world: &mut InsightWorld, count: usize, query: String) {
    let history = world.history();
    assert_eq!(history.query(), query);
    assert_eq!(history.len(), count);
    assert!(history
        .records()
        .all(|r| r.url.starts_with(&format!("http://{}.test/", query))));
}

#[then(expr = "the offset is {int} and more pages remain")]
fn offset_more_remain(world: &mut InsightWorld, offset: usize) {
    let history = world.session().history();
    assert_eq!(history.offset(), offset);
    assert!(!history.is_exhausted());
}

#[then(expr = "the offset is {int} and no pages remain")]
fn offset_exhausted(world: &mut InsightWorld, offset: usize) {
    let history = world.session().history();
    assert_eq!(history.offset(), offset);
    assert!(history.is_exhausted());
}
