//! Step definitions for session.feature

use std::sync::Arc;

use cucumber::{given, then, when};
use proxy_insight::feed::NoticeLevel;

use crate::common::FakeBackend;
use crate::world::InsightWorld;

#[given(expr = "a backend whose status check fails with {string}")]
fn failing_status(world: &mut InsightWorld, reason: String) {
    let backend = FakeBackend::with_records(3);
    backend.state().status_error = Some(reason);
    world.backend = Some(Arc::new(backend));
}

#[given(expr = "a backend with {int} stored records whose history fails with {string}")]
fn failing_history(world: &mut InsightWorld, count: usize, reason: String) {
    let backend = FakeBackend::with_records(count);
    backend.state().history_error = Some(reason);
    world.backend = Some(Arc::new(backend));
}

#[given(expr = "a dashboard bootstrapped against a backend that rejects toggles with {string}")]
async fn rejecting_toggles(world: &mut InsightWorld, reason: String) {
    let backend = FakeBackend::new();
    backend.state().toggle_rejection = Some(reason);
    world.backend = Some(Arc::new(backend));
    world.bootstrap().await;
}

#[when("the dashboard starts")]
async fn dashboard_starts(world: &mut InsightWorld) {
    world.bootstrap().await;
}

#[when("the proxy is switched on")]
fn switch_on(world: &mut InsightWorld) {
    world.session().toggle_proxy(true);
}

#[when("all records are cleared")]
fn clear_all(world: &mut InsightWorld) {
    world.session().clear_all();
}

#[when("pending requests settle")]
async fn settle(world: &mut InsightWorld) {
    world.session().settle().await;
}

#[when(expr = "record {string} is opened on the {string} tab")]
fn open_record(world: &mut InsightWorld, id: String, tab: String) {
    let session = world.session();
    assert!(session.select(id.parse().expect("bad record id")));
    session.select_tab(tab.parse().expect("bad tab"));
}

#[then("startup fails")]
fn startup_fails(world: &mut InsightWorld) {
    assert!(matches!(world.bootstrap_result, Some(Err(_))));
}

#[then("startup succeeds")]
fn startup_succeeds(world: &mut InsightWorld) {
    assert!(matches!(world.bootstrap_result, Some(Ok(()))));
}

#[then("no history was requested")]
fn no_history_requested(world: &mut InsightWorld) {
    assert!(world.backend().history_queries().is_empty());
}

#[then(expr = "an error toast mentions {string}")]
fn error_toast(world: &mut InsightWorld, text: String) {
    let view = world.session().view();
    assert!(
        view.toasts
            .iter()
            .any(|t| t.level == NoticeLevel::Error && t.message.contains(&text)),
        "{:?}",
        view.toasts
    );
}

#[then(expr = "the proxy switch shows {word}")]
fn proxy_switch(world: &mut InsightWorld, state: String) {
    let expected = match state.as_str() {
        "on" => true,
        "off" => false,
        other => panic!("unknown switch state {other}"),
    };
    assert_eq!(world.session().view().proxy.running, expected);
}

#[then(expr = "the detail shows {string}")]
fn detail_shows(world: &mut InsightWorld, text: String) {
    let view = world.session().view();
    let selection = view.selection.as_ref().expect("nothing selected");
    assert!(
        selection
            .sections()
            .iter()
            .any(|s| s.content.contains(&text)),
        "{:?}",
        selection.sections()
    );
}

#[then("nothing is selected")]
fn nothing_selected(world: &mut InsightWorld) {
    assert!(world.session().view().selection.is_none());
}
