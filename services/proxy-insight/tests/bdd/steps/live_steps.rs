//! Step definitions for live.feature

use cucumber::{then, when};

use crate::world::InsightWorld;

#[when(expr = "{int} live transactions arrive")]
fn live_transactions(world: &mut InsightWorld, count: usize) {
    let session = world.session();
    for i in 0..count {
        session.handle_live(&format!(
            r#"{{"method":"GET","url":"http://live.test/{}","status":"200","time":"{}ms"}}"#,
            i,
            10 * (i + 1)
        ));
    }
}

#[when(expr = "the live message {string} arrives")]
fn live_message(world: &mut InsightWorld, message: String) {
    world.session().handle_live(&message);
}

#[when("the feed is opened")]
fn feed_opened(world: &mut InsightWorld) {
    world.session().open_feed();
}

#[when("all notifications are marked read")]
fn mark_read(world: &mut InsightWorld) {
    world.session().mark_all_read();
}

#[then(expr = "the dashboard shows {int} requests and {int} records")]
fn dashboard_shows(world: &mut InsightWorld, total: u64, records: usize) {
    let view = world.session().view();
    assert_eq!(view.stats.total, total);
    assert_eq!(view.records.len(), records);
}

#[then("the trend is all zeros")]
fn trend_zeros(world: &mut InsightWorld) {
    let view = world.session().view();
    assert_eq!(view.trend.len(), 15);
    assert!(view.trend.iter().all(|&s| s == 0), "{:?}", view.trend);
}

#[then(expr = "the newest record is {string}")]
fn newest_record(world: &mut InsightWorld, url: String) {
    let view = world.session().view();
    assert_eq!(view.records.first().map(|r| r.url.as_str()), Some(url.as_str()));
}

#[then(expr = "the unread badge reads {string}")]
fn badge_reads(world: &mut InsightWorld, label: String) {
    assert_eq!(world.session().view().badge, Some(label));
}

#[then("the unread badge is hidden")]
fn badge_hidden(world: &mut InsightWorld) {
    assert_eq!(world.session().view().badge, None);
}

#[then(expr = "{int} notification(s) is/are listed")]
fn notifications_listed(world: &mut InsightWorld, count: usize) {
    assert_eq!(world.session().view().notifications.len(), count);
}
