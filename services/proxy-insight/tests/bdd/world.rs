//! BDD test world for proxy-insight

use std::sync::Arc;

use cucumber::World;
use proxy_insight::history::{HistoryCache, PageOutcome, PageRequest};
use proxy_insight::metrics::MetricsAggregator;
use proxy_insight::{Config, DashboardSession};
use tokio::time::Instant;

use crate::common::FakeBackend;

#[derive(Default, World)]
pub struct InsightWorld {
    // Aggregator testing
    pub metrics: Option<MetricsAggregator>,

    // History cache testing
    pub history: Option<HistoryCache>,
    pub clock_start: Option<Instant>,
    pub requests: Vec<PageRequest>,
    pub last_outcome: Option<PageOutcome>,

    // Session testing
    pub backend: Option<Arc<FakeBackend>>,
    pub session: Option<DashboardSession>,
    pub bootstrap_result: Option<proxy_insight::Result<()>>,
}

impl std::fmt::Debug for InsightWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightWorld")
            .field("metrics", &self.metrics)
            .field("history", &self.history)
            .field("requests", &self.requests)
            .field("last_outcome", &self.last_outcome)
            .field("session", &self.session.as_ref().map(|s| s.view()))
            .finish()
    }
}

impl InsightWorld {
    pub fn metrics(&mut self) -> &mut MetricsAggregator {
        self.metrics.get_or_insert_with(|| MetricsAggregator::new(15))
    }

    pub fn history(&mut self) -> &mut HistoryCache {
        self.history.as_mut().expect("history cache not created")
    }

    /// Instant `ms` milliseconds after the scenario's clock started
    pub fn at(&mut self, ms: u64) -> Instant {
        let start = *self.clock_start.get_or_insert_with(Instant::now);
        start + std::time::Duration::from_millis(ms)
    }

    pub fn backend(&self) -> &Arc<FakeBackend> {
        self.backend.as_ref().expect("backend not created")
    }

    pub fn session(&mut self) -> &mut DashboardSession {
        self.session.as_mut().expect("session not started")
    }

    pub fn start_session(&mut self) {
        let backend = Arc::clone(self.backend());
        self.session = Some(DashboardSession::new(&Config::default(), backend));
    }

    pub async fn bootstrap(&mut self) {
        self.start_session();
        let result = self.session().bootstrap().await;
        self.bootstrap_result = Some(result);
    }
}
