//! In-memory capture backend shared by the integration and BDD tests

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use proxy_insight::backend::{Backend, ConfigUpdate, MutationResponse, ProxyStatus};
use proxy_insight::history::matches_query;
use proxy_insight::metrics::StatsSnapshot;
use proxy_insight::record::{RecordId, TransactionRecord};
use proxy_insight::{InsightError, Result};

#[derive(Debug, Default)]
pub struct FakeState {
    pub running: bool,
    pub stats: StatsSnapshot,
    /// Persisted records, in the order the store returns them
    pub store: Vec<TransactionRecord>,
    pub status_error: Option<String>,
    pub history_error: Option<String>,
    /// History failures for one query only, keyed by query
    pub history_query_errors: Vec<(String, String)>,
    pub toggle_rejection: Option<String>,
    pub clear_error: Option<String>,
    /// Extra latency for history pulls, keyed by query
    pub history_delays: Vec<(String, Duration)>,
    pub history_calls: Vec<(usize, usize, String)>,
    pub toggle_calls: Vec<bool>,
    pub config_updates: Vec<ConfigUpdate>,
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(count: usize) -> Self {
        let backend = Self::new();
        backend.state().store = stored_records("http://store.test/item", count);
        backend
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn history_queries(&self) -> Vec<String> {
        self.state()
            .history_calls
            .iter()
            .map(|(_, _, q)| q.clone())
            .collect()
    }
}

/// `count` persisted records with ids `1..=count` and urls `<prefix>/<id>`
pub fn stored_records(prefix: &str, count: usize) -> Vec<TransactionRecord> {
    (1..=count as u64)
        .map(|id| {
            TransactionRecord::new("GET", format!("{}/{}", prefix, id))
                .with_id(RecordId::Stored(id))
                .with_status("200")
                .with_time("25ms")
        })
        .collect()
}

#[async_trait]
impl Backend for FakeBackend {
    async fn status(&self) -> Result<ProxyStatus> {
        let state = self.state();
        if let Some(reason) = &state.status_error {
            return Err(InsightError::Http(reason.clone()));
        }
        Ok(ProxyStatus {
            proxy_running: state.running,
            proxy_host: Some("127.0.0.1".to_string()),
            proxy_port: Some(8080),
        })
    }

    async fn stats(&self) -> Result<StatsSnapshot> {
        Ok(self.state().stats)
    }

    async fn history(
        &self,
        limit: usize,
        offset: usize,
        query: &str,
    ) -> Result<Vec<TransactionRecord>> {
        let delay = {
            let mut state = self.state();
            state
                .history_calls
                .push((limit, offset, query.to_string()));
            state
                .history_delays
                .iter()
                .find(|(q, _)| q == query)
                .map(|(_, d)| *d)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if let Some(reason) = &state.history_error {
            return Err(InsightError::Http(reason.clone()));
        }
        if let Some((_, reason)) = state
            .history_query_errors
            .iter()
            .find(|(q, _)| q == query)
        {
            return Err(InsightError::Http(reason.clone()));
        }
        Ok(state
            .store
            .iter()
            .filter(|r| matches_query(r, query))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn toggle_proxy(&self, enable: bool) -> Result<MutationResponse> {
        let mut state = self.state();
        state.toggle_calls.push(enable);
        if let Some(reason) = &state.toggle_rejection {
            return Ok(MutationResponse {
                success: false,
                error: Some(reason.clone()),
                proxy_running: Some(state.running),
            });
        }
        state.running = enable;
        Ok(MutationResponse {
            success: true,
            error: None,
            proxy_running: Some(enable),
        })
    }

    async fn clear_all(&self) -> Result<MutationResponse> {
        let mut state = self.state();
        if let Some(reason) = &state.clear_error {
            return Err(InsightError::Http(reason.clone()));
        }
        state.store.clear();
        state.stats = StatsSnapshot::default();
        Ok(MutationResponse {
            success: true,
            ..MutationResponse::default()
        })
    }

    async fn update_config(&self, update: &ConfigUpdate) -> Result<MutationResponse> {
        self.state().config_updates.push(update.clone());
        Ok(MutationResponse {
            success: true,
            ..MutationResponse::default()
        })
    }
}
