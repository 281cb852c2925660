//! Dashboard session: owns every component and drives them from one loop
//!
//! All state lives in [`DashboardSession`] and is only touched from its own
//! handlers. Remote pulls and mutations run as spawned tasks that report back
//! through an internal queue, so a slow backend never blocks live ingestion.
//! After each handled event an immutable [`DashboardView`] is published; a
//! full reset therefore becomes visible all at once or not at all.
//!
//! The record and notice lists in a view are shared slices, rebuilt only
//! when the history cache or feed reports a new revision. A live transaction
//! changes the record list, so it still costs one pass over the loaded set.

use std::collections::VecDeque;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{Backend, ConfigUpdate, MutationResponse};
use crate::channel::{ChannelEvent, PushChannel};
use crate::config::Config;
use crate::detail::{DetailTab, TransactionDetail};
use crate::feed::{Notice, NoticeLevel, NotificationFeed};
use crate::history::{HistoryCache, PageOutcome, PageRequest};
use crate::metrics::{AggregateStats, MetricsAggregator};
use crate::record::{RecordId, TransactionRecord};
use crate::router::{LiveRouter, RouteOutcome};
use crate::{InsightError, Result};

/// User input understood by the session
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    LoadMore,
    ClearAll,
    ToggleProxy(bool),
    SaveConfig(ConfigUpdate),
    OpenFeed,
    MarkAllRead,
    Select(RecordId),
    SelectTab(DetailTab),
    Deselect,
    DismissToasts,
    Quit,
}

impl FromStr for Command {
    type Err = InsightError;

    /// Parse one line of console input
    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "search" | "find" => Command::Search(rest.to_string()),
            "more" => Command::LoadMore,
            "clear" => Command::ClearAll,
            "proxy" => match rest.to_ascii_lowercase().as_str() {
                "on" | "start" | "true" => Command::ToggleProxy(true),
                "off" | "stop" | "false" => Command::ToggleProxy(false),
                other => {
                    return Err(InsightError::Config(format!(
                        "expected `proxy on` or `proxy off`, got `proxy {}`",
                        other
                    )))
                }
            },
            "config" => Command::SaveConfig(serde_json::from_str(rest)?),
            "open" => Command::OpenFeed,
            "read" => Command::MarkAllRead,
            "show" => Command::Select(rest.parse().map_err(|e| {
                InsightError::Config(format!("Invalid record id {:?}: {}", rest, e))
            })?),
            "tab" => Command::SelectTab(rest.parse()?),
            "close" => Command::Deselect,
            "dismiss" => Command::DismissToasts,
            "quit" | "exit" => Command::Quit,
            other => {
                return Err(InsightError::Config(format!("Unknown command: {}", other)));
            }
        };
        Ok(command)
    }
}

/// Capture engine state as shown by the toggle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyState {
    pub running: bool,
    /// A toggle request is outstanding; `running` is the optimistic value
    pub pending: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// A transient user notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub seq: u64,
    pub level: NoticeLevel,
    pub message: String,
}

/// Everything a renderer needs, captured at one instant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardView {
    pub stats: AggregateStats,
    /// Exactly trend-capacity values, zero-padded on the left
    pub trend: Vec<u64>,
    pub records: Arc<[Arc<TransactionRecord>]>,
    pub exhausted: bool,
    pub loading: bool,
    /// Text in the search box; may be ahead of `query` while debouncing
    pub search_text: String,
    /// Query the loaded records belong to
    pub query: String,
    pub notifications: Arc<[Notice]>,
    pub unread: u32,
    pub badge: Option<String>,
    pub proxy: ProxyState,
    pub live_connected: bool,
    pub selection: Option<TransactionDetail>,
    pub toasts: Vec<Toast>,
}

enum Completion {
    Page {
        request: PageRequest,
        result: Result<Vec<TransactionRecord>>,
    },
    Toggle {
        enable: bool,
        previous: bool,
        result: Result<MutationResponse>,
    },
    Clear(Result<MutationResponse>),
    ConfigSaved {
        update: ConfigUpdate,
        result: Result<MutationResponse>,
    },
}

/// The dashboard's single owner of state
pub struct DashboardSession {
    backend: Arc<dyn Backend>,
    metrics: MetricsAggregator,
    history: HistoryCache,
    feed: NotificationFeed,
    router: LiveRouter,
    proxy: ProxyState,
    search_text: String,
    selection: Option<TransactionDetail>,
    live_connected: bool,
    toasts: VecDeque<Toast>,
    toast_limit: usize,
    toast_seq: u64,
    outstanding: usize,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    view_tx: watch::Sender<Arc<DashboardView>>,
    records_view: Option<(u64, Arc<[Arc<TransactionRecord>]>)>,
    notices_view: Option<(u64, Arc<[Notice]>)>,
}

impl DashboardSession {
    pub fn new(config: &Config, backend: Arc<dyn Backend>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(Arc::new(DashboardView::default()));

        let mut session = Self {
            backend,
            metrics: MetricsAggregator::new(config.metrics.trend_capacity),
            history: HistoryCache::new(
                config.history.page_size,
                config.history.debounce(),
                config.history.max_records,
            ),
            feed: NotificationFeed::new(),
            router: LiveRouter::new(),
            proxy: ProxyState::default(),
            search_text: String::new(),
            selection: None,
            live_connected: false,
            toasts: VecDeque::new(),
            toast_limit: config.ui.toast_limit.max(1),
            toast_seq: 0,
            outstanding: 0,
            completions_tx,
            completions_rx,
            view_tx,
            records_view: None,
            notices_view: None,
        };
        session.publish();
        session
    }

    /// Startup protocol.
    ///
    /// A status failure is returned and stops initialisation. A stats or
    /// first-page failure is reported as a toast and the session carries on.
    pub async fn bootstrap(&mut self) -> Result<()> {
        let status = match self.backend.status().await {
            Ok(status) => status,
            Err(e) => {
                self.toast(
                    NoticeLevel::Error,
                    format!("Failed to reach capture backend: {}", e),
                );
                self.publish();
                return Err(e);
            }
        };
        info!(
            "Capture engine is {}",
            if status.proxy_running { "running" } else { "stopped" }
        );
        self.proxy = ProxyState {
            running: status.proxy_running,
            pending: false,
            host: status.proxy_host,
            port: status.proxy_port,
        };

        match self.backend.stats().await {
            Ok(snapshot) => self.metrics.init_from_snapshot(&snapshot),
            Err(e) => {
                warn!("Failed to load statistics: {}", e);
                self.toast(NoticeLevel::Error, format!("Failed to load statistics: {}", e));
            }
        }

        if let Some(request) = self.history.begin_load() {
            let result = self
                .backend
                .history(request.limit, request.offset, &request.query)
                .await;
            if let PageOutcome::Applied { received, .. } = self.apply_page(&request, result) {
                self.toast(
                    NoticeLevel::Info,
                    format!("Loaded {} history records", received),
                );
            }
        }

        self.publish();
        Ok(())
    }

    /// Request the next history page. Returns false if nothing was issued.
    pub fn load_more(&mut self) -> bool {
        let issued = match self.history.begin_load() {
            Some(request) => {
                self.spawn_page(request);
                true
            }
            None => false,
        };
        self.publish();
        issued
    }

    /// Search box edit; committed once the debounce period passes quietly
    pub fn set_search(&mut self, text: &str) {
        self.search_text = text.to_string();
        self.history.set_query(text, Instant::now());
        self.publish();
    }

    /// Commit a due search, if any. Returns true if a new query was committed.
    pub fn poll_debounce(&mut self) -> bool {
        let Some(request) = self.history.commit_due(Instant::now()) else {
            return false;
        };
        info!("Searching for {:?}", request.query);
        self.selection = None;
        self.spawn_page(request);
        self.publish();
        true
    }

    /// When [`poll_debounce`](Self::poll_debounce) next has work
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.history.debounce_deadline()
    }

    /// Apply one raw message from the push channel
    pub fn handle_live(&mut self, text: &str) -> RouteOutcome {
        let outcome = self.router.route(
            text,
            &mut self.metrics,
            &mut self.history,
            &mut self.feed,
        );

        match &outcome {
            RouteOutcome::Clear => {
                info!("Backend cleared all records");
                self.full_reset();
            }
            RouteOutcome::Transaction {
                evicted: Some(evicted),
                ..
            } => {
                if self.selected_id() == Some(*evicted) {
                    debug!("Selected record {} left the working set", evicted);
                    self.selection = None;
                }
            }
            _ => {}
        }

        self.publish();
        outcome
    }

    /// React to a push-channel event. Errors never end the session.
    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.live_connected = true;
                self.publish();
            }
            ChannelEvent::Message(text) => {
                self.handle_live(&text);
            }
            ChannelEvent::Error(reason) => {
                warn!("Live channel error: {}", reason);
                self.live_connected = false;
                self.toast(
                    NoticeLevel::Warning,
                    format!("Live connection interrupted: {}", reason),
                );
                self.publish();
            }
        }
    }

    /// Zero the statistics, drop the loaded records and the search text.
    ///
    /// Nothing is published in between, so observers see either the state
    /// before or after.
    pub fn full_reset(&mut self) {
        self.metrics.reset();
        self.history.reset();
        self.search_text.clear();
        self.selection = None;
    }

    /// Ask the backend to delete everything; reset locally once it agrees
    pub fn clear_all(&mut self) {
        let backend = Arc::clone(&self.backend);
        self.spawn_task(async move { Completion::Clear(backend.clear_all().await) });
    }

    /// Optimistically flip the capture toggle; reverted if the backend refuses
    pub fn toggle_proxy(&mut self, enable: bool) {
        if self.proxy.pending {
            debug!("Proxy toggle already in flight; ignoring");
            return;
        }
        let previous = self.proxy.running;
        self.proxy.running = enable;
        self.proxy.pending = true;

        let backend = Arc::clone(&self.backend);
        self.spawn_task(async move {
            Completion::Toggle {
                enable,
                previous,
                result: backend.toggle_proxy(enable).await,
            }
        });
        self.publish();
    }

    pub fn save_config(&mut self, update: ConfigUpdate) {
        let backend = Arc::clone(&self.backend);
        self.spawn_task(async move {
            let result = backend.update_config(&update).await;
            Completion::ConfigSaved { update, result }
        });
    }

    pub fn open_feed(&mut self) {
        self.feed.open();
        self.publish();
    }

    pub fn mark_all_read(&mut self) {
        self.feed.mark_all_read();
        self.publish();
    }

    /// Open the detail view for a loaded record. Returns false if it is not loaded.
    pub fn select(&mut self, id: RecordId) -> bool {
        let found = match self.history.get(id) {
            Some(record) => {
                self.selection = Some(TransactionDetail::new(Arc::clone(record)));
                true
            }
            None => false,
        };
        self.publish();
        found
    }

    pub fn select_tab(&mut self, tab: DetailTab) {
        if let Some(selection) = self.selection.as_mut() {
            selection.set_tab(tab);
            self.publish();
        }
    }

    pub fn deselect(&mut self) {
        self.selection = None;
        self.publish();
    }

    /// Hand pending toasts to the caller and forget them
    pub fn drain_toasts(&mut self) -> Vec<Toast> {
        let drained = self.toasts.drain(..).collect();
        self.publish();
        drained
    }

    pub fn handle_command(&mut self, command: Command) {
        debug!("Command: {:?}", command);
        match command {
            Command::Search(text) => self.set_search(&text),
            Command::LoadMore => {
                self.load_more();
            }
            Command::ClearAll => self.clear_all(),
            Command::ToggleProxy(enable) => self.toggle_proxy(enable),
            Command::SaveConfig(update) => self.save_config(update),
            Command::OpenFeed => self.open_feed(),
            Command::MarkAllRead => self.mark_all_read(),
            Command::Select(id) => {
                if !self.select(id) {
                    self.toast(NoticeLevel::Warning, format!("Record {} is not loaded", id));
                    self.publish();
                }
            }
            Command::SelectTab(tab) => self.select_tab(tab),
            Command::Deselect => self.deselect(),
            Command::DismissToasts => {
                self.drain_toasts();
            }
            Command::Quit => {}
        }
    }

    /// Wait for every spawned pull and mutation to report back and apply it
    pub async fn settle(&mut self) {
        while self.outstanding > 0 {
            match self.completions_rx.recv().await {
                Some(completion) => self.apply_completion(completion),
                None => break,
            }
        }
        self.publish();
    }

    /// Number of spawned pulls and mutations not yet applied
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Drive the session until cancelled, told to quit, or both inputs close
    pub async fn run(
        &mut self,
        channel: &mut dyn PushChannel,
        commands: &mut mpsc::Receiver<Command>,
        cancel: CancellationToken,
    ) {
        let mut channel_open = true;
        let mut commands_open = true;
        info!("Dashboard session running");

        loop {
            let deadline = self.history.debounce_deadline();
            if !channel_open && !commands_open && self.outstanding == 0 && deadline.is_none() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Dashboard session cancelled");
                    break;
                }
                event = channel.recv(), if channel_open => match event {
                    Some(event) => self.handle_channel_event(event),
                    None => {
                        channel_open = false;
                        self.live_connected = false;
                        self.toast(NoticeLevel::Warning, "Live updates stopped".to_string());
                        self.publish();
                    }
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.apply_completion(completion);
                    self.publish();
                }
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Quit) => break,
                    Some(command) => self.handle_command(command),
                    None => commands_open = false,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.poll_debounce();
                }
            }
        }

        info!(
            "Dashboard session stopped after {} live messages ({} dropped)",
            self.router.received(),
            self.router.dropped()
        );
    }

    /// Receiver of view snapshots; the current one is available immediately
    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardView>> {
        self.view_tx.subscribe()
    }

    /// Latest published view
    pub fn view(&self) -> Arc<DashboardView> {
        Arc::clone(&self.view_tx.borrow())
    }

    pub fn stats(&self) -> AggregateStats {
        self.metrics.stats()
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    pub fn feed(&self) -> &NotificationFeed {
        &self.feed
    }

    pub fn proxy(&self) -> &ProxyState {
        &self.proxy
    }

    fn selected_id(&self) -> Option<RecordId> {
        self.selection.as_ref().map(|s| s.record().id)
    }

    fn spawn_task<F>(&mut self, task: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        self.outstanding += 1;
        tokio::spawn(async move {
            let _ = tx.send(task.await);
        });
    }

    fn spawn_page(&mut self, request: PageRequest) {
        let backend = Arc::clone(&self.backend);
        self.spawn_task(async move {
            let result = backend
                .history(request.limit, request.offset, &request.query)
                .await;
            Completion::Page { request, result }
        });
    }

    fn apply_completion(&mut self, completion: Completion) {
        self.outstanding = self.outstanding.saturating_sub(1);
        match completion {
            Completion::Page { request, result } => {
                self.apply_page(&request, result);
            }
            Completion::Toggle {
                enable,
                previous,
                result,
            } => self.apply_toggle(enable, previous, result),
            Completion::Clear(result) => match result.and_then(MutationResponse::into_result) {
                Ok(_) => {
                    info!("All records cleared");
                    self.full_reset();
                    self.toast(NoticeLevel::Success, "All records cleared".to_string());
                }
                Err(e) => {
                    warn!("Clear failed: {}", e);
                    self.toast(NoticeLevel::Error, format!("Clear failed: {}", e));
                }
            },
            Completion::ConfigSaved { update, result } => {
                match result.and_then(MutationResponse::into_result) {
                    Ok(_) => {
                        if update.proxy_host.is_some() {
                            self.proxy.host = update.proxy_host;
                        }
                        if update.proxy_port.is_some() {
                            self.proxy.port = update.proxy_port;
                        }
                        self.toast(NoticeLevel::Success, "Configuration saved".to_string());
                    }
                    Err(e) => {
                        warn!("Saving configuration failed: {}", e);
                        self.toast(
                            NoticeLevel::Error,
                            format!("Saving configuration failed: {}", e),
                        );
                    }
                }
            }
        }
    }

    fn apply_page(
        &mut self,
        request: &PageRequest,
        result: Result<Vec<TransactionRecord>>,
    ) -> PageOutcome {
        match result {
            Ok(records) => self.history.complete_load(request, records),
            Err(e) => {
                let outcome = self.history.fail_load(request);
                if outcome == PageOutcome::Failed {
                    warn!("Failed to load history: {}", e);
                    self.toast(NoticeLevel::Error, format!("Failed to load history: {}", e));
                } else {
                    debug!("Ignoring failure of stale history pull: {}", e);
                }
                outcome
            }
        }
    }

    fn apply_toggle(&mut self, enable: bool, previous: bool, result: Result<MutationResponse>) {
        self.proxy.pending = false;
        match result.and_then(MutationResponse::into_result) {
            Ok(reply) => {
                self.proxy.running = reply.proxy_running.unwrap_or(enable);
                let message = if self.proxy.running {
                    "Capture started"
                } else {
                    "Capture stopped"
                };
                info!("{}", message);
                self.toast(NoticeLevel::Success, message.to_string());
            }
            Err(e) => {
                warn!("Proxy toggle failed: {}", e);
                self.proxy.running = previous;
                self.toast(NoticeLevel::Error, format!("Proxy toggle failed: {}", e));
            }
        }
    }

    fn toast(&mut self, level: NoticeLevel, message: String) {
        self.toast_seq += 1;
        self.toasts.push_back(Toast {
            seq: self.toast_seq,
            level,
            message,
        });
        while self.toasts.len() > self.toast_limit {
            self.toasts.pop_front();
        }
    }

    fn build_view(&mut self) -> DashboardView {
        let records = shared_slice(&mut self.records_view, self.history.revision(), || {
            self.history.records().cloned().collect()
        });
        let notifications = shared_slice(&mut self.notices_view, self.feed.revision(), || {
            self.feed.visible().cloned().collect()
        });

        DashboardView {
            stats: self.metrics.stats(),
            trend: self.metrics.trend().padded(),
            records,
            exhausted: self.history.is_exhausted(),
            loading: self.history.is_loading(),
            search_text: self.search_text.clone(),
            query: self.history.query().to_string(),
            notifications,
            unread: self.feed.unread(),
            badge: self.feed.badge_label(),
            proxy: self.proxy.clone(),
            live_connected: self.live_connected,
            selection: self.selection.clone(),
            toasts: self.toasts.iter().cloned().collect(),
        }
    }

    fn publish(&mut self) {
        let view = self.build_view();
        self.view_tx.send_replace(Arc::new(view));
    }
}

/// Reuse the slice cached in `slot` unless `revision` moved on
fn shared_slice<T>(
    slot: &mut Option<(u64, Arc<[T]>)>,
    revision: u64,
    build: impl FnOnce() -> Arc<[T]>,
) -> Arc<[T]> {
    match slot {
        Some((seen, items)) if *seen == revision => items.clone(),
        _ => {
            let items = build();
            *slot = Some((revision, items.clone()));
            items
        }
    }
}
