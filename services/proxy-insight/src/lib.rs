//! Proxy Insight - live HTTP traffic dashboard engine
//!
//! Keeps running statistics, a searchable paged history and a notification
//! feed in sync with a capture backend, fed by pulls and a live push channel.

pub mod backend;
pub mod channel;
pub mod config;
pub mod detail;
pub mod error;
pub mod feed;
pub mod history;
pub mod io;
pub mod metrics;
pub mod record;
pub mod router;
pub mod session;

pub use config::{load_config, Config};
pub use error::{InsightError, Result};
pub use session::{Command, DashboardSession, DashboardView};

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, HttpBackend};
use crate::channel::{live_url, WebSocketChannel};
use crate::feed::NoticeLevel;
use crate::io::ReqwestHttpClient;

/// Run the dashboard against the configured backend until `cancel` fires or
/// a quit command arrives
pub async fn run(
    config: Config,
    mut commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) -> Result<()> {
    config.validate()?;

    let http: Arc<dyn io::HttpClient> = Arc::new(ReqwestHttpClient::new());
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config.backend.base_url, http));

    let mut session = DashboardSession::new(&config, backend);
    let reporter = tokio::spawn(report_views(session.subscribe(), cancel.clone()));

    if let Err(e) = session.bootstrap().await {
        cancel.cancel();
        let _ = reporter.await;
        return Err(e);
    }

    let url = live_url(&config.backend.base_url)?;
    tracing::info!("Attaching live channel at {}", url);
    let mut channel = WebSocketChannel::spawn(url, config.live.reconnect.clone(), cancel.clone());

    session.run(&mut channel, &mut commands, cancel.clone()).await;

    cancel.cancel();
    channel.detach().await;
    let _ = reporter.await;
    tracing::info!("Proxy Insight stopped");

    Ok(())
}

/// Log what changed in each published view
async fn report_views(
    mut views: watch::Receiver<Arc<DashboardView>>,
    cancel: CancellationToken,
) {
    let mut last_toast = 0u64;
    let mut last_summary = String::new();
    let mut last_detail = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let view = Arc::clone(&views.borrow_and_update());

        for toast in view.toasts.iter().filter(move |t| t.seq > last_toast) {
            match toast.level {
                NoticeLevel::Error => tracing::error!("{}", toast.message),
                NoticeLevel::Warning => tracing::warn!("{}", toast.message),
                _ => tracing::info!("{}", toast.message),
            }
            last_toast = toast.seq;
        }

        let summary = summarize(&view);
        if summary != last_summary {
            tracing::info!("{}", summary);
            last_summary = summary;
        }

        let detail = view
            .selection
            .as_ref()
            .map(|d| (d.record().id, d.tab()));
        if detail != last_detail {
            if let Some(selection) = &view.selection {
                for section in selection.sections() {
                    tracing::info!("{}\n{}", section.title, section.content);
                }
            }
            last_detail = detail;
        }
    }
}

fn summarize(view: &DashboardView) -> String {
    let query = if view.query.is_empty() {
        String::new()
    } else {
        format!(" query={:?}", view.query)
    };
    format!(
        "requests={} ok={}% errors={} avg={}ms loaded={}{}{} unread={} capture={}{}",
        view.stats.total,
        view.stats.success_rate,
        view.stats.error,
        view.stats.average_latency_ms,
        view.records.len(),
        if view.exhausted { "" } else { "+" },
        query,
        view.badge.as_deref().unwrap_or("0"),
        if view.proxy.running { "on" } else { "off" },
        if view.live_connected { "" } else { " (offline)" },
    )
}
