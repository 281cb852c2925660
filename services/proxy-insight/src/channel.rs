//! Live push channel
//!
//! The session consumes [`ChannelEvent`]s through the [`PushChannel`] trait.
//! Reconnection is the channel's business: [`WebSocketChannel`] retries on
//! its own schedule and only reports what happened.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::{InsightError, Result};

/// Path of the live traffic endpoint on the backend
pub const LIVE_PATH: &str = "/ws/traffic";

const EVENT_BUFFER: usize = 256;

/// Something the push channel has to say
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    /// One text frame, undecoded
    Message(String),
    /// Transport trouble; the channel may still recover
    Error(String),
}

/// Source of live events; `None` means the channel is gone for good
#[async_trait]
pub trait PushChannel: Send {
    async fn recv(&mut self) -> Option<ChannelEvent>;
}

#[async_trait]
impl PushChannel for mpsc::Receiver<ChannelEvent> {
    async fn recv(&mut self) -> Option<ChannelEvent> {
        mpsc::Receiver::recv(self).await
    }
}

/// Derive the WebSocket URL from the backend's HTTP base URL
pub fn live_url(base_url: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let rest = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(InsightError::Config(format!(
            "Unsupported backend URL scheme: {}",
            base_url
        )));
    };
    Ok(format!("{}{}", rest, LIVE_PATH))
}

/// WebSocket client that keeps itself connected in a background task
pub struct WebSocketChannel {
    events: mpsc::Receiver<ChannelEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WebSocketChannel {
    /// Start connecting to `url`; the task stops when `cancel` fires or the
    /// channel is dropped
    pub fn spawn(url: String, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let cancel = cancel.child_token();
        let task = tokio::spawn(run_connection(url, reconnect, tx, cancel.clone()));
        Self {
            events,
            cancel,
            task: Some(task),
        }
    }

    /// Stop the background task and wait for it to finish
    pub async fn detach(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl PushChannel for WebSocketChannel {
    async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}

async fn run_connection(
    url: String,
    reconnect: ReconnectConfig,
    tx: mpsc::Sender<ChannelEvent>,
    cancel: CancellationToken,
) {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!("Connecting live channel to {} (attempt {})", url, attempt);

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((mut stream, _)) => {
                info!("Live channel connected to {}", url);
                attempt = 0;
                if tx.send(ChannelEvent::Connected).await.is_err() {
                    break;
                }

                loop {
                    let frame = tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = stream.close(None).await;
                            debug!("Live channel detached");
                            return;
                        }
                        frame = stream.next() => frame,
                    };

                    let event = match frame {
                        Some(Ok(Message::Text(text))) => ChannelEvent::Message(text),
                        Some(Ok(Message::Close(_))) | None => {
                            ChannelEvent::Error("connection closed by server".to_string())
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => ChannelEvent::Error(e.to_string()),
                    };

                    let lost = matches!(event, ChannelEvent::Error(_));
                    if tx.send(event).await.is_err() {
                        return;
                    }
                    if lost {
                        warn!("Live channel to {} lost", url);
                        break;
                    }
                }
            }
            Err(e) => {
                debug!("Live channel attempt {} failed: {}", attempt, e);
                if tx
                    .send(ChannelEvent::Error(format!("connect to {} failed: {}", url, e)))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }

        if !reconnect.enabled {
            debug!("Auto-reconnect disabled, closing live channel");
            break;
        }
        if let Some(max) = reconnect.max_retries {
            if attempt >= max {
                warn!("Live channel gave up: max retries ({}) exceeded", max);
                break;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect.interval()) => {}
        }
    }
}
