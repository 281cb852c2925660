//! Live message classification and fan-out
//!
//! Messages on the push channel are JSON objects. An object whose `type` is
//! `clear` or `notification` is a control message; anything else, including
//! an unknown or missing `type`, is taken to be a transaction record.

use serde_json::Value;

use crate::feed::{Notice, NotificationFeed};
use crate::history::HistoryCache;
use crate::metrics::MetricsAggregator;
use crate::record::{RecordId, TransactionRecord};
use crate::{InsightError, Result};

/// A decoded push message
#[derive(Debug, Clone, PartialEq)]
pub enum LiveMessage {
    Transaction(TransactionRecord),
    Clear,
    Notification(Notice),
}

impl LiveMessage {
    /// Decode one message from the channel
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(InsightError::Channel(format!(
                "expected a JSON object, got: {}",
                truncate(text, 64)
            )));
        }

        match value.get("type").and_then(Value::as_str) {
            Some("clear") => Ok(LiveMessage::Clear),
            Some("notification") => Ok(LiveMessage::Notification(serde_json::from_value(value)?)),
            _ => Ok(LiveMessage::Transaction(serde_json::from_value(value)?)),
        }
    }
}

/// What the router did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Counted and shown; `evicted` is a record pushed out of the working set
    Transaction {
        id: RecordId,
        evicted: Option<RecordId>,
    },
    /// The caller must run the full reset
    Clear,
    Notification,
    /// Not decodable; nothing changed
    Dropped,
}

/// Stamps arrival tokens and fans messages out to the components
#[derive(Debug, Default)]
pub struct LiveRouter {
    next_token: u64,
    received: u64,
    dropped: u64,
}

impl LiveRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next locally unique arrival token
    fn stamp(&mut self) -> RecordId {
        self.next_token += 1;
        RecordId::Live(self.next_token)
    }

    pub fn route(
        &mut self,
        text: &str,
        metrics: &mut MetricsAggregator,
        history: &mut HistoryCache,
        feed: &mut NotificationFeed,
    ) -> RouteOutcome {
        self.received += 1;
        let token = self.stamp();

        let message = match LiveMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                self.dropped += 1;
                tracing::debug!("Dropping undecodable live message {}: {}", token, e);
                return RouteOutcome::Dropped;
            }
        };

        match message {
            LiveMessage::Transaction(mut record) => {
                record.id = token;
                tracing::debug!(
                    "Live {} {} {} -> {:?}",
                    token,
                    record.method,
                    record.url,
                    record.status
                );
                metrics.ingest(&record);
                let evicted = history.ingest_live(record).map(|r| r.id);
                RouteOutcome::Transaction { id: token, evicted }
            }
            LiveMessage::Clear => {
                tracing::debug!("Live {} is a clear signal", token);
                RouteOutcome::Clear
            }
            LiveMessage::Notification(notice) => {
                feed.push(notice);
                RouteOutcome::Notification
            }
        }
    }

    /// Messages seen since construction
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Messages that could not be decoded
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
