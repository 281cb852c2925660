//! Per-transaction detail view

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::record::{FieldMap, TransactionRecord};
use crate::InsightError;

/// Placeholder for an absent or empty body
pub const EMPTY_BODY: &str = "(Empty Body)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DetailTab {
    #[default]
    Header,
    Body,
    Cookie,
    Timing,
}

impl DetailTab {
    pub const ALL: [DetailTab; 4] = [
        DetailTab::Header,
        DetailTab::Body,
        DetailTab::Cookie,
        DetailTab::Timing,
    ];
}

impl fmt::Display for DetailTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetailTab::Header => "Header",
            DetailTab::Body => "Body",
            DetailTab::Cookie => "Cookie",
            DetailTab::Timing => "Timing",
        };
        f.write_str(name)
    }
}

impl FromStr for DetailTab {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" | "headers" => Ok(DetailTab::Header),
            "body" => Ok(DetailTab::Body),
            "cookie" | "cookies" => Ok(DetailTab::Cookie),
            "timing" | "time" => Ok(DetailTab::Timing),
            other => Err(InsightError::Config(format!("Unknown detail tab: {}", other))),
        }
    }
}

/// A titled block of preformatted text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailSection {
    pub title: &'static str,
    pub content: String,
}

impl DetailSection {
    fn new(title: &'static str, content: String) -> Self {
        Self { title, content }
    }
}

/// The record currently opened for inspection
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDetail {
    record: Arc<TransactionRecord>,
    tab: DetailTab,
}

impl TransactionDetail {
    pub fn new(record: Arc<TransactionRecord>) -> Self {
        Self {
            record,
            tab: DetailTab::default(),
        }
    }

    pub fn record(&self) -> &TransactionRecord {
        &self.record
    }

    pub fn tab(&self) -> DetailTab {
        self.tab
    }

    pub fn set_tab(&mut self, tab: DetailTab) {
        self.tab = tab;
    }

    /// Sections of the active tab
    pub fn sections(&self) -> Vec<DetailSection> {
        render(&self.record, self.tab)
    }
}

/// Render one tab of a record
pub fn render(record: &TransactionRecord, tab: DetailTab) -> Vec<DetailSection> {
    match tab {
        DetailTab::Header => vec![
            DetailSection::new(
                "General",
                format!(
                    "URL: {}\nMethod: {}\nStatus: {}",
                    record.url,
                    record.method,
                    record.status.as_deref().unwrap_or("-")
                ),
            ),
            DetailSection::new("Request Headers", format_headers(&record.request.headers)),
            DetailSection::new(
                "Response Headers",
                format_headers(&record.response.headers),
            ),
        ],
        DetailTab::Body => vec![
            DetailSection::new("Request Body", format_body(record.request.body.as_deref())),
            DetailSection::new(
                "Response Body",
                format_body(record.response.body.as_deref()),
            ),
        ],
        DetailTab::Cookie => vec![
            DetailSection::new("Request Cookies", format_cookies(&record.request.cookies)),
            DetailSection::new(
                "Response Cookies",
                format_cookies(&record.response.cookies),
            ),
        ],
        DetailTab::Timing => vec![DetailSection::new(
            "Timing",
            format!("Total Time: {}", record.time.as_deref().unwrap_or("-")),
        )],
    }
}

/// `Key: Value` lines in received order
pub fn format_headers(headers: &FieldMap) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// JSON bodies are pretty-printed; anything else is shown as is
pub fn format_body(body: Option<&str>) -> String {
    let Some(body) = body.filter(|b| !b.is_empty()) else {
        return EMPTY_BODY.to_string();
    };
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}

pub fn format_cookies(cookies: &FieldMap) -> String {
    serde_json::to_string_pretty(&cookies.to_json()).unwrap_or_default()
}
