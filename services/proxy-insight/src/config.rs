//! Configuration types for the traffic dashboard

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// Where the capture backend lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Paged history and search behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Upper bound on records kept in memory
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl HistoryConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            debounce_ms: default_debounce_ms(),
            max_records: default_max_records(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_trend_capacity")]
    pub trend_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            trend_capacity: default_trend_capacity(),
        }
    }
}

/// Push channel settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Configuration for automatic reconnection of the push channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Reconnect when the channel drops
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay between attempts in seconds
    #[serde(default = "default_reconnect_interval")]
    pub interval_seconds: u64,
    /// Maximum number of attempts (None for unlimited)
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl ReconnectConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_reconnect_interval(),
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Toasts kept before the oldest is dropped
    #[serde(default = "default_toast_limit")]
    pub toast_limit: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            toast_limit: default_toast_limit(),
        }
    }
}

impl Config {
    /// Reject values the engine cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.history.page_size == 0 {
            return Err(crate::InsightError::Config(
                "history.page_size must be at least 1".to_string(),
            ));
        }
        if self.metrics.trend_capacity == 0 {
            return Err(crate::InsightError::Config(
                "metrics.trend_capacity must be at least 1".to_string(),
            ));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(crate::InsightError::Config(
                "backend.base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_page_size() -> usize {
    crate::history::DEFAULT_PAGE_SIZE
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_max_records() -> usize {
    crate::history::DEFAULT_MAX_RECORDS
}

fn default_trend_capacity() -> usize {
    crate::metrics::DEFAULT_TREND_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_reconnect_interval() -> u64 {
    3
}

fn default_toast_limit() -> usize {
    20
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::InsightError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
