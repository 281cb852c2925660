//! Client for the capture backend's pull and mutation endpoints

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::io::{HttpClient, HttpResponse};
use crate::metrics::StatsSnapshot;
use crate::record::TransactionRecord;
use crate::{InsightError, Result};

/// Capture engine status as returned by `/api/status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyStatus {
    #[serde(default)]
    pub proxy_running: bool,
    #[serde(default)]
    pub proxy_host: Option<String>,
    #[serde(default)]
    pub proxy_port: Option<u16>,
}

/// Reply of the toggle, clear and config endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub proxy_running: Option<bool>,
}

impl MutationResponse {
    /// Turn a `success: false` reply into [`InsightError::Backend`]
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(InsightError::Backend(
                self.error
                    .unwrap_or_else(|| "request was not accepted".to_string()),
            ))
        }
    }
}

/// Partial configuration update; unset fields are left untouched remotely
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql: Option<serde_json::Map<String, Value>>,
}

/// The remote side of the dashboard
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Backend: Send + Sync {
    async fn status(&self) -> Result<ProxyStatus>;

    async fn stats(&self) -> Result<StatsSnapshot>;

    /// One page of history; an empty `query` means unfiltered
    async fn history(
        &self,
        limit: usize,
        offset: usize,
        query: &str,
    ) -> Result<Vec<TransactionRecord>>;

    async fn toggle_proxy(&self, enable: bool) -> Result<MutationResponse>;

    async fn clear_all(&self) -> Result<MutationResponse>;

    async fn update_config(&self, update: &ConfigUpdate) -> Result<MutationResponse>;
}

/// [`Backend`] over the backend's HTTP API
pub struct HttpBackend {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpBackend {
    pub fn new(base_url: &str, http: Arc<dyn HttpClient>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::debug!("Created HttpBackend at {}", base_url);
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let raw = format!("{}{}", self.base_url, path);
        let url = if params.is_empty() {
            reqwest::Url::parse(&raw)
        } else {
            reqwest::Url::parse_with_params(&raw, params)
        }
        .map_err(|e| InsightError::Config(format!("Invalid backend URL {}: {}", raw, e)))?;
        Ok(url.to_string())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.get(url).await?;
        if !response.is_success() {
            return Err(InsightError::Http(format!(
                "GET {} returned status {}",
                url, response.status
            )));
        }
        Ok(serde_json::from_str(&response.body)?)
    }
}

/// Read a mutation reply; non-2xx bodies may carry `error` or `detail`
fn parse_mutation(response: HttpResponse) -> Result<MutationResponse> {
    if response.is_success() {
        return Ok(serde_json::from_str(&response.body)?);
    }

    let reason = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("detail"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("status {}", response.status));

    Ok(MutationResponse {
        success: false,
        error: Some(reason),
        proxy_running: None,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn status(&self) -> Result<ProxyStatus> {
        let url = self.url("/api/status", &[])?;
        self.get_json(&url).await
    }

    async fn stats(&self) -> Result<StatsSnapshot> {
        let url = self.url("/api/stats", &[])?;
        self.get_json(&url).await
    }

    async fn history(
        &self,
        limit: usize,
        offset: usize,
        query: &str,
    ) -> Result<Vec<TransactionRecord>> {
        let mut params = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
        if !query.is_empty() {
            params.push(("q", query.to_string()));
        }
        let url = self.url("/api/requests", &params)?;

        let rows: Vec<Value> = self.get_json(&url).await?;
        let total = rows.len();
        let records: Vec<TransactionRecord> = rows
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect();
        if records.len() != total {
            tracing::debug!(
                "Skipped {} malformed history rows from {}",
                total - records.len(),
                url
            );
        }
        Ok(records)
    }

    async fn toggle_proxy(&self, enable: bool) -> Result<MutationResponse> {
        let url = self.url("/api/proxy/toggle", &[("enable", enable.to_string())])?;
        parse_mutation(self.http.post(&url).await?)
    }

    async fn clear_all(&self) -> Result<MutationResponse> {
        let url = self.url("/api/clear", &[])?;
        parse_mutation(self.http.post(&url).await?)
    }

    async fn update_config(&self, update: &ConfigUpdate) -> Result<MutationResponse> {
        let url = self.url("/api/config/update", &[])?;
        let body = serde_json::to_value(update)?;
        parse_mutation(self.http.post_json(&url, &body).await?)
    }
}
