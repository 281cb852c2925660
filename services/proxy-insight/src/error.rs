//! Error types for the traffic dashboard engine

/// Errors that can occur while talking to the capture backend or the live channel
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backend rejected request: {0}")]
    Backend(String),

    #[error("Live channel error: {0}")]
    Channel(String),
}

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, InsightError>;
