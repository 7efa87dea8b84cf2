use serde::{Deserialize, Serialize};
use std::path::PathBuf;
// Use the interfaces crate for core types
pub use interfaces::defs::{ChatMessage, Item, PublishTask, SendOptions, SourceSpec};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_document_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "news-relay/0.1".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 2,
            max_document_size_mb: 5,
            max_redirects: 5,
        }
    }
}

/// Candidate entry as it appears in a parsed document, before canonicalisation.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub title: String,
    pub link: String,
}

/// What to do with the in-memory record when the durable flush fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushFailurePolicy {
    /// Drop the url again; the item will be retried and may be sent twice.
    #[default]
    Forget,
    /// Keep the url in memory so this process won't resend it. Still not durable.
    Retain,
}

/// Failure kinds reported by an outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rejected with status {status}: {description}")]
    Rejected { status: u16, description: String },
}

impl PublishError {
    /// Whether the next scheduled run has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Network(_) | PublishError::RateLimited { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Fetch error for {source_name}: {reason}")]
    Fetch { source_name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Persistence error at {}: {reason}", .path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
