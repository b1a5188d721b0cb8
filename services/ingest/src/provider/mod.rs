pub mod client;
pub mod models;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use self::models::RawEvent;

/// One request against the provider feed.
///
/// The first request of a run filters by change time; every later request
/// follows the provider's continuation cursor, which already carries the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    Since(DateTime<Utc>),
    Cursor(String),
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub events: Vec<RawEvent>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid event at position {index}: {reason}")]
    InvalidEvent { index: usize, reason: String },
}

/// Paginated source of provider events.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ProviderError>;
}
