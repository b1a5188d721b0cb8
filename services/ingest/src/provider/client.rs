use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use evsync_common::error::{EvsyncError, EvsyncResult};
use evsync_config::env::{get_var, get_var_or};

use super::models::{EventPageResponse, RawEvent};
use super::{EventSource, Page, PageRequest, ProviderError};

const EVENTS_PATH: &str = "api/events/";
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct ProviderClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl ProviderClientConfig {
    /// Load provider settings from the environment.
    ///
    /// `EVENT_PROVIDER_URL` and `EVENT_PROVIDER_API_KEY` are required;
    /// `EVENT_PROVIDER_TIMEOUT_SECS` defaults to 10.
    pub fn from_env() -> EvsyncResult<Self> {
        let base_url = get_var("EVENT_PROVIDER_URL")?;
        Url::parse(&base_url)
            .map_err(|e| EvsyncError::Config(format!("invalid EVENT_PROVIDER_URL: {e}")))?;

        let timeout_secs = get_var_or("EVENT_PROVIDER_TIMEOUT_SECS", "10")
            .parse()
            .map_err(|e| {
                EvsyncError::Config(format!("invalid EVENT_PROVIDER_TIMEOUT_SECS: {e}"))
            })?;

        Ok(Self {
            base_url,
            api_key: get_var("EVENT_PROVIDER_API_KEY")?,
            timeout_secs,
        })
    }

    pub fn events_url(&self) -> String {
        format!("{}/{EVENTS_PATH}", self.base_url.trim_end_matches('/'))
    }
}

/// Rewrite the provider's `next` link into the URL of the following request.
///
/// The link is used verbatim except that it is upgraded to https when the
/// provider itself is reached over https, and relative links are resolved
/// against the base URL. Blank links mean there is no next page.
///
/// A provider configured with a plain `http://` base keeps plain `http` next
/// links; the upgrade is not applied unconditionally.
pub fn normalize_next_url(base_url: &str, next: &str) -> Result<Option<String>, ProviderError> {
    let next = next.trim();
    if next.is_empty() {
        return Ok(None);
    }

    if next.starts_with("http://") || next.starts_with("https://") {
        if base_url.starts_with("https://") {
            if let Some(rest) = next.strip_prefix("http://") {
                return Ok(Some(format!("https://{rest}")));
            }
        }
        return Ok(Some(next.to_string()));
    }

    let base = Url::parse(base_url)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid base url: {e}")))?;
    let joined = base
        .join(next)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid next link {next}: {e}")))?;
    Ok(Some(joined.to_string()))
}

#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    config: ProviderClientConfig,
}

impl ProviderClient {
    pub fn new(config: ProviderClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    async fn get_page(&self, request: reqwest::RequestBuilder) -> Result<Page, ProviderError> {
        let response = request
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::RequestError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::HttpError { status, body });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::RequestError(e)
            }
        })?;
        let envelope: EventPageResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let events = envelope
            .results
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                RawEvent::from_json(value)
                    .map_err(|reason| ProviderError::InvalidEvent { index, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let next_cursor = match envelope.next.as_deref() {
            Some(next) => normalize_next_url(&self.config.base_url, next)?,
            None => None,
        };

        Ok(Page {
            events,
            next_cursor,
        })
    }
}

#[async_trait]
impl EventSource for ProviderClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ProviderError> {
        let builder = match request {
            PageRequest::Since(changed_at) => {
                let changed_at = changed_at.format("%Y-%m-%d").to_string();
                tracing::debug!(%changed_at, "requesting first page");
                self.client
                    .get(self.config.events_url())
                    .query(&[("changed_at", changed_at)])
            }
            PageRequest::Cursor(next_url) => {
                tracing::debug!(next_url = %next_url, "requesting next page");
                self.client.get(next_url.as_str())
            }
        };

        let page = self.get_page(builder).await?;
        tracing::debug!(
            events = page.events.len(),
            has_next = page.next_cursor.is_some(),
            "received page"
        );
        Ok(page)
    }
}
