//! Upstream quote sources.
//!
//! Each source speaks one vendor's wire format and maps it onto [`Quote`].
//! Sources know nothing about caching, retries or circuit breaking; the
//! resolver in [`crate::core::resolver`] layers those on top.

pub mod eastmoney;
pub mod scrape;
pub mod sina;
pub mod tencent;
pub mod tiantian;
pub mod util;

use crate::core::quote::Quote;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("no usable price for {0}")]
    NoData(String),
}

impl SourceError {
    /// Timeouts, transport failures, throttling, server errors and garbled
    /// payloads are worth another try. An empty answer is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Timeout | SourceError::Transport(_) | SourceError::Malformed(_) => true,
            SourceError::Status(code) => *code == 429 || (500..600).contains(code),
            SourceError::NoData(_) => false,
        }
    }

    /// Whether the source itself misbehaved, as opposed to answering with
    /// nothing to offer for this symbol.
    pub fn is_source_failure(&self) -> bool {
        !matches!(self, SourceError::NoData(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SourceError::Timeout)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if let Some(status) = err.status() {
            SourceError::Status(status.as_u16())
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Stable name used as the health-tracking key.
    fn name(&self) -> &'static str;

    /// Sources that only cover part of a symbol kind narrow it here.
    fn supports(&self, _symbol: &str) -> bool {
        true
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError>;
}

/// Builds the HTTP client shared by every source.
pub fn build_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// GETs `url` and returns the body, mapping non-2xx responses to
/// [`SourceError::Status`].
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
) -> Result<String, SourceError> {
    debug!("Requesting quote data from {}", url);
    let response = client.get(url).headers(headers).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }
    Ok(response.text().await?)
}

/// Same as [`get_text`] for JSON endpoints.
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
) -> Result<serde_json::Value, SourceError> {
    let body = get_text(client, url, headers).await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))
}

pub(crate) fn referer(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::REFERER,
        reqwest::header::HeaderValue::from_static(value),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(SourceError::Timeout.is_retryable());
        assert!(SourceError::Transport("reset".into()).is_retryable());
        assert!(SourceError::Malformed("eof".into()).is_retryable());
        assert!(SourceError::Status(503).is_retryable());
        assert!(SourceError::Status(429).is_retryable());
        assert!(!SourceError::Status(404).is_retryable());
        assert!(!SourceError::NoData("sh600000".into()).is_retryable());
    }

    #[test]
    fn test_source_failure_classification() {
        assert!(SourceError::Status(404).is_source_failure());
        assert!(!SourceError::NoData("f_000001".into()).is_source_failure());
        assert!(SourceError::Timeout.is_timeout());
        assert!(!SourceError::Status(500).is_timeout());
    }
}
