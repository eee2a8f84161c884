//! Upstream page fetching
//!
//! All HTML fetches go through the [`PageFetcher`] trait so the scraper and
//! discoverer can run against fixtures. The HTTP implementation enforces a
//! per-host request quota with a keyed `governor` rate limiter.

use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Url};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

/// Page fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Body read error: {0}")]
    Body(String),
}

/// Fetches one page body as text
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// reqwest-backed fetcher with per-host rate limiting
pub struct HttpFetcher {
    client: Client,
    rate_limiter: DefaultKeyedRateLimiter<String>,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::keyed(Quota::per_second(per_second));

        Ok(Self {
            client,
            rate_limiter,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        // Wait for this host's permit
        self.rate_limiter.until_key_ready(&host).await;

        tracing::debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(parsed)
            .header("Accept-Language", "en-US,en;q=0.8")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}

/// Resolve `href` against the page it was found on
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// Return `url` with query parameter `key` set to `value`
pub fn with_query_param(url: &str, key: &str, value: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut pairs = parsed.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(key, value);
    }
    Some(parsed.to_string())
}
