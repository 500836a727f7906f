// src/ingest/fetcher.rs
use anyhow::{Context, Result};
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::ingest::feed::{parse_feed, FeedParseError};
use crate::ingest::mirrors::candidate_urls;
use crate::ingest::types::{FetchOutcome, RawEntry};
use crate::sources::Source;

pub const MAX_FETCH_RETRIES: u32 = 3;
pub const BASE_BACKOFF: Duration = Duration::from_secs(1);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Browser-like headers; several Russian outlets answer 403/406 to bare clients.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";
const FEED_ACCEPT: &str =
    "application/rss+xml, application/xml;q=0.9, text/xml;q=0.9, text/html;q=0.8, */*;q=0.7";
const FEED_ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";

/// Retry policy for one source. Attempts are per candidate URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_FETCH_RETRIES,
            base_backoff: BASE_BACKOFF,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl FetchPolicy {
    /// Sleep after failed `attempt` (1-based): `base × 2^(attempt-1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1u32 << exp)
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// One failed attempt against one URL.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("feed parse failed: {0}")]
    Parse(#[from] FeedParseError),
}

/// Every candidate URL exhausted its attempts.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{source_name}: feed unavailable after all attempts (last error: {last_error}; tried: {})", .attempted.join(", "))]
pub struct FetchFailure {
    pub source_name: String,
    pub last_error: String,
    pub attempted: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
}

pub fn default_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
    h.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));
    h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(FEED_ACCEPT_LANGUAGE));
    h.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    h
}

impl Fetcher {
    pub fn new(policy: FetchPolicy) -> Result<Self> {
        let client = Client::builder()
            .default_headers(default_headers())
            .timeout(policy.request_timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self { client, policy })
    }

    pub fn with_client(client: Client, policy: FetchPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Walk the candidate URLs until one yields a parseable feed.
    pub async fn fetch(&self, source: &Source) -> Result<FetchOutcome, FetchFailure> {
        let urls = candidate_urls(source);
        let attempts = self.policy.attempts();
        let mut last_error: Option<FetchError> = None;

        for url in &urls {
            for attempt in 1..=attempts {
                counter!("news_fetch_attempts_total").increment(1);
                match self.fetch_once(url).await {
                    Ok(entries) => {
                        let via_mirror = *url != source.url;
                        tracing::debug!(
                            source = %source.name,
                            %url,
                            attempt,
                            via_mirror,
                            entries = entries.len(),
                            "feed fetched"
                        );
                        return Ok(FetchOutcome {
                            entries,
                            url: url.clone(),
                            via_mirror,
                        });
                    }
                    Err(e) => {
                        log_failed_attempt(&source.name, url, attempt, attempts, &e);
                        last_error = Some(e);
                    }
                }
                if attempt < attempts {
                    tokio::time::sleep(self.policy.backoff_delay(attempt)).await;
                }
            }
        }

        Err(FetchFailure {
            source_name: source.name.clone(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no candidate URLs".to_string()),
            attempted: urls,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<RawEntry>, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = resp.text().await?;
        Ok(parse_feed(&body)?)
    }
}

fn log_failed_attempt(source: &str, url: &str, attempt: u32, max: u32, err: &FetchError) {
    match err {
        FetchError::Status(s) if matches!(s.as_u16(), 404 | 406) => tracing::warn!(
            source,
            url,
            attempt,
            max,
            status = s.as_u16(),
            "feed not served, retrying or moving to an alternative"
        ),
        FetchError::Status(s) if matches!(s.as_u16(), 403 | 451) => tracing::warn!(
            source,
            url,
            attempt,
            max,
            status = s.as_u16(),
            "access restricted, will try an alternative"
        ),
        FetchError::Status(s) => tracing::warn!(
            source,
            url,
            attempt,
            max,
            status = s.as_u16(),
            "transient http error"
        ),
        other => tracing::warn!(source, url, attempt, max, error = %other, "feed request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = FetchPolicy::default();
        let delays: Vec<_> = (1..=MAX_FETCH_RETRIES).map(|a| p.backoff_delay(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_retries_still_attempts_once() {
        let p = FetchPolicy {
            max_retries: 0,
            ..FetchPolicy::default()
        };
        assert_eq!(p.attempts(), 1);
    }

    #[test]
    fn feed_mime_types_are_accepted() {
        let h = default_headers();
        let accept = h.get(ACCEPT).and_then(|v| v.to_str().ok()).unwrap();
        assert!(accept.starts_with("application/rss+xml"));
        assert!(h.get(USER_AGENT).is_some());
    }

    #[test]
    fn failure_lists_attempted_urls() {
        let f = FetchFailure {
            source_name: "РБК".into(),
            last_error: "HTTP 503 Service Unavailable".into(),
            attempted: vec!["https://a.test".into(), "https://b.test".into()],
        };
        let msg = f.to_string();
        assert!(msg.starts_with("РБК: feed unavailable"));
        assert!(msg.contains("https://a.test, https://b.test"));
    }
}
