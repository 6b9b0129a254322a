//! Retrying scrape executor
//!
//! Wraps a `PageFetcher` with rate limiting, a per-attempt timeout and
//! exponential backoff. Only transient failures are retried; terminal fetch
//! failures and parse errors end the scrape on the spot.

use crate::config::ScraperConfig;
use crate::crawler::fetcher::{FetchResult, PageFetcher};
use crate::crawler::rate_limit::RateLimiter;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Structural problems found while parsing a fetched page
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("Page has no extractable content")]
    EmptyContent,

    #[error("Invalid page: {0}")]
    Invalid(String),
}

/// Outcome of scraping one URL
#[derive(Debug, Clone)]
pub struct ScrapeResult<T> {
    pub url: String,
    pub success: bool,
    pub payload: Option<T>,
    pub error: Option<String>,
    /// Fetch attempts made, including the successful one
    pub attempts: u32,
}

impl<T> ScrapeResult<T> {
    pub fn succeeded(url: &str, payload: T, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            payload: Some(payload),
            error: None,
            attempts,
        }
    }

    pub fn failed(url: &str, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            payload: None,
            error: Some(error.into()),
            attempts,
        }
    }

    /// Converts into a `Result`, keeping the error message
    pub fn into_result(self) -> Result<T, String> {
        match self.payload {
            Some(payload) if self.success => Ok(payload),
            _ => Err(self
                .error
                .unwrap_or_else(|| "scrape failed without an error".to_string())),
        }
    }
}

/// Attempt count, timeout and backoff for one scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay after the given failed attempt (1-based): `base * 2^(attempt-1)`, capped
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

/// Rate-limited, retrying front end to a fetcher
pub struct ScrapeExecutor {
    fetcher: Arc<dyn PageFetcher>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl ScrapeExecutor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            limiter,
            policy,
        }
    }

    /// Fetches a URL and returns the raw body
    pub async fn scrape(&self, url: &str) -> ScrapeResult<String> {
        self.scrape_with(url, |_, body| Ok(body.to_string())).await
    }

    /// Fetches a URL and parses the body
    ///
    /// A token is acquired before every attempt, retries included. The parse
    /// closure receives the final URL and the body; a parse error is
    /// terminal.
    pub async fn scrape_with<T, F>(&self, url: &str, parse: F) -> ScrapeResult<T>
    where
        F: Fn(&str, &str) -> Result<T, ParseError>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            self.limiter.acquire().await;
            debug!(url = %url, attempt, "Fetching");

            let error = match timeout(self.policy.timeout, self.fetcher.fetch(url)).await {
                Err(_) => format!("Timed out after {:?}", self.policy.timeout),
                Ok(FetchResult::Transient { error }) => error,
                Ok(FetchResult::Terminal { error }) => {
                    debug!(url = %url, error = %error, "Terminal fetch failure");
                    return ScrapeResult::failed(url, error, attempt);
                }
                Ok(FetchResult::Success {
                    final_url, body, ..
                }) => {
                    return match parse(&final_url, &body) {
                        Ok(payload) => ScrapeResult::succeeded(url, payload, attempt),
                        Err(e) => {
                            debug!(url = %url, error = %e, "Parse failure");
                            ScrapeResult::failed(url, e.to_string(), attempt)
                        }
                    };
                }
            };

            last_error = error;

            if attempt < self.policy.max_attempts {
                let delay = self.policy.backoff_for(attempt);
                warn!(
                    url = %url,
                    attempt,
                    error = %last_error,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying"
                );
                sleep(delay).await;
            }
        }

        ScrapeResult::failed(url, last_error, self.policy.max_attempts)
    }

    /// Scrapes many URLs with at most `max_concurrent` in flight
    ///
    /// Returns exactly one result per input URL, in input order.
    pub async fn scrape_batch(&self, urls: &[String], max_concurrent: usize) -> Vec<ScrapeResult<String>> {
        let semaphore = Semaphore::new(max_concurrent.max(1));

        let tasks = urls.iter().map(|url| {
            let semaphore = &semaphore;
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return ScrapeResult::failed(url, e.to_string(), 0),
                };
                self.scrape(url).await
            }
        });

        join_all(tasks).await
    }
}
