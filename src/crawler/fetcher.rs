//! Page fetching
//!
//! This module provides the fetch capability behind every scrape:
//! - `PageFetcher`: the trait the executor and scrapers depend on
//! - `HttpFetcher`: plain HTTP GET via reqwest
//! - `RenderedFetcher` (feature `headless`): headless Chromium for
//!   client-rendered pages
//!
//! Fetchers never retry. They classify each outcome as success, transient
//! failure (worth retrying) or terminal failure, and the executor decides.

use crate::config::ScraperConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// Network error, timeout, 5xx or 429: retry may succeed
    Transient { error: String },

    /// Any other 4xx or a malformed request: retrying will not help
    Terminal { error: String },
}

/// Pluggable fetch capability
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches a URL once, without retrying
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - Scraper settings (user agent and timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ScraperConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a non-success HTTP status onto the retry classification
///
/// | Status | Result |
/// |--------|--------|
/// | 429 | Transient |
/// | 5xx | Transient |
/// | other 4xx | Terminal |
/// | anything else non-2xx | Terminal |
pub fn classify_status(status: StatusCode) -> FetchResult {
    let error = format!("HTTP {}", status.as_u16());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchResult::Transient { error }
    } else {
        FetchResult::Terminal { error }
    }
}

/// Plain HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return FetchResult::Terminal {
                    error: format!("Invalid request: {}", e),
                }
            }
            Err(e) if e.is_timeout() => {
                return FetchResult::Transient {
                    error: "Request timeout".to_string(),
                }
            }
            Err(e) if e.is_connect() => {
                return FetchResult::Transient {
                    error: format!("Connection failed: {}", e),
                }
            }
            Err(e) => {
                return FetchResult::Transient {
                    error: e.to_string(),
                }
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return classify_status(status);
        }

        match response.text().await {
            Ok(body) => FetchResult::Success {
                final_url,
                status_code: status.as_u16(),
                body,
            },
            Err(e) => FetchResult::Transient {
                error: format!("Failed to read body: {}", e),
            },
        }
    }
}

#[cfg(feature = "headless")]
pub use rendered::RenderedFetcher;

#[cfg(feature = "headless")]
mod rendered {
    use super::{FetchResult, PageFetcher};
    use crate::HarvestError;
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    /// Headless Chromium fetcher for client-rendered pages
    ///
    /// Navigates, waits for the navigation to settle, sleeps a fixed settle
    /// delay so late scripts can populate the DOM, then reads the HTML.
    pub struct RenderedFetcher {
        browser: Mutex<Browser>,
        handler: JoinHandle<()>,
        settle_delay: Duration,
    }

    impl RenderedFetcher {
        /// Launches a headless browser
        pub async fn launch(settle_delay: Duration) -> Result<Self, HarvestError> {
            let config = BrowserConfig::builder()
                .build()
                .map_err(HarvestError::Browser)?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| HarvestError::Browser(e.to_string()))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            Ok(Self {
                browser: Mutex::new(browser),
                handler,
                settle_delay,
            })
        }

        async fn render(&self, url: &str) -> Result<String, chromiumoxide::error::CdpError> {
            let page = {
                let browser = self.browser.lock().await;
                browser.new_page(url).await?
            };

            let result = async {
                page.wait_for_navigation().await?;
                tokio::time::sleep(self.settle_delay).await;
                page.content().await
            }
            .await;

            if let Err(e) = page.close().await {
                warn!(url = %url, error = %e, "Failed to close page");
            }

            result
        }
    }

    #[async_trait]
    impl PageFetcher for RenderedFetcher {
        async fn fetch(&self, url: &str) -> FetchResult {
            debug!(url = %url, "Rendering page");
            match self.render(url).await {
                Ok(body) => FetchResult::Success {
                    final_url: url.to_string(),
                    status_code: 200,
                    body,
                },
                Err(e) => FetchResult::Transient {
                    error: format!("Render failed: {}", e),
                },
            }
        }
    }

    impl Drop for RenderedFetcher {
        fn drop(&mut self) {
            self.handler.abort();
        }
    }
}
