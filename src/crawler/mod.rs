//! Crawler module for fetching and scraping site pages
//!
//! This module contains the scraping layer, including:
//! - Token-bucket rate limiting shared by every request
//! - Pluggable fetchers (plain HTTP, optional headless rendering)
//! - A retrying executor with timeouts and exponential backoff
//! - Entity, content and sitemap scrapers built on the executor

mod content;
mod entity;
mod executor;
mod fetcher;
mod rate_limit;
mod sitemap;

pub use content::{extract_content, render_artifact, slugify, ContentScraper, PageContent, SavedContent};
pub use entity::{
    entity_content_hash, parse_detail_page, parse_listing_page, EntityScraper, ListingItem,
};
pub use executor::{ParseError, RetryPolicy, ScrapeExecutor, ScrapeResult};
pub use fetcher::{build_http_client, classify_status, FetchResult, HttpFetcher, PageFetcher};
pub use rate_limit::RateLimiter;
pub use sitemap::{content_urls, parse_sitemap, SitemapDiscoverer, SitemapDocument, MAX_SITEMAP_DEPTH};

#[cfg(feature = "headless")]
pub use fetcher::RenderedFetcher;

use crate::config::ScraperConfig;
use std::sync::Arc;

/// Builds an executor over `fetcher` using the scraper settings
///
/// # Arguments
///
/// * `config` - Retry, timeout and backoff settings
/// * `fetcher` - Fetch capability behind the executor
/// * `limiter` - Rate limiter, shared across executors so that every
///   request draws from the same bucket
pub fn build_executor(
    config: &ScraperConfig,
    fetcher: Arc<dyn PageFetcher>,
    limiter: Arc<RateLimiter>,
) -> Arc<ScrapeExecutor> {
    Arc::new(ScrapeExecutor::new(
        fetcher,
        limiter,
        RetryPolicy::from_config(config),
    ))
}
