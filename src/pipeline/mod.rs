//! Pipeline module: orchestration, scheduling and admin operations
//!
//! [`build_orchestrator`] wires the crawler layer to storage and the event
//! bus from a [`Config`]; [`PipelineScheduler`] drives the orchestrator on
//! its schedule.

mod admin;
mod orchestrator;
mod scheduler;

pub use admin::{reconcile_stale_jobs, ReconciledJob, RetryReport};
pub use orchestrator::{JobSummary, Orchestrator, PipelineSettings};
pub use scheduler::{PipelineScheduler, ScheduledJob};

use crate::config::{Config, Renderer};
use crate::crawler::{
    build_executor, ContentScraper, EntityScraper, HttpFetcher, PageFetcher, RateLimiter,
    SitemapDiscoverer,
};
use crate::events::EventBus;
use crate::storage::SharedStorage;
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Builds the fetcher used for content pages
#[cfg(feature = "headless")]
async fn content_fetcher(config: &Config, http: Arc<HttpFetcher>) -> Result<Arc<dyn PageFetcher>> {
    match config.content.renderer {
        Renderer::Http => Ok(http),
        Renderer::Headless => {
            let settle = std::time::Duration::from_millis(config.content.settle_delay_ms);
            let rendered = crate::crawler::RenderedFetcher::launch(settle).await?;
            Ok(Arc::new(rendered))
        }
    }
}

/// Builds the fetcher used for content pages
#[cfg(not(feature = "headless"))]
async fn content_fetcher(config: &Config, http: Arc<HttpFetcher>) -> Result<Arc<dyn PageFetcher>> {
    match config.content.renderer {
        Renderer::Http => Ok(http),
        Renderer::Headless => Err(crate::ConfigError::Validation(
            "content.renderer = \"headless\" requires the `headless` feature".to_string(),
        )
        .into()),
    }
}

/// Assembles an orchestrator from configuration
///
/// Every request, whichever fetcher serves it, draws from one rate limiter.
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `storage` - Shared store
/// * `bus` - Event bus handlers are registered on
pub async fn build_orchestrator(
    config: &Config,
    storage: SharedStorage,
    bus: EventBus,
) -> Result<Orchestrator> {
    let limiter = Arc::new(RateLimiter::new(
        config.scraper.requests_per_second,
        config.scraper.burst,
    )?);
    info!(
        "Rate limit: {} requests/s, burst {}",
        limiter.refill_rate(),
        limiter.capacity()
    );
    let http = Arc::new(HttpFetcher::from_config(&config.scraper)?);

    let page_executor = build_executor(&config.scraper, http.clone(), limiter.clone());
    let content_executor = build_executor(
        &config.scraper,
        content_fetcher(config, http).await?,
        limiter,
    );

    let entities = EntityScraper::new(page_executor.clone(), &config.site.base_url)?;
    let content = ContentScraper::new(content_executor, &config.content.directory)?;
    let sitemap = SitemapDiscoverer::new(page_executor, config.site.sitemap_url.clone());

    Ok(Orchestrator::new(
        storage,
        bus,
        entities,
        content,
        sitemap,
        PipelineSettings::from_config(config),
    ))
}
