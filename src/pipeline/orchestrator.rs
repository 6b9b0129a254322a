//! Pipeline orchestration
//!
//! A job runs one or both sub-pipelines and records its lifecycle:
//!
//! ```text
//! start_job (RUNNING) ─► ScrapeStarted
//!     ├─ entities: listings ─► detail pages ─► upsert ─► diff-based removal
//!     └─ content:  sitemap ─► phase 1 (all URLs) ─► phase 2 (bounded retry rounds)
//! complete_job (COMPLETED) ─► ScrapeCompleted ─► SyncRequired
//!   or on error: fail_job (FAILED) ─► ScrapeFailed
//! ```
//!
//! Per-URL failures never fail the job; they are tracked and counted.

use crate::config::Config;
use crate::crawler::{ContentScraper, EntityScraper, ListingItem, SitemapDiscoverer};
use crate::events::{Event, EventBus, EventType};
use crate::state::{JobStatus, JobType, UrlType};
use crate::storage::{with_storage, JobCounts, SharedStorage, Storage, StorageResult, UpsertOutcome};
use crate::url::{extract_reference_number, listing_urls, CategorizedUrl};
use crate::Result;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error, info, warn};

/// Pipeline tunables taken from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Listing roots walked by the entity sub-pipeline
    pub listing_urls: Vec<String>,
    pub max_pages: u32,
    /// Retry rounds in content phase 2, and the per-URL retry cap
    pub max_retries: u32,
    /// Consecutive missed runs before an entity is removed
    pub removal_confirmations: u32,
    pub max_concurrent: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let listing_urls = if config.site.listing_urls.is_empty() {
            listing_urls(&config.site.locale)
                .iter()
                .map(|url| url.to_string())
                .collect()
        } else {
            config.site.listing_urls.clone()
        };

        Self {
            listing_urls,
            max_pages: config.pipeline.max_pages,
            max_retries: config.pipeline.max_retries,
            removal_confirmations: config.pipeline.removal_confirmations,
            max_concurrent: config.scraper.max_concurrent,
        }
    }
}

/// Result of a completed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub job_id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub counts: JobCounts,
    /// Reference numbers marked removed during the run
    pub removed: Vec<String>,
}

#[derive(Debug, Default)]
struct RunOutcome {
    counts: JobCounts,
    removed: Vec<String>,
}

/// Coordinates scrapers, storage and events for each job
pub struct Orchestrator {
    pub(crate) storage: SharedStorage,
    pub(crate) bus: EventBus,
    pub(crate) entities: EntityScraper,
    pub(crate) content: ContentScraper,
    pub(crate) sitemap: SitemapDiscoverer,
    pub(crate) settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        storage: SharedStorage,
        bus: EventBus,
        entities: EntityScraper,
        content: ContentScraper,
        sitemap: SitemapDiscoverer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            storage,
            bus,
            entities,
            content,
            sitemap,
            settings,
        }
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub(crate) fn store<T>(
        &self,
        f: impl FnOnce(&mut (dyn Storage + Send + 'static)) -> StorageResult<T>,
    ) -> Result<T> {
        with_storage(&self.storage, f)
    }

    /// Runs sitemap discovery, entities and content
    pub async fn run_full_scrape(&self) -> Result<JobSummary> {
        self.run(JobType::Full).await
    }

    /// Runs the entity sub-pipeline only
    pub async fn run_entity_scrape(&self) -> Result<JobSummary> {
        self.run(JobType::EntitiesOnly).await
    }

    /// Runs sitemap discovery and the content sub-pipeline
    pub async fn run_content_scrape(&self) -> Result<JobSummary> {
        self.run(JobType::ContentOnly).await
    }

    /// Re-reads the sitemap and returns the discovered URLs
    pub async fn refresh_sitemap(&self) -> Vec<String> {
        let urls = self.sitemap.discover_urls().await;
        info!(count = urls.len(), "Sitemap refreshed");
        urls
    }

    /// Discovers and categorizes sitemap URLs without scraping anything
    pub async fn discover(&self) -> BTreeMap<UrlType, Vec<CategorizedUrl>> {
        self.sitemap.discover_and_categorize().await
    }

    /// Every scrapable sitemap URL in priority order
    pub async fn scrapable(&self) -> Vec<CategorizedUrl> {
        self.sitemap.scrapable_urls().await
    }

    /// Runs one job through its full lifecycle
    ///
    /// # Returns
    ///
    /// * `Ok(JobSummary)` - The job completed; counts reconcile
    /// * `Err(HarvestError)` - The job was marked failed and the error is
    ///   passed on
    pub async fn run(&self, job_type: JobType) -> Result<JobSummary> {
        let job = self.store(|s| s.start_job(job_type))?;
        info!(job_id = job.id, job_type = %job_type, "Scrape job started");

        self.bus
            .emit(
                Event::new(EventType::ScrapeStarted)
                    .with("job_id", job.id)
                    .with("job_type", job_type),
            )
            .await;

        let result = match self.execute(job.id, job_type).await {
            Ok(outcome) => self
                .store(|s| s.complete_job(job.id, outcome.counts))
                .map(|_| outcome),
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                let counts = outcome.counts;
                if !counts.is_reconciled() {
                    warn!(job_id = job.id, ?counts, "Job counts do not reconcile");
                }
                info!(
                    job_id = job.id,
                    discovered = counts.discovered,
                    scraped = counts.scraped,
                    failed = counts.failed,
                    removed = outcome.removed.len(),
                    "Scrape job completed"
                );

                self.bus
                    .emit(
                        Event::new(EventType::ScrapeCompleted)
                            .with("job_id", job.id)
                            .with("job_type", job_type)
                            .with("discovered", counts.discovered)
                            .with("scraped", counts.scraped)
                            .with("failed", counts.failed),
                    )
                    .await;
                self.bus
                    .emit(Event::new(EventType::SyncRequired).with("job_id", job.id))
                    .await;

                Ok(JobSummary {
                    job_id: job.id,
                    job_type,
                    status: JobStatus::Completed,
                    counts,
                    removed: outcome.removed,
                })
            }
            Err(e) => {
                let message = e.to_string();
                error!(job_id = job.id, error = %message, "Scrape job failed");

                if let Err(fail_err) = self.store(|s| s.fail_job(job.id, &message)) {
                    error!(job_id = job.id, error = %fail_err, "Could not record job failure");
                }

                self.bus
                    .emit(
                        Event::new(EventType::ScrapeFailed)
                            .with("job_id", job.id)
                            .with("error", &message),
                    )
                    .await;

                Err(e)
            }
        }
    }

    async fn execute(&self, job_id: i64, job_type: JobType) -> Result<RunOutcome> {
        match job_type {
            JobType::Full => {
                let categorized = self.sitemap.discover_and_categorize().await;
                let entities = self.run_entity_pipeline(job_id).await?;
                let content = self.run_content_pipeline(job_id, &categorized).await?;
                Ok(RunOutcome {
                    counts: entities.counts + content,
                    removed: entities.removed,
                })
            }
            JobType::EntitiesOnly => self.run_entity_pipeline(job_id).await,
            JobType::ContentOnly => {
                let categorized = self.sitemap.discover_and_categorize().await;
                let content = self.run_content_pipeline(job_id, &categorized).await?;
                Ok(RunOutcome {
                    counts: content,
                    removed: Vec::new(),
                })
            }
        }
    }

    // ===== Entity sub-pipeline =====

    async fn run_entity_pipeline(&self, job_id: i64) -> Result<RunOutcome> {
        let known = self.store(|s| s.get_all_reference_numbers())?;
        let mut counts = JobCounts::default();
        let mut seen_urls = HashSet::new();
        let mut listed = HashSet::new();

        for listing in &self.settings.listing_urls {
            info!(listing = %listing, "Scraping listing");
            let items = self
                .entities
                .scrape_listing_with_pagination(listing, self.settings.max_pages)
                .await;

            for item in items {
                if !seen_urls.insert(item.url.clone()) {
                    continue;
                }
                counts.discovered += 1;

                match self.scrape_entity(Some(job_id), &item).await {
                    Ok(reference) => {
                        counts.scraped += 1;
                        listed.insert(reference);
                    }
                    Err(error) => {
                        counts.failed += 1;
                        warn!(url = %item.url, error = %error, "Entity scrape failed");
                        if let Err(e) = self.store(|s| s.mark_failed(&item.url, &error)) {
                            warn!(url = %item.url, error = %e, "Could not record entity failure");
                        }
                        // Still listed: a failed detail page is not a removal.
                        if let Some(reference) = extract_reference_number(&item.url) {
                            listed.insert(reference);
                        }
                    }
                }
            }
        }

        let removed = if counts.discovered == 0 && !known.is_empty() {
            warn!(
                known = known.len(),
                "No listings returned any entity, skipping removal"
            );
            Vec::new()
        } else {
            self.remove_missing(job_id, &known, &listed).await
        };

        info!(
            discovered = counts.discovered,
            scraped = counts.scraped,
            failed = counts.failed,
            removed = removed.len(),
            "Entity scraping complete"
        );

        Ok(RunOutcome { counts, removed })
    }

    /// Scrapes one detail page and persists it
    ///
    /// Returns the reference number, or the error message to track.
    pub(crate) async fn scrape_entity(
        &self,
        job_id: Option<i64>,
        item: &ListingItem,
    ) -> std::result::Result<String, String> {
        let url = item.url.as_str();
        self.store(|s| s.upsert_url(url, UrlType::Entity, job_id))
            .map_err(|e| e.to_string())?;

        let mut record = self.entities.scrape_detail_page(url).await.into_result()?;
        item.enrich(&mut record);

        let outcome = self
            .store(|s| s.upsert_entity(&record))
            .map_err(|e| e.to_string())?;
        self.store(|s| s.mark_success(url, &record.content_hash, None))
            .map_err(|e| e.to_string())?;

        let event_type = match outcome {
            UpsertOutcome::Created => EventType::EntityDiscovered,
            UpsertOutcome::Changed | UpsertOutcome::Unchanged => EventType::EntityUpdated,
        };
        debug!(url = %url, reference = %record.reference_number, ?outcome, "Entity saved");

        let mut event = Event::new(event_type)
            .with("url", url)
            .with("reference", &record.reference_number);
        if let Some(job_id) = job_id {
            event = event.with("job_id", job_id);
        }
        self.bus.emit(event).await;

        Ok(record.reference_number)
    }

    /// Removes entities known before the run that no listing showed
    async fn remove_missing(
        &self,
        job_id: i64,
        known: &HashSet<String>,
        listed: &HashSet<String>,
    ) -> Vec<String> {
        let mut candidates: Vec<&String> = known.difference(listed).collect();
        candidates.sort();

        let mut removed = Vec::new();
        for reference in candidates {
            match self.confirm_removal(reference) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Could not process removal");
                    continue;
                }
            }

            info!(reference = %reference, "Entity no longer listed, marked removed");
            self.bus
                .emit(
                    Event::new(EventType::EntityRemoved)
                        .with("job_id", job_id)
                        .with("reference", reference),
                )
                .await;
            removed.push(reference.clone());
        }

        removed
    }

    /// Records a miss and marks the entity removed once confirmed
    fn confirm_removal(&self, reference: &str) -> Result<bool> {
        let required = self.settings.removal_confirmations;
        if required > 1 {
            let misses = self.store(|s| s.record_miss(reference))?;
            if misses < required {
                debug!(reference = %reference, misses, required, "Entity missed, awaiting confirmation");
                return Ok(false);
            }
        }
        self.store(|s| s.mark_removed(reference))?;
        Ok(true)
    }

    // ===== Content sub-pipeline =====

    async fn run_content_pipeline(
        &self,
        job_id: i64,
        categorized: &BTreeMap<UrlType, Vec<CategorizedUrl>>,
    ) -> Result<JobCounts> {
        let targets: Vec<(String, UrlType)> = categorized
            .iter()
            .filter(|(url_type, _)| url_type.is_content())
            .flat_map(|(url_type, urls)| urls.iter().map(|c| (c.url.clone(), *url_type)))
            .collect();

        let mut counts = JobCounts {
            discovered: targets.len() as u64,
            ..Default::default()
        };

        info!(urls = targets.len(), "Content phase 1: initial pass");
        let outcomes: Vec<(String, bool)> = stream::iter(targets)
            .map(|(url, url_type)| async move {
                let saved = match self.store(|s| s.upsert_url(&url, url_type, Some(job_id))) {
                    Ok(_) => self.save_content(Some(job_id), &url).await,
                    Err(e) => {
                        warn!(url = %url, error = %e, "Could not track content URL");
                        false
                    }
                };
                (url, saved)
            })
            .buffer_unordered(self.settings.max_concurrent.max(1))
            .collect()
            .await;

        let mut failed_this_run: HashSet<String> = HashSet::new();
        for (url, saved) in outcomes {
            if saved {
                counts.scraped += 1;
            } else {
                failed_this_run.insert(url);
            }
        }
        counts.failed = failed_this_run.len() as u64;

        info!(
            scraped = counts.scraped,
            failed = counts.failed,
            "Content phase 1 complete"
        );

        let max_retries = self.settings.max_retries;
        for round in 1..=max_retries {
            let retryable: Vec<String> = self
                .store(|s| s.get_failed(max_retries))?
                .into_iter()
                .map(|tracked| tracked.url)
                .filter(|url| failed_this_run.contains(url))
                .collect();

            if retryable.is_empty() {
                info!(round, "No retryable content URLs left");
                break;
            }

            info!(round, urls = retryable.len(), "Content phase 2: retry round");
            let retried = retryable.len();
            let recovered: Vec<String> = stream::iter(retryable)
                .map(|url| async move {
                    let saved = self.save_content(Some(job_id), &url).await;
                    saved.then_some(url)
                })
                .buffer_unordered(self.settings.max_concurrent.max(1))
                .filter_map(|url| async move { url })
                .collect()
                .await;

            for url in &recovered {
                failed_this_run.remove(url);
                counts.scraped += 1;
                counts.failed -= 1;
            }

            info!(round, retried, recovered = recovered.len(), "Retry round complete");
            if recovered.is_empty() {
                info!(round, "No retries succeeded, stopping retry loop");
                break;
            }
        }

        info!(
            discovered = counts.discovered,
            scraped = counts.scraped,
            failed = counts.failed,
            "Content scraping complete"
        );

        Ok(counts)
    }

    /// Fetches and saves one content page, tracking the outcome
    pub(crate) async fn save_content(&self, job_id: Option<i64>, url: &str) -> bool {
        let result = self.content.scrape_and_save(url).await;
        let tracked = match result.into_result() {
            Ok(saved) => {
                let file_path = saved.file_path.to_string_lossy().into_owned();
                match self.store(|s| s.mark_success(url, &saved.content_hash, Some(&file_path))) {
                    Ok(()) => Ok(file_path),
                    Err(e) => Err(e.to_string()),
                }
            }
            Err(error) => Err(error),
        };

        match tracked {
            Ok(file_path) => {
                let mut event = Event::new(EventType::ContentSaved)
                    .with("url", url)
                    .with("file_path", &file_path);
                if let Some(job_id) = job_id {
                    event = event.with("job_id", job_id);
                }
                self.bus.emit(event).await;
                true
            }
            Err(error) => {
                warn!(url = %url, error = %error, "Content scrape failed");
                if let Err(e) = self.store(|s| s.mark_failed(url, &error)) {
                    warn!(url = %url, error = %e, "Could not record content failure");
                }
                false
            }
        }
    }
}
