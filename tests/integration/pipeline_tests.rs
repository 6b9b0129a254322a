//! Integration tests for the pipeline
//!
//! These tests run whole jobs against a wiremock site and a SQLite database
//! in a temporary directory, then check what was persisted and emitted.

use ark_harvest::config::{
    Config, ContentConfig, OutputConfig, PipelineConfig, ScheduleConfig, ScraperConfig, SiteConfig,
};
use ark_harvest::events::{Event, EventBus, EventHandler, EventType};
use ark_harvest::pipeline::{build_orchestrator, Orchestrator, PipelineScheduler};
use ark_harvest::state::EntityStatus;
use ark_harvest::storage::{lock, open_storage, SharedStorage};
use ark_harvest::{JobStatus, JobType, ScrapeStatus};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Collects every event it receives
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn types(&self) -> Vec<EventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.event_type)
            .collect()
    }

    fn count(&self, event_type: EventType) -> usize {
        self.types().into_iter().filter(|t| *t == event_type).count()
    }

    fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl EventHandler for Recorder {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Creates a test configuration pointing at the mock site
fn create_test_config(base_url: &str, dir: &Path, listing_path: &str) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            sitemap_url: format!("{}/sitemap_index.xml", base_url),
            listing_urls: vec![format!("{}{}", base_url, listing_path)],
            locale: "en".to_string(),
        },
        scraper: ScraperConfig {
            requests_per_second: 1000.0,
            burst: 100,
            max_concurrent: 4,
            timeout_secs: 5,
            max_attempts: 1,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
            user_agent: "ark-harvest-test/1.0".to_string(),
        },
        content: ContentConfig {
            directory: dir.join("content").to_string_lossy().into_owned(),
            ..Default::default()
        },
        pipeline: PipelineConfig {
            max_pages: 10,
            max_retries: 3,
            removal_confirmations: 1,
            stale_job_minutes: 60,
        },
        schedule: ScheduleConfig::default(),
        output: OutputConfig {
            database_path: dir.join("harvest.db").to_string_lossy().into_owned(),
        },
    }
}

fn open_test_storage(config: &Config) -> SharedStorage {
    open_storage(Path::new(&config.output.database_path)).expect("Failed to open storage")
}

async fn create_orchestrator(
    config: &Config,
    storage: &SharedStorage,
) -> (Orchestrator, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let bus = EventBus::new();
    bus.on_any(recorder.clone());

    let orchestrator = build_orchestrator(config, storage.clone(), bus)
        .await
        .expect("Failed to build orchestrator");
    (orchestrator, recorder)
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

fn xml(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "application/xml")
}

fn listing_page(slugs: &[&str]) -> String {
    let cards: String = slugs
        .iter()
        .map(|slug| {
            format!(
                r#"<div class="single--card pet--card">
                     <a class="card--link" href="/en/animal/{slug}/"></a>
                     <h5 class="card--title">{slug}</h5>
                     <div class="pet--infos">Dog ● Adult</div>
                   </div>"#
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", cards)
}

fn detail_page(name: &str, reference: &str) -> String {
    format!(
        r#"<html><body>
             <div class="single-pet">
               <h2>{name}</h2>
               <h5>Description</h5>
               <p>{name} is looking for a home.</p>
               <table>
                 <tr><td>Reference number</td><td>{reference}</td></tr>
                 <tr><td>Species</td><td>Dog</td></tr>
               </table>
             </div>
           </body></html>"#
    )
}

fn content_page(title: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body><h1>{title}</h1><p>Welcome to {title}.</p></body></html>"
    )
}

/// Mounts a single-page listing followed by an empty page 2
async fn mount_listing(server: &MockServer, listing_path: &str, slugs: &[&str]) {
    Mock::given(method("GET"))
        .and(path(listing_path.to_string()))
        .respond_with(html(listing_page(slugs)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}page/2/", listing_path)))
        .respond_with(html(listing_page(&[])))
        .mount(server)
        .await;
}

/// Mounts a detail page for `{name}-dog-{reference}`
async fn mount_detail(server: &MockServer, name: &str, reference: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/en/animal/{}-dog-{}/", name.to_lowercase(), reference)))
        .respond_with(html(detail_page(name, reference)))
        .mount(server)
        .await;
}

/// Mounts a sitemap index with one urlset holding `page_paths`
async fn mount_sitemap(server: &MockServer, page_paths: &[&str]) {
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
               <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                 <sitemap><loc>{base}/page-sitemap.xml</loc></sitemap>
               </sitemapindex>"#
        )))
        .mount(server)
        .await;

    let urls: String = page_paths
        .iter()
        .map(|page| format!("<url><loc>{}{}</loc></url>", base, page))
        .collect();
    Mock::given(method("GET"))
        .and(path("/page-sitemap.xml"))
        .respond_with(xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
               <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{urls}</urlset>"#
        )))
        .mount(server)
        .await;
}

async fn count_requests(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == request_path)
        .count()
}

fn entity_status(storage: &SharedStorage, reference: &str) -> Option<EntityStatus> {
    lock(storage)
        .unwrap()
        .get_by_reference(reference)
        .unwrap()
        .map(|entity| entity.status)
}

const DOGS: &str = "/en/adoption/dogs-for-adoption/";
const CATS: &str = "/en/adoption/cats-for-adoption/";

#[tokio::test]
async fn test_full_scrape_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    // Entities: two on page 1, one on page 2, page 3 empty.
    Mock::given(method("GET"))
        .and(path(DOGS))
        .respond_with(html(listing_page(&["alpha-dog-1001", "bravo-dog-1002"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}page/2/", DOGS)))
        .respond_with(html(listing_page(&["charlie-dog-1003"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}page/3/", DOGS)))
        .respond_with(html(listing_page(&[])))
        .mount(&server)
        .await;
    mount_detail(&server, "Alpha", "1001").await;
    mount_detail(&server, "Bravo", "1002").await;
    mount_detail(&server, "Charlie", "1003").await;

    mount_sitemap(
        &server,
        &[
            "/en/about-us/",
            "/en/contact/",
            "/en/services/clinic/",
            "/en/tips-and-advice/summer-heat/",
            "/en/volunteer/",
            "/wp-content/uploads/annual-report.pdf",
            "/en/animal/alpha-dog-1001/",
        ],
    )
    .await;
    for (page, title) in [
        ("/en/about-us/", "About Us"),
        ("/en/contact/", "Contact"),
        ("/en/services/clinic/", "Clinic"),
        ("/en/tips-and-advice/summer-heat/", "Summer Heat"),
    ] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html(content_page(title)))
            .mount(&server)
            .await;
    }
    // Fails both phase-1 attempts, then recovers in the first retry round.
    Mock::given(method("GET"))
        .and(path("/en/volunteer/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/volunteer/"))
        .respond_with(html(content_page("Volunteer")))
        .mount(&server)
        .await;

    let mut config = create_test_config(&base, dir.path(), DOGS);
    config.scraper.max_attempts = 2;
    let storage = open_test_storage(&config);
    let (orchestrator, recorder) = create_orchestrator(&config, &storage).await;

    let summary = orchestrator.run_full_scrape().await.unwrap();

    assert_eq!(summary.job_type, JobType::Full);
    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.counts.discovered, 8);
    assert_eq!(summary.counts.scraped, 8);
    assert_eq!(summary.counts.failed, 0);
    assert!(summary.removed.is_empty());

    {
        let guard = lock(&storage).unwrap();
        let job = guard.get_job(summary.job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.counts, summary.counts);
        assert!(job.completed_at.is_some());
        assert_eq!(guard.count_for_job(summary.job_id).unwrap(), summary.counts);

        let volunteer = guard
            .get_by_url(&format!("{}/en/volunteer/", base))
            .unwrap()
            .unwrap();
        assert_eq!(volunteer.scrape_status, ScrapeStatus::Success);
        assert_eq!(volunteer.retry_count, 1);
        assert!(volunteer.file_path.is_some());

        assert!(guard
            .get_by_url(&format!("{}/wp-content/uploads/annual-report.pdf", base))
            .unwrap()
            .is_none());

        assert_eq!(guard.get_all_reference_numbers().unwrap().len(), 3);
        let alpha = guard.get_by_reference("1001").unwrap().unwrap();
        assert_eq!(alpha.record.name, "Alpha");
        assert_eq!(alpha.record.age_category.as_deref(), Some("Adult"));
        assert_eq!(alpha.status, EntityStatus::Available);
    }

    let files = std::fs::read_dir(dir.path().join("content")).unwrap().count();
    assert_eq!(files, 5);

    let types = recorder.types();
    assert_eq!(types.first(), Some(&EventType::ScrapeStarted));
    assert_eq!(
        &types[types.len() - 2..],
        &[EventType::ScrapeCompleted, EventType::SyncRequired]
    );
    assert_eq!(recorder.count(EventType::EntityDiscovered), 3);
    assert_eq!(recorder.count(EventType::ContentSaved), 5);
    assert_eq!(recorder.count(EventType::ScrapeFailed), 0);
}

#[tokio::test]
async fn test_unlisted_entity_is_removed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_listing(&server, DOGS, &["alpha-dog-1001", "bravo-dog-1002", "charlie-dog-1003"]).await;
    mount_listing(&server, CATS, &["alpha-dog-1001", "bravo-dog-1002", "delta-dog-1004"]).await;
    for (name, reference) in [
        ("Alpha", "1001"),
        ("Bravo", "1002"),
        ("Charlie", "1003"),
        ("Delta", "1004"),
    ] {
        mount_detail(&server, name, reference).await;
    }

    let first = create_test_config(&base, dir.path(), DOGS);
    let storage = open_test_storage(&first);
    let (orchestrator, _) = create_orchestrator(&first, &storage).await;
    let summary = orchestrator.run_entity_scrape().await.unwrap();
    assert_eq!(summary.counts.scraped, 3);
    assert!(summary.removed.is_empty());

    let second = create_test_config(&base, dir.path(), CATS);
    let (orchestrator, recorder) = create_orchestrator(&second, &storage).await;
    let summary = orchestrator.run_entity_scrape().await.unwrap();

    assert_eq!(summary.removed, vec!["1003".to_string()]);
    assert_eq!(entity_status(&storage, "1003"), Some(EntityStatus::Removed));
    assert_eq!(entity_status(&storage, "1004"), Some(EntityStatus::Available));
    assert_eq!(entity_status(&storage, "1001"), Some(EntityStatus::Available));

    assert_eq!(recorder.count(EventType::EntityRemoved), 1);
    assert_eq!(recorder.count(EventType::EntityDiscovered), 1);
    assert_eq!(recorder.count(EventType::EntityUpdated), 2);

    let references = lock(&storage).unwrap().get_all_reference_numbers().unwrap();
    let mut references: Vec<String> = references.into_iter().collect();
    references.sort();
    assert_eq!(references, vec!["1001", "1002", "1004"]);
}

#[tokio::test]
async fn test_removal_waits_for_confirmations() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_listing(&server, DOGS, &["alpha-dog-1001", "bravo-dog-1002"]).await;
    mount_listing(&server, CATS, &["alpha-dog-1001"]).await;
    mount_detail(&server, "Alpha", "1001").await;
    mount_detail(&server, "Bravo", "1002").await;

    let mut first = create_test_config(&base, dir.path(), DOGS);
    first.pipeline.removal_confirmations = 2;
    let storage = open_test_storage(&first);
    let (orchestrator, _) = create_orchestrator(&first, &storage).await;
    orchestrator.run_entity_scrape().await.unwrap();

    let mut second = create_test_config(&base, dir.path(), CATS);
    second.pipeline.removal_confirmations = 2;
    let (orchestrator, recorder) = create_orchestrator(&second, &storage).await;

    let summary = orchestrator.run_entity_scrape().await.unwrap();
    assert!(summary.removed.is_empty());
    let bravo = lock(&storage).unwrap().get_by_reference("1002").unwrap().unwrap();
    assert_eq!(bravo.status, EntityStatus::Available);
    assert_eq!(bravo.missed_runs, 1);

    let summary = orchestrator.run_entity_scrape().await.unwrap();
    assert_eq!(summary.removed, vec!["1002".to_string()]);
    assert_eq!(entity_status(&storage, "1002"), Some(EntityStatus::Removed));
    assert_eq!(recorder.count(EventType::EntityRemoved), 1);
}

#[tokio::test]
async fn test_empty_listings_skip_removal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_listing(&server, DOGS, &["alpha-dog-1001"]).await;
    mount_listing(&server, CATS, &[]).await;
    mount_detail(&server, "Alpha", "1001").await;

    let first = create_test_config(&base, dir.path(), DOGS);
    let storage = open_test_storage(&first);
    let (orchestrator, _) = create_orchestrator(&first, &storage).await;
    orchestrator.run_entity_scrape().await.unwrap();

    let second = create_test_config(&base, dir.path(), CATS);
    let (orchestrator, recorder) = create_orchestrator(&second, &storage).await;
    let summary = orchestrator.run_entity_scrape().await.unwrap();

    assert_eq!(summary.counts.discovered, 0);
    assert!(summary.removed.is_empty());
    assert_eq!(entity_status(&storage, "1001"), Some(EntityStatus::Available));
    assert_eq!(recorder.count(EventType::EntityRemoved), 0);
}

#[tokio::test]
async fn test_failed_detail_page_is_not_removed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_listing(&server, DOGS, &["alpha-dog-1001", "bravo-dog-1002"]).await;
    mount_detail(&server, "Alpha", "1001").await;
    // Bravo's profile loads once, then disappears.
    Mock::given(method("GET"))
        .and(path("/en/animal/bravo-dog-1002/"))
        .respond_with(html(detail_page("Bravo", "1002")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/animal/bravo-dog-1002/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = create_test_config(&base, dir.path(), DOGS);
    let storage = open_test_storage(&config);
    let (orchestrator, _) = create_orchestrator(&config, &storage).await;

    orchestrator.run_entity_scrape().await.unwrap();
    let summary = orchestrator.run_entity_scrape().await.unwrap();

    assert_eq!(summary.counts.discovered, 2);
    assert_eq!(summary.counts.scraped, 1);
    assert_eq!(summary.counts.failed, 1);
    assert!(summary.removed.is_empty());
    assert_eq!(entity_status(&storage, "1002"), Some(EntityStatus::Available));

    let tracked = lock(&storage)
        .unwrap()
        .get_by_url(&format!("{}/en/animal/bravo-dog-1002/", base))
        .unwrap()
        .unwrap();
    assert_eq!(tracked.scrape_status, ScrapeStatus::Failed);
    assert_eq!(tracked.error_message.as_deref(), Some("HTTP 404"));
}

#[tokio::test]
async fn test_retry_rounds_stop_when_nothing_recovers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_sitemap(&server, &["/en/about-us/", "/en/down-for-maintenance/"]).await;
    Mock::given(method("GET"))
        .and(path("/en/about-us/"))
        .respond_with(html(content_page("About Us")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/down-for-maintenance/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(&base, dir.path(), DOGS);
    let storage = open_test_storage(&config);
    let (orchestrator, recorder) = create_orchestrator(&config, &storage).await;

    let summary = orchestrator.run_content_scrape().await.unwrap();

    assert_eq!(summary.job_type, JobType::ContentOnly);
    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.counts.discovered, 2);
    assert_eq!(summary.counts.scraped, 1);
    assert_eq!(summary.counts.failed, 1);

    // Phase 1 plus one fruitless retry round, not three.
    assert_eq!(count_requests(&server, "/en/down-for-maintenance/").await, 2);
    assert_eq!(count_requests(&server, "/en/about-us/").await, 1);

    let tracked = lock(&storage)
        .unwrap()
        .get_by_url(&format!("{}/en/down-for-maintenance/", base))
        .unwrap()
        .unwrap();
    assert_eq!(tracked.scrape_status, ScrapeStatus::Failed);
    assert_eq!(tracked.retry_count, 2);
    assert_eq!(tracked.error_message.as_deref(), Some("HTTP 503"));

    assert_eq!(recorder.count(EventType::ContentSaved), 1);
    assert_eq!(recorder.count(EventType::EntityDiscovered), 0);
}

#[tokio::test]
async fn test_retry_rounds_carry_failures_forward() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_sitemap(&server, &["/en/adopt/", "/en/donate/", "/en/events/"]).await;
    Mock::given(method("GET"))
        .and(path("/en/adopt/"))
        .respond_with(html(content_page("Adopt")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/donate/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/donate/"))
        .respond_with(html(content_page("Donate")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/events/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(&base, dir.path(), DOGS);
    let storage = open_test_storage(&config);
    let (orchestrator, _recorder) = create_orchestrator(&config, &storage).await;

    let summary = orchestrator.run_content_scrape().await.unwrap();

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.counts.discovered, 3);
    assert_eq!(summary.counts.scraped, 2);
    assert_eq!(summary.counts.failed, 1);

    let tracked = |page: &str| {
        lock(&storage)
            .unwrap()
            .get_by_url(&format!("{}{}", base, page))
            .unwrap()
            .unwrap()
    };

    let adopt = tracked("/en/adopt/");
    assert_eq!(adopt.scrape_status, ScrapeStatus::Success);
    assert_eq!(adopt.retry_count, 0);

    // Failed phase 1, recovered in round 1
    let donate = tracked("/en/donate/");
    assert_eq!(donate.scrape_status, ScrapeStatus::Success);
    assert_eq!(donate.retry_count, 1);
    assert_eq!(count_requests(&server, "/en/donate/").await, 2);

    // Still failing after round 1, so retried in round 2. Round 2 recovers
    // nothing and the cap is reached, so there is no round 3.
    let events = tracked("/en/events/");
    assert_eq!(events.scrape_status, ScrapeStatus::Failed);
    assert_eq!(events.retry_count, 3);
    assert_eq!(count_requests(&server, "/en/events/").await, 3);

    let still_retryable = lock(&storage).unwrap().get_failed(3).unwrap();
    assert!(still_retryable.is_empty());
}

#[tokio::test]
async fn test_retry_failed_urls_recovers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_sitemap(&server, &["/en/services/shelter/"]).await;
    Mock::given(method("GET"))
        .and(path("/en/services/shelter/"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/services/shelter/"))
        .respond_with(html(content_page("Shelter")))
        .mount(&server)
        .await;

    let config = create_test_config(&base, dir.path(), DOGS);
    let storage = open_test_storage(&config);
    let (orchestrator, recorder) = create_orchestrator(&config, &storage).await;

    let summary = orchestrator.run_content_scrape().await.unwrap();
    assert_eq!(summary.counts.failed, 1);
    recorder.clear();

    let report = orchestrator.retry_failed_urls().await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(report.recovered, 1);
    assert_eq!(report.still_failed, 0);
    assert_eq!(recorder.types(), vec![EventType::ContentSaved]);

    let tracked = lock(&storage)
        .unwrap()
        .get_by_url(&format!("{}/en/services/shelter/", base))
        .unwrap()
        .unwrap();
    assert_eq!(tracked.scrape_status, ScrapeStatus::Success);
    assert_eq!(tracked.retry_count, 2);

    // Nothing left to retry.
    let report = orchestrator.retry_failed_urls().await.unwrap();
    assert_eq!(report.retried, 0);
}

#[tokio::test]
async fn test_storage_failure_marks_job_failed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_listing(&server, DOGS, &["alpha-dog-1001"]).await;
    mount_detail(&server, "Alpha", "1001").await;

    let config = create_test_config(&base, dir.path(), DOGS);
    let storage = open_test_storage(&config);
    let (orchestrator, recorder) = create_orchestrator(&config, &storage).await;

    let conn = rusqlite::Connection::open(&config.output.database_path).unwrap();
    conn.execute_batch("DROP TABLE entities").unwrap();
    drop(conn);

    let result = orchestrator.run_entity_scrape().await;
    assert!(result.is_err());

    let job = lock(&storage)
        .unwrap()
        .get_latest(Some(JobType::EntitiesOnly))
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.is_some());
    assert!(job.completed_at.is_some());

    let types = recorder.types();
    assert_eq!(types, vec![EventType::ScrapeStarted, EventType::ScrapeFailed]);
}

#[tokio::test]
async fn test_scheduler_trigger_and_shutdown() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&server, DOGS, &[]).await;

    let config = create_test_config(&server.uri(), dir.path(), DOGS);
    let storage = open_test_storage(&config);
    let (orchestrator, _) = create_orchestrator(&config, &storage).await;
    let scheduler = PipelineScheduler::new(Arc::new(orchestrator), config.schedule.clone());

    let summary = scheduler.trigger(JobType::EntitiesOnly).await.unwrap();
    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.counts.discovered, 0);

    scheduler.shutdown().await.unwrap();
    assert!(!scheduler.is_running());
    assert!(scheduler.trigger(JobType::EntitiesOnly).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scheduler_start_then_shutdown() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&server, DOGS, &[]).await;

    let config = create_test_config(&server.uri(), dir.path(), DOGS);
    let storage = open_test_storage(&config);
    let (orchestrator, _) = create_orchestrator(&config, &storage).await;
    let scheduler = PipelineScheduler::new(Arc::new(orchestrator), config.schedule.clone());

    scheduler.start().await.unwrap();
    assert!(scheduler.is_running());

    scheduler.shutdown().await.unwrap();
    assert!(!scheduler.is_running());
    assert!(scheduler.start().await.is_err());

    // Whatever ran before shutdown finished cleanly.
    assert!(lock(&storage).unwrap().get_running().unwrap().is_empty());
}
