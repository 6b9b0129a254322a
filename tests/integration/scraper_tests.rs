//! Integration tests for the scraping layer
//!
//! These tests use wiremock to serve listing, detail, content and sitemap
//! pages and drive the scrapers over real HTTP.

use ark_harvest::config::ScraperConfig;
use ark_harvest::crawler::{
    ContentScraper, EntityScraper, HttpFetcher, RateLimiter, RetryPolicy, ScrapeExecutor,
    SitemapDiscoverer,
};
use ark_harvest::UrlType;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates an executor with a generous rate limit and millisecond backoff
fn test_executor(max_attempts: u32) -> Arc<ScrapeExecutor> {
    let fetcher = Arc::new(
        HttpFetcher::from_config(&ScraperConfig::default()).expect("Failed to build HTTP client"),
    );
    let policy = RetryPolicy {
        max_attempts,
        timeout: Duration::from_secs(5),
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(5),
    };
    Arc::new(ScrapeExecutor::new(
        fetcher,
        Arc::new(RateLimiter::new(1000.0, 100).unwrap()),
        policy,
    ))
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
                     <div class="pet--infos">Dog ● Adult ● Female ● M</div>
                   </div>"#
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", cards)
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

#[tokio::test]
async fn test_pagination_stops_at_first_empty_page() {
    let server = MockServer::start().await;
    let listing = format!("{}/en/adoption/dogs-for-adoption", server.uri());

    Mock::given(method("GET"))
        .and(path("/en/adoption/dogs-for-adoption/"))
        .respond_with(html(listing_page(&["rex-dog-101", "fido-dog-102"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/adoption/dogs-for-adoption/page/2/"))
        .respond_with(html(listing_page(&["max-dog-103"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/adoption/dogs-for-adoption/page/3/"))
        .respond_with(html(listing_page(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let scraper = EntityScraper::new(test_executor(1), &server.uri()).unwrap();
    let items = scraper.scrape_listing_with_pagination(&listing, 10).await;

    let urls: Vec<&str> = items.iter().map(|item| item.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/en/animal/rex-dog-101/", server.uri()),
            format!("{}/en/animal/fido-dog-102/", server.uri()),
            format!("{}/en/animal/max-dog-103/", server.uri()),
        ]
    );
    assert_eq!(items[0].species.as_deref(), Some("Dog"));
    assert_eq!(items[0].sex.as_deref(), Some("Female"));

    // Two non-empty pages cost exactly three requests.
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    server.verify().await;
}

#[tokio::test]
async fn test_pagination_respects_max_pages() {
    let server = MockServer::start().await;
    let listing = format!("{}/en/adoption/cats-for-adoption/", server.uri());

    Mock::given(method("GET"))
        .and(path("/en/adoption/cats-for-adoption/"))
        .respond_with(html(listing_page(&["mimi-cat-201"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/adoption/cats-for-adoption/page/2/"))
        .respond_with(html(listing_page(&["tom-cat-202"])))
        .mount(&server)
        .await;

    let scraper = EntityScraper::new(test_executor(1), &server.uri()).unwrap();
    let items = scraper.scrape_listing_with_pagination(&listing, 1).await;

    assert_eq!(items.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_listing_page_ends_pagination() {
    let server = MockServer::start().await;
    let listing = format!("{}/en/adoption/birds-for-adoption", server.uri());

    Mock::given(method("GET"))
        .and(path("/en/adoption/birds-for-adoption/"))
        .respond_with(html(listing_page(&["kiwi-bird-301"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/adoption/birds-for-adoption/page/2/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let scraper = EntityScraper::new(test_executor(3), &server.uri()).unwrap();
    let items = scraper.scrape_listing_with_pagination(&listing, 10).await;

    assert_eq!(items.len(), 1);
    // A 404 is terminal: one request, no retries, no page 3.
    assert_eq!(
        count_requests(&server, "/en/adoption/birds-for-adoption/page/2/").await,
        1
    );
    assert_eq!(
        count_requests(&server, "/en/adoption/birds-for-adoption/page/3/").await,
        0
    );
}

#[tokio::test]
async fn test_scrape_detail_page() {
    let server = MockServer::start().await;
    let url = format!("{}/en/animal/luna-dog-4242/", server.uri());

    Mock::given(method("GET"))
        .and(path("/en/animal/luna-dog-4242/"))
        .respond_with(html(
            r#"<html><body>
                 <div class="single-pet">
                   <h2>Luna</h2>
                   <h5>Description</h5>
                   <p>Calm and gentle.</p>
                   <table>
                     <tr><td>Reference number</td><td>4242</td></tr>
                     <tr><td>Breed</td><td>Beagle</td></tr>
                   </table>
                 </div>
               </body></html>"#
                .to_string(),
        ))
        .mount(&server)
        .await;

    let scraper = EntityScraper::new(test_executor(3), &server.uri()).unwrap();
    let result = scraper.scrape_detail_page(&url).await;

    assert!(result.success);
    assert_eq!(result.attempts, 1);
    let record = result.payload.unwrap();
    assert_eq!(record.reference_number, "4242");
    assert_eq!(record.name, "Luna");
    assert_eq!(record.breed.as_deref(), Some("Beagle"));
    assert_eq!(record.description.as_deref(), Some("Calm and gentle."));
    assert_eq!(record.source_url, url);
}

#[tokio::test]
async fn test_detail_page_without_profile_is_not_retried() {
    let server = MockServer::start().await;
    let url = format!("{}/en/animal/ghost-cat-777/", server.uri());

    Mock::given(method("GET"))
        .and(path("/en/animal/ghost-cat-777/"))
        .respond_with(html("<html><body><p>Adopted!</p></body></html>".to_string()))
        .mount(&server)
        .await;

    let scraper = EntityScraper::new(test_executor(3), &server.uri()).unwrap();
    let result = scraper.scrape_detail_page(&url).await;

    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert!(result.error.unwrap().contains("div.single-pet"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    let url = format!("{}/en/about-us/", server.uri());

    Mock::given(method("GET"))
        .and(path("/en/about-us/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/about-us/"))
        .respond_with(html("<html><body>ok</body></html>".to_string()))
        .mount(&server)
        .await;

    let result = test_executor(3).scrape(&url).await;

    assert!(result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    let url = format!("{}/en/missing/", server.uri());

    Mock::given(method("GET"))
        .and(path("/en/missing/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = test_executor(3).scrape(&url).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("HTTP 404"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_content_scrape_and_save() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/en/services/clinic/", server.uri());

    Mock::given(method("GET"))
        .and(path("/en/services/clinic/"))
        .respond_with(html(
            r#"<html><head><title>Veterinary Clinic</title></head><body>
                 <nav><a href="/">Home</a></nav>
                 <h1>Our Clinic</h1>
                 <p>Affordable care for every animal.</p>
                 <script>trackVisit();</script>
               </body></html>"#
                .to_string(),
        ))
        .mount(&server)
        .await;

    let scraper = ContentScraper::new(test_executor(3), dir.path().join("content")).unwrap();
    let result = scraper.scrape_and_save(&url).await;

    assert!(result.success);
    let saved = result.payload.unwrap();
    assert_eq!(saved.file_path, dir.path().join("content").join("en_services_clinic.txt"));
    assert_eq!(saved.title.as_deref(), Some("Veterinary Clinic"));
    assert_eq!(saved.content_hash.len(), 64);

    let artifact = std::fs::read_to_string(&saved.file_path).unwrap();
    assert!(artifact.starts_with(&format!(
        "# Veterinary Clinic\n\nSource: {}\n\n---\n\n",
        url
    )));
    assert!(artifact.contains("Affordable care for every animal."));
    assert!(!artifact.contains("trackVisit"));

    assert_eq!(scraper.saved_files().unwrap(), vec![saved.file_path]);
}

#[tokio::test]
async fn test_content_batch_isolates_failures() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/en/about-us/"))
        .respond_with(html(
            "<html><head><title>About</title></head><body><p>Hello</p></body></html>".to_string(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/gone/"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let urls = vec![
        format!("{}/en/about-us/", server.uri()),
        format!("{}/en/gone/", server.uri()),
    ];
    let scraper = ContentScraper::new(test_executor(2), dir.path()).unwrap();
    let results = scraper.scrape_batch_and_save(&urls, 2).await;

    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(results[1].url, urls[1]);
    assert_eq!(scraper.saved_files().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sitemap_index_expansion() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
               <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                 <sitemap><loc>{base}/page-sitemap.xml</loc></sitemap>
                 <sitemap><loc>{base}/animal-sitemap.xml</loc></sitemap>
               </sitemapindex>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-sitemap.xml"))
        .respond_with(xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
               <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                 <url><loc>{base}/en/about-us/</loc></url>
                 <url><loc>{base}/en/services/clinic/</loc></url>
                 <url><loc>{base}/en/tips-and-advice/summer-heat/</loc></url>
                 <url><loc>{base}/wp-content/uploads/report.pdf</loc></url>
               </urlset>"#
        )))
        .mount(&server)
        .await;
    // Links back to the index and repeats a page; both are dropped.
    Mock::given(method("GET"))
        .and(path("/animal-sitemap.xml"))
        .respond_with(xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
               <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                 <sitemap><loc>{base}/sitemap_index.xml</loc></sitemap>
                 <sitemap><loc>{base}/animal-sitemap-2.xml</loc></sitemap>
               </sitemapindex>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/animal-sitemap-2.xml"))
        .respond_with(xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
               <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                 <url><loc>{base}/en/animal/rex-dog-101/</loc></url>
                 <url><loc>{base}/en/about-us/</loc></url>
               </urlset>"#
        )))
        .mount(&server)
        .await;

    let discoverer = SitemapDiscoverer::new(test_executor(1), format!("{}/sitemap_index.xml", base));
    let urls = discoverer.discover_urls().await;

    assert_eq!(
        urls,
        vec![
            format!("{}/en/about-us/", base),
            format!("{}/en/services/clinic/", base),
            format!("{}/en/tips-and-advice/summer-heat/", base),
            format!("{}/wp-content/uploads/report.pdf", base),
            format!("{}/en/animal/rex-dog-101/", base),
        ]
    );
    assert_eq!(count_requests(&server, "/sitemap_index.xml").await, 1);

    let categorized = discoverer.discover_and_categorize().await;
    assert_eq!(categorized[&UrlType::Entity].len(), 1);
    assert_eq!(categorized[&UrlType::General].len(), 1);
    assert_eq!(categorized[&UrlType::Service].len(), 1);
    assert_eq!(categorized[&UrlType::Advice].len(), 1);
    assert_eq!(categorized[&UrlType::Ignored].len(), 1);

    let scrapable = discoverer.scrapable_urls().await;
    let priorities: Vec<u32> = scrapable.iter().map(|c| c.priority).collect();
    assert_eq!(priorities, vec![1, 3, 4, 5]);
    assert!(scrapable.iter().all(|c| !c.url.ends_with(".pdf")));

    assert_eq!(discoverer.content_urls().await.len(), 3);
    assert_eq!(
        discoverer.entity_urls().await,
        vec![format!("{}/en/animal/rex-dog-101/", base)]
    );
}

#[tokio::test]
async fn test_sitemap_failure_yields_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let discoverer = SitemapDiscoverer::new(
        test_executor(2),
        format!("{}/sitemap_index.xml", server.uri()),
    );

    assert!(discoverer.discover_urls().await.is_empty());
    // 500 is transient, so every attempt is spent.
    assert_eq!(count_requests(&server, "/sitemap_index.xml").await, 2);
}
