//! Sitemap discovery
//!
//! Expands a sitemap index into page URLs. Child sitemaps listed under
//! `<sitemapindex>/<sitemap>/<loc>` are fetched recursively up to a fixed
//! nesting depth; page URLs come from `<urlset>/<url>/<loc>`.

use crate::crawler::executor::{ParseError, ScrapeExecutor};
use crate::state::UrlType;
use crate::url::{classify_batch, filter_scrapable, CategorizedUrl};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Deepest sitemap nesting followed below the index
pub const MAX_SITEMAP_DEPTH: usize = 5;

/// Locations found in one sitemap document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    /// Child sitemaps (from a sitemap index)
    pub sitemaps: Vec<String>,
    /// Page URLs (from a urlset)
    pub pages: Vec<String>,
}

/// Parses a sitemap or sitemap index
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut document = SitemapDocument::default();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let location = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                path.push(e.local_name().as_ref().to_vec());
                None
            }
            Ok(Event::End(_)) => {
                path.pop();
                None
            }
            Ok(Event::Text(text)) => Some(
                text.unescape()
                    .map_err(|e| ParseError::Invalid(e.to_string()))?
                    .into_owned(),
            ),
            Ok(Event::CData(data)) => Some(String::from_utf8_lossy(&data.into_inner()).into_owned()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Invalid(e.to_string())),
            _ => None,
        };

        if let Some(location) = location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) {
            if let [.., parent, leaf] = path.as_slice() {
                if leaf.as_slice() == b"loc" {
                    match parent.as_slice() {
                        b"sitemap" => document.sitemaps.push(location),
                        b"url" => document.pages.push(location),
                        _ => {}
                    }
                }
            }
        }

        buf.clear();
    }

    Ok(document)
}

/// Discovers and categorizes site URLs from the sitemap
pub struct SitemapDiscoverer {
    executor: Arc<ScrapeExecutor>,
    sitemap_url: String,
}

impl SitemapDiscoverer {
    pub fn new(executor: Arc<ScrapeExecutor>, sitemap_url: impl Into<String>) -> Self {
        Self {
            executor,
            sitemap_url: sitemap_url.into(),
        }
    }

    pub fn sitemap_url(&self) -> &str {
        &self.sitemap_url
    }

    /// Returns every page URL, de-duplicated in first-seen order
    ///
    /// Any fetch or parse failure is logged and yields an empty list.
    pub async fn discover_urls(&self) -> Vec<String> {
        info!(sitemap = %self.sitemap_url, "Discovering URLs from sitemap");

        match self.expand().await {
            Ok(urls) => {
                info!(count = urls.len(), "Discovered URLs from sitemap");
                urls
            }
            Err(e) => {
                error!(sitemap = %self.sitemap_url, error = %e, "Sitemap discovery failed");
                Vec::new()
            }
        }
    }

    async fn expand(&self) -> Result<Vec<String>, String> {
        let mut queue = VecDeque::from([(self.sitemap_url.clone(), 0usize)]);
        let mut visited_sitemaps = HashSet::new();
        let mut seen_pages = HashSet::new();
        let mut pages = Vec::new();

        while let Some((sitemap, depth)) = queue.pop_front() {
            if !visited_sitemaps.insert(sitemap.clone()) {
                continue;
            }
            if depth > MAX_SITEMAP_DEPTH {
                debug!(sitemap = %sitemap, depth, "Sitemap nesting too deep, skipping");
                continue;
            }

            let document = self
                .executor
                .scrape_with(&sitemap, |_, body| parse_sitemap(body))
                .await
                .into_result()
                .map_err(|e| format!("{}: {}", sitemap, e))?;

            debug!(
                sitemap = %sitemap,
                children = document.sitemaps.len(),
                pages = document.pages.len(),
                "Parsed sitemap"
            );

            queue.extend(document.sitemaps.into_iter().map(|child| (child, depth + 1)));
            for page in document.pages {
                if seen_pages.insert(page.clone()) {
                    pages.push(page);
                }
            }
        }

        Ok(pages)
    }

    /// Discovers URLs and groups them by type, each group sorted by priority
    pub async fn discover_and_categorize(&self) -> BTreeMap<UrlType, Vec<CategorizedUrl>> {
        let categorized = classify_batch(self.discover_urls().await);

        for (url_type, urls) in &categorized {
            info!(url_type = %url_type, count = urls.len(), "Categorized URLs");
        }

        categorized
    }

    /// Every non-ignored URL, sorted by priority
    pub async fn scrapable_urls(&self) -> Vec<CategorizedUrl> {
        filter_scrapable(self.discover_urls().await)
    }

    /// Entity detail page URLs
    pub async fn entity_urls(&self) -> Vec<String> {
        let mut categorized = self.discover_and_categorize().await;
        categorized
            .remove(&UrlType::Entity)
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.url)
            .collect()
    }

    /// General, service and advice URLs
    pub async fn content_urls(&self) -> Vec<String> {
        content_urls(&self.discover_and_categorize().await)
    }
}

/// Flattens the content groups of a categorization
pub fn content_urls(categorized: &BTreeMap<UrlType, Vec<CategorizedUrl>>) -> Vec<String> {
    categorized
        .iter()
        .filter(|(url_type, _)| url_type.is_content())
        .flat_map(|(_, urls)| urls.iter().map(|c| c.url.clone()))
        .collect()
}
