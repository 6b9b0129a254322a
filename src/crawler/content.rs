//! Content scraping into markdown artifacts
//!
//! General, service and advice pages are fetched (plain HTTP or a headless
//! renderer, whichever fetcher backs the executor), converted to markdown
//! and written as one `{slug}.txt` file per URL:
//!
//! ```text
//! # {title or "Untitled"}
//!
//! Source: {url}
//!
//! ---
//!
//! {markdown body}
//! ```

use crate::crawler::executor::{ParseError, ScrapeExecutor, ScrapeResult};
use futures::future::join_all;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

/// Tags dropped before markdown conversion
const SKIPPED_TAGS: [&str; 6] = ["script", "style", "nav", "iframe", "noscript", "svg"];

/// Longest slug kept in an artifact file name
const MAX_SLUG_LEN: usize = 100;

/// Title and markdown extracted from one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: Option<String>,
    pub markdown: String,
}

/// A saved artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedContent {
    pub file_path: PathBuf,
    /// SHA-256 hex of the full artifact text
    pub content_hash: String,
    pub title: Option<String>,
}

/// Scraper writing content pages to a directory
pub struct ContentScraper {
    executor: Arc<ScrapeExecutor>,
    directory: PathBuf,
}

impl ContentScraper {
    /// Creates the scraper, creating the content directory if needed
    pub fn new(executor: Arc<ScrapeExecutor>, directory: impl Into<PathBuf>) -> std::io::Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            executor,
            directory,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Fetches a page, converts it and writes the artifact
    ///
    /// A page with no markdown body fails without retrying.
    pub async fn scrape_and_save(&self, url: &str) -> ScrapeResult<SavedContent> {
        let result = self
            .executor
            .scrape_with(url, |_, body| extract_content(body))
            .await;
        let attempts = result.attempts;

        let content = match result.into_result() {
            Ok(content) => content,
            Err(error) => return ScrapeResult::failed(url, error, attempts),
        };

        let artifact = render_artifact(url, content.title.as_deref(), &content.markdown);
        let file_path = self.directory.join(format!("{}.txt", slugify(url)));

        if let Err(e) = tokio::fs::write(&file_path, &artifact).await {
            warn!(url = %url, path = %file_path.display(), error = %e, "Failed to write artifact");
            return ScrapeResult::failed(url, format!("Failed to write artifact: {}", e), attempts);
        }

        info!(url = %url, path = %file_path.display(), "Saved content");
        ScrapeResult::succeeded(
            url,
            SavedContent {
                file_path,
                content_hash: sha256_hex(&artifact),
                title: content.title,
            },
            attempts,
        )
    }

    /// Saves many pages with at most `max_concurrent` in flight
    ///
    /// Returns one result per input URL, in input order.
    pub async fn scrape_batch_and_save(
        &self,
        urls: &[String],
        max_concurrent: usize,
    ) -> Vec<ScrapeResult<SavedContent>> {
        let semaphore = Semaphore::new(max_concurrent.max(1));

        let tasks = urls.iter().map(|url| {
            let semaphore = &semaphore;
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return ScrapeResult::failed(url, e.to_string(), 0),
                };
                self.scrape_and_save(url).await
            }
        });

        join_all(tasks).await
    }

    /// Lists saved artifacts, sorted by path
    pub fn saved_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Extracts the title and markdown body of a page
///
/// # Returns
///
/// * `Ok(PageContent)` - Page with a non-empty body
/// * `Err(ParseError::EmptyContent)` - Nothing left after conversion
pub fn extract_content(html: &str) -> Result<PageContent, ParseError> {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty());

    let body_html = document
        .select(&BODY)
        .next()
        .map(|body| body.inner_html())
        .unwrap_or_else(|| html.to_string());

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();
    let markdown = converter
        .convert(&body_html)
        .map_err(|e| ParseError::Invalid(format!("markdown conversion failed: {}", e)))?;

    let markdown = markdown.trim().to_string();
    if markdown.is_empty() {
        debug!("Page converted to empty markdown");
        return Err(ParseError::EmptyContent);
    }

    Ok(PageContent { title, markdown })
}

/// Builds the artifact text for a page
pub fn render_artifact(url: &str, title: Option<&str>, markdown: &str) -> String {
    format!(
        "# {}\n\nSource: {}\n\n---\n\n{}",
        title.filter(|t| !t.is_empty()).unwrap_or("Untitled"),
        url,
        markdown
    )
}

/// Derives the artifact file stem from a URL path
///
/// The path is trimmed of `/` (`index` for the root), `/` becomes `_`,
/// anything other than alphanumerics, `_` and `-` is dropped and the result
/// is capped at 100 characters.
pub fn slugify(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    let trimmed = path.trim_matches('/');
    let trimmed = if trimmed.is_empty() { "index" } else { trimmed };

    trimmed
        .replace('/', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_SLUG_LEN)
        .collect()
}

fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
