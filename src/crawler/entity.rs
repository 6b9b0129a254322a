//! Entity scraping: listing pages, pagination and detail pages
//!
//! Listing pages are paginated indexes of adoptable animals rendered as
//! cards. Each card links to a detail page whose `div.single-pet` container
//! carries the structured profile (name, description, a field table and an
//! image gallery).

use crate::crawler::executor::{ParseError, ScrapeExecutor, ScrapeResult};
use crate::state::EntityStatus;
use crate::storage::EntityRecord;
use crate::url::extract_reference_number;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static CARD: LazyLock<Selector> = LazyLock::new(|| selector("div.single--card.pet--card"));
static CARD_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.card--link"));
static CARD_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h5.card--title"));
static CARD_INFO: LazyLock<Selector> = LazyLock::new(|| selector("div.pet--infos"));
static CARD_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("div.card--image img"));

static PET_CONTAINER: LazyLock<Selector> = LazyLock::new(|| selector("div.single-pet"));
static PET_NAME: LazyLock<Selector> = LazyLock::new(|| selector("h2"));
static PET_HEADING: LazyLock<Selector> = LazyLock::new(|| selector("h5"));
static PET_TABLE_ROW: LazyLock<Selector> = LazyLock::new(|| selector("table tr"));
static PET_CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static PET_IMAGES: LazyLock<Selector> = LazyLock::new(|| selector("div.pet--images"));
static PET_MAIN_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img.rollover-parent"));
static PET_THUMBNAILS: LazyLock<Selector> = LazyLock::new(|| selector("div.pet--thumbnail img"));

/// Separator used in the card summary line ("Dog ● Young ● Male ● L")
const INFO_SEPARATOR: char = '●';

/// One card from a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingItem {
    /// Absolute URL of the detail page
    pub url: String,
    pub name: String,
    pub species: Option<String>,
    pub age_category: Option<String>,
    pub sex: Option<String>,
    pub size: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl ListingItem {
    /// Fills fields the detail page left empty with what the card showed
    pub fn enrich(&self, record: &mut EntityRecord) {
        if record.age_category.is_none() {
            record.age_category = self.age_category.clone();
        }
        if record.thumbnail_url.is_none() {
            record.thumbnail_url = self.thumbnail_url.clone();
        }
        if record.species.is_none() {
            record.species = self.species.clone();
        }
        if record.sex.is_none() {
            record.sex = self.sex.clone();
        }
        if record.size.is_none() {
            record.size = self.size.clone();
        }
    }
}

/// Scraper for listing and detail pages
pub struct EntityScraper {
    executor: Arc<ScrapeExecutor>,
    base_url: Url,
}

impl EntityScraper {
    /// Creates a scraper resolving card links against `base_url`
    pub fn new(executor: Arc<ScrapeExecutor>, base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            executor,
            base_url: Url::parse(base_url)?,
        })
    }

    /// Scrapes one listing page
    ///
    /// A page that cannot be fetched is reported as empty, which ends
    /// pagination.
    pub async fn scrape_listing_page(&self, url: &str) -> Vec<ListingItem> {
        let base = &self.base_url;
        let result = self
            .executor
            .scrape_with(url, |_, body| Ok(parse_listing_page(body, base)))
            .await;

        match result.into_result() {
            Ok(items) => {
                debug!(url = %url, count = items.len(), "Parsed listing page");
                items
            }
            Err(error) => {
                warn!(url = %url, error = %error, "Listing page failed");
                Vec::new()
            }
        }
    }

    /// Walks a paginated listing until an empty page or `max_pages`
    ///
    /// Page 1 is `{base}/`, page N is `{base}/page/N/`. For k non-empty
    /// pages below the cap this makes exactly k+1 requests.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Listing root, with or without a trailing slash
    /// * `max_pages` - Safety cap on the number of pages requested
    pub async fn scrape_listing_with_pagination(
        &self,
        base_url: &str,
        max_pages: u32,
    ) -> Vec<ListingItem> {
        let base = base_url.trim_end_matches('/');
        let mut items = Vec::new();
        let mut pages = 0;

        for page in 1..=max_pages {
            let page_url = page_url(base, page);
            let found = self.scrape_listing_page(&page_url).await;

            if found.is_empty() {
                debug!(url = %page_url, "Empty listing page, stopping pagination");
                break;
            }

            pages = page;
            items.extend(found);
        }

        info!(
            listing = %base,
            pages,
            items = items.len(),
            "Listing pagination complete"
        );
        items
    }

    /// Scrapes and parses a detail page
    ///
    /// A page without the profile container fails without retrying.
    pub async fn scrape_detail_page(&self, url: &str) -> ScrapeResult<EntityRecord> {
        self.executor
            .scrape_with(url, |_, body| parse_detail_page(body, url))
            .await
    }
}

fn page_url(base: &str, page: u32) -> String {
    if page <= 1 {
        format!("{}/", base)
    } else {
        format!("{}/page/{}/", base, page)
    }
}

/// Collapses runs of whitespace and trims
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Extracts every card from a listing page
pub fn parse_listing_page(html: &str, base_url: &Url) -> Vec<ListingItem> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for card in document.select(&CARD) {
        let Some(href) = card
            .select(&CARD_LINK)
            .next()
            .and_then(|link| link.value().attr("href"))
            .and_then(non_empty)
        else {
            continue;
        };

        let url = match base_url.join(&href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!(href = %href, error = %e, "Skipping card with bad link");
                continue;
            }
        };

        let mut item = ListingItem {
            url,
            name: card.select(&CARD_TITLE).next().map(element_text).unwrap_or_default(),
            thumbnail_url: card
                .select(&CARD_IMAGE)
                .next()
                .and_then(|img| img.value().attr("src"))
                .and_then(non_empty),
            ..Default::default()
        };

        if let Some(info) = card.select(&CARD_INFO).next() {
            let text = element_text(info);
            let mut parts = text.split(INFO_SEPARATOR).map(str::trim);
            item.species = parts.next().and_then(non_empty);
            item.age_category = parts.next().and_then(non_empty);
            item.sex = parts.next().and_then(non_empty);
            item.size = parts.next().and_then(non_empty);
        }

        items.push(item);
    }

    items
}

/// Parses a detail page into an entity record
///
/// # Returns
///
/// * `Ok(EntityRecord)` - Parsed record with its content hash
/// * `Err(ParseError::MissingElement)` - No profile container, or no
///   reference number in either the field table or the URL
pub fn parse_detail_page(html: &str, url: &str) -> Result<EntityRecord, ParseError> {
    let document = Html::parse_document(html);
    let container = document
        .select(&PET_CONTAINER)
        .next()
        .ok_or_else(|| ParseError::MissingElement("div.single-pet".to_string()))?;

    let mut record = EntityRecord {
        source_url: url.to_string(),
        name: container.select(&PET_NAME).next().map(element_text).unwrap_or_default(),
        description: extract_description(container),
        ..Default::default()
    };

    let mut reference_number = None;
    for row in container.select(&PET_TABLE_ROW) {
        let cells: Vec<String> = row.select(&PET_CELL).map(element_text).collect();
        let [label, value, ..] = cells.as_slice() else {
            continue;
        };

        let value = non_empty(value);
        match label.to_lowercase().as_str() {
            "reference number" => reference_number = value,
            "species" => record.species = value,
            "age" => record.age = value,
            "sex" => record.sex = value,
            "breed" => record.breed = value,
            "size" => record.size = value,
            "color" => record.color = value,
            "weight" => record.weight = value,
            "declawed" => {
                record.declawed = value.is_some_and(|v| v.eq_ignore_ascii_case("yes"))
            }
            _ => {}
        }
    }

    record.reference_number = reference_number
        .or_else(|| extract_reference_number(url))
        .ok_or_else(|| ParseError::MissingElement("reference number".to_string()))?;

    record.image_urls = extract_images(container);
    record.content_hash = entity_content_hash(
        &record.name,
        record.description.as_deref().unwrap_or_default(),
        EntityStatus::Available,
    );

    Ok(record)
}

/// Text of the paragraph following the "Description" heading
fn extract_description(container: ElementRef<'_>) -> Option<String> {
    let heading = container
        .select(&PET_HEADING)
        .find(|h| element_text(*h).to_lowercase().contains("description"))?;

    heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "p")
        .map(element_text)
        .and_then(|text| non_empty(&text))
}

/// Main image first, then thumbnails without duplicates
fn extract_images(container: ElementRef<'_>) -> Vec<String> {
    let Some(gallery) = container.select(&PET_IMAGES).next() else {
        return Vec::new();
    };

    let mut images: Vec<String> = Vec::new();
    let main = gallery.select(&PET_MAIN_IMAGE).take(1);
    for img in main.chain(gallery.select(&PET_THUMBNAILS)) {
        if let Some(src) = img.value().attr("src").and_then(non_empty) {
            if !images.contains(&src) {
                images.push(src);
            }
        }
    }
    images
}

/// SHA-256 hex over name, description and status
pub fn entity_content_hash(name: &str, description: &str, status: EntityStatus) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(status.to_db_string().as_bytes());
    hex::encode(hasher.finalize())
}
