//! URL categorization
//!
//! An ordered rule table maps URL paths to a `UrlType` and priority. Ignore
//! rules sit at the top, then entity, listing, service and advice rules; the
//! first match wins and anything unmatched is `General`.

use crate::state::UrlType;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// A URL with its categorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizedUrl {
    pub url: String,
    pub url_type: UrlType,
    /// Lower is more urgent
    pub priority: u32,
    /// `"en"` or `"fr"`
    pub locale: String,
}

struct Rule {
    pattern: Regex,
    url_type: UrlType,
    priority: u32,
}

fn rule(pattern: &str, url_type: UrlType, priority: u32) -> Rule {
    let pattern = Regex::new(&format!("(?i){}", pattern)).expect("valid regex");
    Rule {
        pattern,
        url_type,
        priority,
    }
}

const IGNORED_PRIORITY: u32 = 99;
const GENERAL_PRIORITY: u32 = 5;

// Ignore rules come first so an ignored path never classifies as scrapable.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(
            r"\.(pdf|jpg|jpeg|png|gif|webp|svg|mp4|mp3|doc|docx|xls|xlsx|zip)$",
            UrlType::Ignored,
            IGNORED_PRIORITY,
        ),
        rule(r"/wp-content/", UrlType::Ignored, IGNORED_PRIORITY),
        rule(r"/wp-admin/", UrlType::Ignored, IGNORED_PRIORITY),
        rule(r"/calendar/", UrlType::Ignored, IGNORED_PRIORITY),
        rule(r"/feed/", UrlType::Ignored, IGNORED_PRIORITY),
        rule(r"/cart/", UrlType::Ignored, IGNORED_PRIORITY),
        rule(r"/checkout/", UrlType::Ignored, IGNORED_PRIORITY),
        rule(r"/my-account/", UrlType::Ignored, IGNORED_PRIORITY),
        rule(r"/(en|fr)/animal/[\w-]+-\d+/?", UrlType::Entity, 1),
        rule(r"/en/adoption/[\w-]+-for-adoption/?", UrlType::Listing, 2),
        rule(r"/fr/adoption/[\w-]+-a-adopter/?", UrlType::Listing, 2),
        rule(r"/(en|fr)/services/", UrlType::Service, 3),
        rule(r"/en/tips-and-advice/", UrlType::Advice, 4),
        rule(r"/fr/conseils/", UrlType::Advice, 4),
    ]
});

static REFERENCE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/animal/[\w-]+-(\d+)/?").expect("valid regex")
});

const LISTING_URLS_EN: &[&str] = &[
    "https://www.spca.com/en/adoption/cats-for-adoption/",
    "https://www.spca.com/en/adoption/dogs-for-adoption/",
    "https://www.spca.com/en/adoption/rabbits-for-adoption/",
    "https://www.spca.com/en/adoption/birds-for-adoption/",
    "https://www.spca.com/en/adoption/small-animals-for-adoption/",
];

const LISTING_URLS_FR: &[&str] = &[
    "https://www.spca.com/fr/adoption/chats-a-adopter/",
    "https://www.spca.com/fr/adoption/chiens-a-adopter/",
    "https://www.spca.com/fr/adoption/lapins-a-adopter/",
    "https://www.spca.com/fr/adoption/oiseaux-a-adopter/",
    "https://www.spca.com/fr/adoption/petits-animaux-a-adopter/",
];

/// Path component of a URL, without query or fragment
fn url_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

fn detect_locale(path: &str) -> &'static str {
    if path.to_ascii_lowercase().contains("/fr/") {
        "fr"
    } else {
        "en"
    }
}

/// Classifies a URL into a type, priority and locale
///
/// Pure and total: every string yields a result, the same input always
/// yields the same output. Rules are evaluated top to bottom and the first
/// match wins; unmatched URLs are `General` with priority 5.
///
/// # Examples
///
/// ```
/// use ark_harvest::url::classify;
/// use ark_harvest::UrlType;
///
/// let c = classify("https://www.spca.com/en/animal/rex-dog-12345/");
/// assert_eq!(c.url_type, UrlType::Entity);
/// assert_eq!(c.priority, 1);
/// ```
pub fn classify(url: &str) -> CategorizedUrl {
    let path = url_path(url);
    let locale = detect_locale(&path).to_string();

    for rule in RULES.iter() {
        if rule.pattern.is_match(&path) {
            return CategorizedUrl {
                url: url.to_string(),
                url_type: rule.url_type,
                priority: rule.priority,
                locale,
            };
        }
    }

    CategorizedUrl {
        url: url.to_string(),
        url_type: UrlType::General,
        priority: GENERAL_PRIORITY,
        locale,
    }
}

/// Classifies many URLs and groups them by type
///
/// Every `UrlType` is present as a key, possibly with an empty list. Each
/// list is sorted by priority with input order kept among equals.
pub fn classify_batch<I, S>(urls: I) -> BTreeMap<UrlType, Vec<CategorizedUrl>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut grouped: BTreeMap<UrlType, Vec<CategorizedUrl>> =
        UrlType::all().into_iter().map(|t| (t, Vec::new())).collect();

    for url in urls {
        let categorized = classify(url.as_ref());
        grouped
            .entry(categorized.url_type)
            .or_default()
            .push(categorized);
    }

    for list in grouped.values_mut() {
        list.sort_by_key(|c| c.priority);
    }

    grouped
}

/// Returns every non-ignored URL, sorted by priority
pub fn filter_scrapable<I, S>(urls: I) -> Vec<CategorizedUrl>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scrapable: Vec<CategorizedUrl> = classify_batch(urls)
        .into_iter()
        .filter(|(url_type, _)| *url_type != UrlType::Ignored)
        .flat_map(|(_, list)| list)
        .collect();
    scrapable.sort_by_key(|c| c.priority);
    scrapable
}

/// Extracts the trailing numeric reference from an entity URL slug
///
/// `/en/animal/rex-dog-12345/` yields `Some("12345")`.
pub fn extract_reference_number(url: &str) -> Option<String> {
    REFERENCE_NUMBER
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn is_entity_page(url: &str) -> bool {
    classify(url).url_type == UrlType::Entity
}

pub fn is_ignorable(url: &str) -> bool {
    classify(url).url_type == UrlType::Ignored
}

/// Built-in listing entry points for a locale; unknown locales get English
pub fn listing_urls(locale: &str) -> &'static [&'static str] {
    match locale {
        "fr" => LISTING_URLS_FR,
        _ => LISTING_URLS_EN,
    }
}
