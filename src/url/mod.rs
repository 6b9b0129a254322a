//! URL handling module for Ark-Harvest
//!
//! This module classifies site URLs into scrape categories (entity pages,
//! listings, services, advice, general content, ignored) and exposes the
//! built-in listing entry points.

mod categorizer;

// Re-export main functions
pub use categorizer::{
    classify, classify_batch, extract_reference_number, filter_scrapable, is_entity_page,
    is_ignorable, listing_urls, CategorizedUrl,
};
