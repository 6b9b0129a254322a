//! Pipeline lifecycle events
//!
//! The orchestrator emits an [`Event`] at each lifecycle point (job started,
//! entity discovered, content saved, ...). Downstream consumers such as the
//! document sync stage subscribe through an [`EventBus`] passed to them
//! explicitly.

mod bus;

pub use bus::{EventBus, EventHandler, LoggingHandler};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Kinds of pipeline events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    ScrapeStarted,
    ScrapeCompleted,
    ScrapeFailed,
    EntityDiscovered,
    EntityUpdated,
    EntityRemoved,
    ContentSaved,
    SyncRequired,
    SyncStarted,
    SyncCompleted,
    SyncFailed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScrapeStarted => "scrape_started",
            Self::ScrapeCompleted => "scrape_completed",
            Self::ScrapeFailed => "scrape_failed",
            Self::EntityDiscovered => "entity_discovered",
            Self::EntityUpdated => "entity_updated",
            Self::EntityRemoved => "entity_removed",
            Self::ContentSaved => "content_saved",
            Self::SyncRequired => "sync_required",
            Self::SyncStarted => "sync_started",
            Self::SyncCompleted => "sync_completed",
            Self::SyncFailed => "sync_failed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event with a string payload
///
/// Payload keys used by the pipeline: `job_id`, `job_type`, `url`,
/// `reference`, `file_path`, `error`, and the count keys `discovered`,
/// `scraped`, `failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: EventType,
    pub payload: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            payload: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Adds a payload entry
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.payload.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({}, {:?})", self.event_type, self.payload)
    }
}
