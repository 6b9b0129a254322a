//! Ark-Harvest: a recurring harvesting pipeline for an animal-shelter website
//!
//! This crate discovers URLs from the site's sitemap, classifies them, scrapes
//! adoptable-animal profiles and general content pages under rate and
//! concurrency limits, persists results with change detection, retries
//! failures in bounded phases, and emits lifecycle events for a downstream
//! sync stage.

pub mod config;
pub mod crawler;
pub mod events;
pub mod output;
pub mod pipeline;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Ark-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),
}

/// Result type alias for Ark-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use events::{Event, EventBus, EventType};
pub use pipeline::{Orchestrator, PipelineScheduler};
pub use state::{JobStatus, JobType, ScrapeStatus, UrlType};
pub use url::{classify, CategorizedUrl};
