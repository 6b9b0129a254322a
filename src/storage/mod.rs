//! Storage module for persisting harvest data
//!
//! This module handles all database operations for the pipeline, including:
//! - SQLite database initialization and schema management
//! - Scrape job lifecycle records
//! - Per-URL scrape tracking with retry counts
//! - Entity records keyed by reference number, with removal tracking
//!
//! The pipeline only sees the repository traits; `SqliteStorage` is the
//! shipped implementation.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{
    EntityRepository, JobRepository, Storage, StorageError, StorageResult, UrlRepository,
};

use crate::state::{EntityStatus, JobStatus, JobType, ScrapeStatus, UrlType};
use crate::HarvestError;

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Store handle shared by the orchestrator, scheduler and admin operations
///
/// The guard is only ever held for one repository call and never across an
/// `.await`.
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Opens (or creates) the database and wraps it for sharing
pub fn open_storage(path: &Path) -> Result<SharedStorage, HarvestError> {
    let storage = SqliteStorage::new(path)?;
    Ok(Arc::new(Mutex::new(storage)))
}

/// Locks the shared store, mapping poisoning to an error
pub fn lock(storage: &SharedStorage) -> Result<MutexGuard<'_, dyn Storage + Send + 'static>, HarvestError> {
    storage.lock().map_err(|_| HarvestError::LockPoisoned)
}

/// Runs one repository call under the lock
///
/// The guard is released before this returns, so callers in async code can
/// use it freely between awaits.
pub fn with_storage<T>(
    storage: &SharedStorage,
    f: impl FnOnce(&mut (dyn Storage + Send + 'static)) -> StorageResult<T>,
) -> Result<T, HarvestError> {
    let mut guard = lock(storage)?;
    Ok(f(&mut *guard)?)
}

/// Per-job URL counters
///
/// `discovered == scraped + failed` holds for every completed job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub discovered: u64,
    pub scraped: u64,
    pub failed: u64,
}

impl JobCounts {
    pub fn is_reconciled(&self) -> bool {
        self.discovered == self.scraped + self.failed
    }
}

impl std::ops::Add for JobCounts {
    type Output = JobCounts;

    fn add(self, other: JobCounts) -> JobCounts {
        JobCounts {
            discovered: self.discovered + other.discovered,
            scraped: self.scraped + other.scraped,
            failed: self.failed + other.failed,
        }
    }
}

/// Represents a scrape job in the database
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub counts: JobCounts,
    pub error_message: Option<String>,
}

/// Represents a tracked URL in the database
#[derive(Debug, Clone)]
pub struct TrackedUrl {
    pub id: i64,
    pub url: String,
    pub url_type: UrlType,
    pub scrape_status: ScrapeStatus,
    pub retry_count: u32,
    pub content_hash: Option<String>,
    pub file_path: Option<String>,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub job_id: Option<i64>,
}

/// Structured fields parsed from an entity detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecord {
    pub reference_number: String,
    pub name: String,
    pub species: Option<String>,
    pub age: Option<String>,
    pub age_category: Option<String>,
    pub sex: Option<String>,
    pub breed: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub weight: Option<String>,
    pub declawed: bool,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
    pub source_url: String,
    pub thumbnail_url: Option<String>,
    pub content_hash: String,
}

/// Represents a persisted entity
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: i64,
    pub record: EntityRecord,
    pub status: EntityStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_scraped_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    /// Consecutive runs in which the entity was not listed
    pub missed_runs: u32,
}

/// What an entity upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting of this reference number
    Created,
    /// Existing entity whose content hash changed (or that was re-listed)
    Changed,
    /// Existing entity with identical content
    Unchanged,
}
