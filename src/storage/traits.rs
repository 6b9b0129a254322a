//! Storage traits and error types
//!
//! The three repository traits are the only persistence surface the pipeline
//! sees. Every call is its own transaction.

use crate::state::{EntityStatus, JobStatus, JobType, ScrapeStatus, UrlType};
use crate::storage::{Entity, EntityRecord, JobCounts, ScrapeJob, TrackedUrl, UpsertOutcome};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Invalid job transition for job {job_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        job_id: i64,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Scrape job lifecycle persistence
pub trait JobRepository {
    /// Creates a job record with status RUNNING
    fn start_job(&mut self, job_type: JobType) -> StorageResult<ScrapeJob>;

    /// Moves a RUNNING job to COMPLETED with its final counts
    fn complete_job(&mut self, job_id: i64, counts: JobCounts) -> StorageResult<()>;

    /// Moves a RUNNING job to FAILED with an error message
    fn fail_job(&mut self, job_id: i64, error_message: &str) -> StorageResult<()>;

    fn get_job(&self, job_id: i64) -> StorageResult<Option<ScrapeJob>>;

    /// Gets the most recently started job, optionally of one type
    fn get_latest(&self, job_type: Option<JobType>) -> StorageResult<Option<ScrapeJob>>;

    fn get_running(&self) -> StorageResult<Vec<ScrapeJob>>;

    /// Closes a RUNNING job left behind by a crashed process
    ///
    /// # Arguments
    ///
    /// * `job_id` - The stale job
    /// * `status` - COMPLETED or FAILED
    /// * `completed_at` - Synthetic completion timestamp
    /// * `counts` - Counts reconstructed from tracked URLs
    /// * `error_message` - Reason recorded on the job
    fn close_stale_job(
        &mut self,
        job_id: i64,
        status: JobStatus,
        completed_at: DateTime<Utc>,
        counts: JobCounts,
        error_message: Option<&str>,
    ) -> StorageResult<()>;
}

/// Per-URL scrape tracking
pub trait UrlRepository {
    /// Inserts a URL as PENDING, or updates type and job id of an existing one
    ///
    /// Scrape status and retry count of an existing URL are preserved.
    fn upsert_url(
        &mut self,
        url: &str,
        url_type: UrlType,
        job_id: Option<i64>,
    ) -> StorageResult<TrackedUrl>;

    /// Marks a URL SUCCESS and clears its error
    fn mark_success(
        &mut self,
        url: &str,
        content_hash: &str,
        file_path: Option<&str>,
    ) -> StorageResult<()>;

    /// Marks a URL FAILED and increments its retry count
    fn mark_failed(&mut self, url: &str, error_message: &str) -> StorageResult<()>;

    /// Gets FAILED URLs whose retry count is below `max_retries`
    fn get_failed(&self, max_retries: u32) -> StorageResult<Vec<TrackedUrl>>;

    fn get_by_url(&self, url: &str) -> StorageResult<Option<TrackedUrl>>;

    /// Counts tracked URLs last touched by a job
    fn count_for_job(&self, job_id: i64) -> StorageResult<JobCounts>;

    fn count_urls_by_status(&self) -> StorageResult<HashMap<ScrapeStatus, u64>>;
}

/// Entity persistence keyed by reference number
pub trait EntityRepository {
    /// Inserts or updates an entity by reference number
    ///
    /// Re-lists a removed entity and resets its miss counter.
    fn upsert_entity(&mut self, record: &EntityRecord) -> StorageResult<UpsertOutcome>;

    fn get_by_reference(&self, reference_number: &str) -> StorageResult<Option<Entity>>;

    /// Reference numbers of every entity not marked removed
    fn get_all_reference_numbers(&self) -> StorageResult<HashSet<String>>;

    fn mark_removed(&mut self, reference_number: &str) -> StorageResult<()>;

    /// Increments the miss counter and returns its new value
    fn record_miss(&mut self, reference_number: &str) -> StorageResult<u32>;

    fn count_entities_by_status(&self) -> StorageResult<HashMap<EntityStatus, u64>>;

    /// Available entities per species
    fn count_available_by_species(&self) -> StorageResult<HashMap<String, u64>>;
}

/// Every repository the pipeline needs, behind one handle
pub trait Storage: JobRepository + UrlRepository + EntityRepository {}

impl<T: JobRepository + UrlRepository + EntityRepository> Storage for T {}
