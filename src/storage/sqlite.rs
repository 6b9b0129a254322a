//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the repository traits.

use crate::state::{EntityStatus, JobStatus, JobType, ScrapeStatus, UrlType};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    EntityRepository, JobRepository, StorageError, StorageResult, UrlRepository,
};
use crate::storage::{Entity, EntityRecord, JobCounts, ScrapeJob, TrackedUrl, UpsertOutcome};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const JOB_COLUMNS: &str = "id, job_type, status, started_at, completed_at, urls_discovered, \
     urls_scraped, urls_failed, error_message";

const URL_COLUMNS: &str = "id, url, url_type, scrape_status, retry_count, content_hash, \
     file_path, last_scraped_at, error_message, job_id";

const ENTITY_COLUMNS: &str = "id, reference_number, name, species, age, age_category, sex, \
     breed, size, color, weight, declawed, description, image_urls, source_url, thumbnail_url, \
     status, content_hash, first_seen_at, last_scraped_at, last_modified_at, missed_runs";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn job_status(&self, job_id: i64) -> StorageResult<JobStatus> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM scrape_jobs WHERE id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;

        let status = status.ok_or(StorageError::JobNotFound(job_id))?;
        JobStatus::from_db_string(&status)
            .ok_or_else(|| StorageError::Serialization(format!("unknown job status '{}'", status)))
    }

    /// Fails with `InvalidTransition` unless the job may move to `to`
    fn check_transition(&self, job_id: i64, to: JobStatus) -> StorageResult<()> {
        let from = self.job_status(job_id)?;
        if !from.can_transition_to(to) {
            return Err(StorageError::InvalidTransition { job_id, from, to });
        }
        Ok(())
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<ScrapeJob> {
    Ok(ScrapeJob {
        id: row.get(0)?,
        job_type: JobType::from_db_string(&row.get::<_, String>(1)?).unwrap_or(JobType::Full),
        status: JobStatus::from_db_string(&row.get::<_, String>(2)?).unwrap_or(JobStatus::Failed),
        started_at: row.get(3)?,
        completed_at: row.get(4)?,
        counts: JobCounts {
            discovered: row.get::<_, i64>(5)? as u64,
            scraped: row.get::<_, i64>(6)? as u64,
            failed: row.get::<_, i64>(7)? as u64,
        },
        error_message: row.get(8)?,
    })
}

fn url_from_row(row: &Row<'_>) -> rusqlite::Result<TrackedUrl> {
    Ok(TrackedUrl {
        id: row.get(0)?,
        url: row.get(1)?,
        url_type: UrlType::from_db_string(&row.get::<_, String>(2)?).unwrap_or(UrlType::General),
        scrape_status: ScrapeStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(ScrapeStatus::Pending),
        retry_count: row.get::<_, i64>(4)? as u32,
        content_hash: row.get(5)?,
        file_path: row.get(6)?,
        last_scraped_at: row.get(7)?,
        error_message: row.get(8)?,
        job_id: row.get(9)?,
    })
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    let images: String = row.get(13)?;
    Ok(Entity {
        id: row.get(0)?,
        record: EntityRecord {
            reference_number: row.get(1)?,
            name: row.get(2)?,
            species: row.get(3)?,
            age: row.get(4)?,
            age_category: row.get(5)?,
            sex: row.get(6)?,
            breed: row.get(7)?,
            size: row.get(8)?,
            color: row.get(9)?,
            weight: row.get(10)?,
            declawed: row.get::<_, i64>(11)? != 0,
            description: row.get(12)?,
            image_urls: split_images(&images),
            source_url: row.get(14)?,
            thumbnail_url: row.get(15)?,
            content_hash: row.get(17)?,
        },
        status: EntityStatus::from_db_string(&row.get::<_, String>(16)?)
            .unwrap_or(EntityStatus::Available),
        first_seen_at: row.get(18)?,
        last_scraped_at: row.get(19)?,
        last_modified_at: row.get(20)?,
        missed_runs: row.get::<_, i64>(21)? as u32,
    })
}

// Image URLs are stored newline-separated, order preserved.
fn join_images(urls: &[String]) -> String {
    urls.join("\n")
}

fn split_images(stored: &str) -> Vec<String> {
    stored
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl JobRepository for SqliteStorage {
    fn start_job(&mut self, job_type: JobType) -> StorageResult<ScrapeJob> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO scrape_jobs (job_type, status, started_at) VALUES (?1, ?2, ?3)",
            params![
                job_type.to_db_string(),
                JobStatus::Running.to_db_string(),
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        Ok(ScrapeJob {
            id,
            job_type,
            status: JobStatus::Running,
            started_at: now,
            completed_at: None,
            counts: JobCounts::default(),
            error_message: None,
        })
    }

    fn complete_job(&mut self, job_id: i64, counts: JobCounts) -> StorageResult<()> {
        self.check_transition(job_id, JobStatus::Completed)?;
        self.conn.execute(
            "UPDATE scrape_jobs SET status = ?1, completed_at = ?2, urls_discovered = ?3,
             urls_scraped = ?4, urls_failed = ?5 WHERE id = ?6",
            params![
                JobStatus::Completed.to_db_string(),
                Utc::now(),
                counts.discovered as i64,
                counts.scraped as i64,
                counts.failed as i64,
                job_id
            ],
        )?;
        Ok(())
    }

    fn fail_job(&mut self, job_id: i64, error_message: &str) -> StorageResult<()> {
        self.check_transition(job_id, JobStatus::Failed)?;
        self.conn.execute(
            "UPDATE scrape_jobs SET status = ?1, completed_at = ?2, error_message = ?3 WHERE id = ?4",
            params![
                JobStatus::Failed.to_db_string(),
                Utc::now(),
                error_message,
                job_id
            ],
        )?;
        Ok(())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<Option<ScrapeJob>> {
        let job = self
            .conn
            .query_row(
                &format!("SELECT {} FROM scrape_jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    fn get_latest(&self, job_type: Option<JobType>) -> StorageResult<Option<ScrapeJob>> {
        let job = match job_type {
            Some(job_type) => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {} FROM scrape_jobs WHERE job_type = ?1 ORDER BY id DESC LIMIT 1",
                        JOB_COLUMNS
                    ),
                    params![job_type.to_db_string()],
                    job_from_row,
                )
                .optional()?,
            None => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {} FROM scrape_jobs ORDER BY id DESC LIMIT 1",
                        JOB_COLUMNS
                    ),
                    [],
                    job_from_row,
                )
                .optional()?,
        };
        Ok(job)
    }

    fn get_running(&self) -> StorageResult<Vec<ScrapeJob>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM scrape_jobs WHERE status = ?1 ORDER BY id",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map(params![JobStatus::Running.to_db_string()], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    fn close_stale_job(
        &mut self,
        job_id: i64,
        status: JobStatus,
        completed_at: DateTime<Utc>,
        counts: JobCounts,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        self.check_transition(job_id, status)?;
        self.conn.execute(
            "UPDATE scrape_jobs SET status = ?1, completed_at = ?2, urls_discovered = ?3,
             urls_scraped = ?4, urls_failed = ?5, error_message = ?6 WHERE id = ?7",
            params![
                status.to_db_string(),
                completed_at,
                counts.discovered as i64,
                counts.scraped as i64,
                counts.failed as i64,
                error_message,
                job_id
            ],
        )?;
        Ok(())
    }
}

impl UrlRepository for SqliteStorage {
    fn upsert_url(
        &mut self,
        url: &str,
        url_type: UrlType,
        job_id: Option<i64>,
    ) -> StorageResult<TrackedUrl> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO scraped_urls (url, url_type, scrape_status, job_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url) DO UPDATE SET
                 url_type = excluded.url_type,
                 job_id = COALESCE(excluded.job_id, scraped_urls.job_id)",
            params![
                url,
                url_type.to_db_string(),
                ScrapeStatus::Pending.to_db_string(),
                job_id
            ],
        )?;

        let tracked = tx.query_row(
            &format!("SELECT {} FROM scraped_urls WHERE url = ?1", URL_COLUMNS),
            params![url],
            url_from_row,
        )?;

        tx.commit()?;
        Ok(tracked)
    }

    fn mark_success(
        &mut self,
        url: &str,
        content_hash: &str,
        file_path: Option<&str>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE scraped_urls SET scrape_status = ?1, last_scraped_at = ?2, content_hash = ?3,
             file_path = ?4, error_message = NULL WHERE url = ?5",
            params![
                ScrapeStatus::Success.to_db_string(),
                Utc::now(),
                content_hash,
                file_path,
                url
            ],
        )?;
        Ok(())
    }

    fn mark_failed(&mut self, url: &str, error_message: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE scraped_urls SET scrape_status = ?1, retry_count = retry_count + 1,
             last_scraped_at = ?2, error_message = ?3 WHERE url = ?4",
            params![
                ScrapeStatus::Failed.to_db_string(),
                Utc::now(),
                error_message,
                url
            ],
        )?;
        Ok(())
    }

    fn get_failed(&self, max_retries: u32) -> StorageResult<Vec<TrackedUrl>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM scraped_urls WHERE scrape_status = ?1 AND retry_count < ?2 ORDER BY id",
            URL_COLUMNS
        ))?;

        let urls = stmt
            .query_map(
                params![ScrapeStatus::Failed.to_db_string(), max_retries as i64],
                url_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(urls)
    }

    fn get_by_url(&self, url: &str) -> StorageResult<Option<TrackedUrl>> {
        let tracked = self
            .conn
            .query_row(
                &format!("SELECT {} FROM scraped_urls WHERE url = ?1", URL_COLUMNS),
                params![url],
                url_from_row,
            )
            .optional()?;
        Ok(tracked)
    }

    fn count_for_job(&self, job_id: i64) -> StorageResult<JobCounts> {
        let (discovered, scraped): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN scrape_status = ?1 THEN 1 ELSE 0 END), 0)
             FROM scraped_urls WHERE job_id = ?2",
            params![ScrapeStatus::Success.to_db_string(), job_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        // Anything not successful (including never-finished PENDING rows) counts as failed.
        Ok(JobCounts {
            discovered: discovered as u64,
            scraped: scraped as u64,
            failed: (discovered - scraped) as u64,
        })
    }

    fn count_urls_by_status(&self) -> StorageResult<HashMap<ScrapeStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT scrape_status, COUNT(*) FROM scraped_urls GROUP BY scrape_status")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = ScrapeStatus::from_db_string(&status_str) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }
}

impl EntityRepository for SqliteStorage {
    fn upsert_entity(&mut self, record: &EntityRecord) -> StorageResult<UpsertOutcome> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;

        let existing: Option<(String, String)> = tx
            .query_row(
                "SELECT content_hash, status FROM entities WHERE reference_number = ?1",
                params![record.reference_number],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let outcome = match existing {
            None => {
                tx.execute(
                    "INSERT INTO entities (reference_number, name, species, age, age_category,
                     sex, breed, size, color, weight, declawed, description, image_urls,
                     source_url, thumbnail_url, status, content_hash, first_seen_at,
                     last_scraped_at, last_modified_at, missed_runs)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?18, ?18, 0)",
                    params![
                        record.reference_number,
                        record.name,
                        record.species,
                        record.age,
                        record.age_category,
                        record.sex,
                        record.breed,
                        record.size,
                        record.color,
                        record.weight,
                        record.declawed as i64,
                        record.description,
                        join_images(&record.image_urls),
                        record.source_url,
                        record.thumbnail_url,
                        EntityStatus::Available.to_db_string(),
                        record.content_hash,
                        now
                    ],
                )?;
                UpsertOutcome::Created
            }
            Some((old_hash, old_status)) => {
                let relisted = old_status != EntityStatus::Available.to_db_string();
                let changed = relisted || old_hash != record.content_hash;

                tx.execute(
                    "UPDATE entities SET name = ?2, species = ?3, age = ?4, age_category = ?5,
                     sex = ?6, breed = ?7, size = ?8, color = ?9, weight = ?10, declawed = ?11,
                     description = ?12, image_urls = ?13, source_url = ?14, thumbnail_url = ?15,
                     status = ?16, content_hash = ?17, last_scraped_at = ?18, missed_runs = 0
                     WHERE reference_number = ?1",
                    params![
                        record.reference_number,
                        record.name,
                        record.species,
                        record.age,
                        record.age_category,
                        record.sex,
                        record.breed,
                        record.size,
                        record.color,
                        record.weight,
                        record.declawed as i64,
                        record.description,
                        join_images(&record.image_urls),
                        record.source_url,
                        record.thumbnail_url,
                        EntityStatus::Available.to_db_string(),
                        record.content_hash,
                        now
                    ],
                )?;

                if changed {
                    tx.execute(
                        "UPDATE entities SET last_modified_at = ?1 WHERE reference_number = ?2",
                        params![now, record.reference_number],
                    )?;
                    UpsertOutcome::Changed
                } else {
                    UpsertOutcome::Unchanged
                }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn get_by_reference(&self, reference_number: &str) -> StorageResult<Option<Entity>> {
        let entity = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM entities WHERE reference_number = ?1",
                    ENTITY_COLUMNS
                ),
                params![reference_number],
                entity_from_row,
            )
            .optional()?;
        Ok(entity)
    }

    fn get_all_reference_numbers(&self) -> StorageResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT reference_number FROM entities WHERE status != ?1")?;

        let refs = stmt
            .query_map(params![EntityStatus::Removed.to_db_string()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(refs)
    }

    fn mark_removed(&mut self, reference_number: &str) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE entities SET status = ?1, last_modified_at = ?2 WHERE reference_number = ?3",
            params![
                EntityStatus::Removed.to_db_string(),
                Utc::now(),
                reference_number
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::EntityNotFound(reference_number.to_string()));
        }
        Ok(())
    }

    fn record_miss(&mut self, reference_number: &str) -> StorageResult<u32> {
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE entities SET missed_runs = missed_runs + 1 WHERE reference_number = ?1",
            params![reference_number],
        )?;
        if updated == 0 {
            return Err(StorageError::EntityNotFound(reference_number.to_string()));
        }

        let missed: i64 = tx.query_row(
            "SELECT missed_runs FROM entities WHERE reference_number = ?1",
            params![reference_number],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(missed as u32)
    }

    fn count_entities_by_status(&self) -> StorageResult<HashMap<EntityStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM entities GROUP BY status")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = EntityStatus::from_db_string(&status_str) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }

    fn count_available_by_species(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(species, 'unknown'), COUNT(*) FROM entities
             WHERE status = ?1 GROUP BY COALESCE(species, 'unknown')",
        )?;

        let counts = stmt
            .query_map(params![EntityStatus::Available.to_db_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(counts)
    }
}
