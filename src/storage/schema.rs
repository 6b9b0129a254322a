//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Ark-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track scrape jobs
CREATE TABLE IF NOT EXISTS scrape_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_type TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    urls_discovered INTEGER NOT NULL DEFAULT 0,
    urls_scraped INTEGER NOT NULL DEFAULT 0,
    urls_failed INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_scrape_jobs_status ON scrape_jobs(status);

-- Track every URL the pipeline has attempted
CREATE TABLE IF NOT EXISTS scraped_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    url_type TEXT NOT NULL,
    scrape_status TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    content_hash TEXT,
    file_path TEXT,
    last_scraped_at TEXT,
    error_message TEXT,
    job_id INTEGER REFERENCES scrape_jobs(id)
);

CREATE INDEX IF NOT EXISTS idx_scraped_urls_status ON scraped_urls(scrape_status);
CREATE INDEX IF NOT EXISTS idx_scraped_urls_job ON scraped_urls(job_id);

-- Adoptable animals keyed by the site's reference number
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_number TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    species TEXT,
    age TEXT,
    age_category TEXT,
    sex TEXT,
    breed TEXT,
    size TEXT,
    color TEXT,
    weight TEXT,
    declawed INTEGER NOT NULL DEFAULT 0,
    description TEXT,
    image_urls TEXT NOT NULL DEFAULT '',
    source_url TEXT NOT NULL,
    thumbnail_url TEXT,
    status TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_scraped_at TEXT NOT NULL,
    last_modified_at TEXT NOT NULL,
    missed_runs INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_entities_status ON entities(status);
CREATE INDEX IF NOT EXISTS idx_entities_species_status ON entities(species, status);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
