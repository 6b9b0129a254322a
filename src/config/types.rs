use serde::Deserialize;

/// Main configuration structure for Ark-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub output: OutputConfig,
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site root used to absolutize relative links
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Sitemap index (or plain urlset) to discover from
    #[serde(rename = "sitemap-url")]
    pub sitemap_url: String,

    /// Listing entry points; the built-in ones for `locale` are used when empty
    #[serde(rename = "listing-urls", default)]
    pub listing_urls: Vec<String>,

    #[serde(default = "default_locale")]
    pub locale: String,
}

/// Fetch behavior: rate limit, concurrency, retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    #[serde(rename = "requests-per-second", default = "default_requests_per_second")]
    pub requests_per_second: f64,

    #[serde(default = "default_burst")]
    pub burst: u32,

    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-attempt timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// How content pages are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    Http,
    Headless,
}

/// Content artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    /// Directory receiving `{slug}.txt` artifacts
    #[serde(default = "default_content_directory")]
    pub directory: String,

    #[serde(default = "default_renderer")]
    pub renderer: Renderer,

    /// Wait after navigation before reading a rendered page (milliseconds)
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

/// Orchestrator limits
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Pagination cap per listing
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Phase-2 rounds and the retry_count cap for failed URLs
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Consecutive runs an entity must be missing before it is removed
    #[serde(rename = "removal-confirmations", default = "default_removal_confirmations")]
    pub removal_confirmations: u32,

    #[serde(rename = "stale-job-minutes", default = "default_stale_job_minutes")]
    pub stale_job_minutes: i64,
}

/// Scheduler timing
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(rename = "entity-interval-hours", default = "default_entity_interval_hours")]
    pub entity_interval_hours: u64,

    /// Six-field cron expression (sec min hour day month weekday)
    #[serde(rename = "content-cron", default = "default_content_cron")]
    pub content_cron: String,

    #[serde(rename = "sitemap-cron", default = "default_sitemap_cron")]
    pub sitemap_cron: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_requests_per_second() -> f64 {
    0.5
}

fn default_burst() -> u32 {
    3
}

fn default_max_concurrent() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    format!("ark-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_content_directory() -> String {
    "./content".to_string()
}

fn default_renderer() -> Renderer {
    Renderer::Http
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

fn default_max_pages() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_removal_confirmations() -> u32 {
    1
}

fn default_stale_job_minutes() -> i64 {
    60
}

fn default_entity_interval_hours() -> u64 {
    4
}

fn default_content_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_sitemap_cron() -> String {
    "0 0 1 * * Sun".to_string()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            max_concurrent: default_max_concurrent(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            directory: default_content_directory(),
            renderer: default_renderer(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_retries: default_max_retries(),
            removal_confirmations: default_removal_confirmations(),
            stale_job_minutes: default_stale_job_minutes(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            entity_interval_hours: default_entity_interval_hours(),
            content_cron: default_content_cron(),
            sitemap_cron: default_sitemap_cron(),
        }
    }
}
