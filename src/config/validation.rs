use crate::config::types::{
    Config, ContentConfig, OutputConfig, PipelineConfig, ScheduleConfig, ScraperConfig, SiteConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_scraper_config(&config.scraper)?;
    validate_content_config(&config.content)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_schedule_config(&config.schedule)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;
    validate_http_url("sitemap-url", &config.sitemap_url)?;

    for listing in &config.listing_urls {
        validate_http_url("listing-urls", listing)?;
    }

    if config.locale != "en" && config.locale != "fr" {
        return Err(ConfigError::Validation(format!(
            "locale must be 'en' or 'fr', got '{}'",
            config.locale
        )));
    }

    Ok(())
}

fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if !(config.requests_per_second > 0.0) || !config.requests_per_second.is_finite() {
        return Err(ConfigError::Validation(format!(
            "requests_per_second must be a positive number, got {}",
            config.requests_per_second
        )));
    }

    if config.burst < 1 {
        return Err(ConfigError::Validation(
            "burst must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.backoff_max_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_max_ms ({}) must be >= backoff_base_ms ({})",
            config.backoff_max_ms, config.backoff_base_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_content_config(config: &ContentConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "content directory cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.removal_confirmations < 1 {
        return Err(ConfigError::Validation(
            "removal_confirmations must be >= 1".to_string(),
        ));
    }

    if config.stale_job_minutes < 1 || config.stale_job_minutes > i64::from(u32::MAX) {
        return Err(ConfigError::Validation(format!(
            "stale_job_minutes must be between 1 and {}, got {}",
            u32::MAX,
            config.stale_job_minutes
        )));
    }

    Ok(())
}

fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    if config.entity_interval_hours < 1 {
        return Err(ConfigError::Validation(
            "entity_interval_hours must be >= 1".to_string(),
        ));
    }

    validate_cron(&config.content_cron)?;
    validate_cron(&config.sitemap_cron)?;
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Parses a URL and requires an http(s) scheme
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

/// Shape check for the scheduler's cron syntax (seconds field first)
///
/// Full parsing happens when the job is registered; this catches the
/// common mistake of pasting a five-field crontab line.
fn validate_cron(expr: &str) -> Result<(), ConfigError> {
    let fields = expr.split_whitespace().count();
    if fields != 6 && fields != 7 {
        return Err(ConfigError::InvalidCron(format!(
            "'{}' has {} fields, expected 6 (sec min hour day month weekday) or 7",
            expr, fields
        )));
    }
    Ok(())
}
