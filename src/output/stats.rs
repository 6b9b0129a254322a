//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::state::{EntityStatus, JobType, ScrapeStatus};
use crate::storage::{ScrapeJob, Storage};
use crate::HarvestError;
use std::collections::HashMap;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of tracked URLs
    pub total_urls: u64,

    /// Count of tracked URLs by scrape status
    pub urls_by_status: HashMap<ScrapeStatus, u64>,

    /// Count of entities by status
    pub entities_by_status: HashMap<EntityStatus, u64>,

    /// Available entities per species
    pub available_by_species: HashMap<String, u64>,

    /// Most recent job of each type, if any
    pub latest_jobs: Vec<ScrapeJob>,

    /// Jobs currently marked RUNNING
    pub running_jobs: u64,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let urls_by_status = storage.count_urls_by_status()?;
    let total_urls = urls_by_status.values().sum();

    let entities_by_status = storage.count_entities_by_status()?;
    let available_by_species = storage.count_available_by_species()?;

    let mut latest_jobs = Vec::new();
    for job_type in JobType::all() {
        if let Some(job) = storage.get_latest(Some(job_type))? {
            latest_jobs.push(job);
        }
    }

    let running_jobs = storage.get_running()?.len() as u64;

    Ok(HarvestStatistics {
        total_urls,
        urls_by_status,
        entities_by_status,
        available_by_species,
        latest_jobs,
        running_jobs,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Tracked URLs: {}", stats.total_urls);
    for status in [ScrapeStatus::Success, ScrapeStatus::Failed, ScrapeStatus::Pending] {
        let count = stats.urls_by_status.get(&status).copied().unwrap_or(0);
        println!("  {}: {} ({:.1}%)", status, count, percentage(count, stats.total_urls));
    }
    println!();

    let available = stats
        .entities_by_status
        .get(&EntityStatus::Available)
        .copied()
        .unwrap_or(0);
    let removed = stats
        .entities_by_status
        .get(&EntityStatus::Removed)
        .copied()
        .unwrap_or(0);
    println!("Entities:");
    println!("  available: {}", available);
    println!("  removed: {}", removed);

    if !stats.available_by_species.is_empty() {
        println!("\nAvailable by Species:");
        let mut species: Vec<_> = stats.available_by_species.iter().collect();
        species.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (name, count) in species {
            println!("  {}: {}", name, count);
        }
    }
    println!();

    println!("Latest Jobs:");
    if stats.latest_jobs.is_empty() {
        println!("  (none)");
    }
    for job in &stats.latest_jobs {
        println!(
            "  #{} {} {} started {} ({} discovered, {} scraped, {} failed)",
            job.id,
            job.job_type,
            job.status,
            job.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            job.counts.discovered,
            job.counts.scraped,
            job.counts.failed
        );
        if let Some(error) = &job.error_message {
            println!("      error: {}", error);
        }
    }

    if stats.running_jobs > 0 {
        println!("\nRunning jobs: {}", stats.running_jobs);
    }
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
