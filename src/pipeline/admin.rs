//! Administrative operations
//!
//! Manual triggers, a one-shot retry of every retryable failed URL, and
//! reconciliation of jobs left RUNNING by a crashed process.

use super::orchestrator::{JobSummary, Orchestrator};
use crate::crawler::ListingItem;
use crate::state::{JobStatus, JobType, UrlType};
use crate::storage::{with_storage, JobCounts, SharedStorage};
use crate::Result;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

/// Outcome of [`Orchestrator::retry_failed_urls`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub retried: u64,
    pub recovered: u64,
    pub still_failed: u64,
}

/// A stale job closed by [`reconcile_stale_jobs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledJob {
    pub job_id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub counts: JobCounts,
}

impl Orchestrator {
    /// Runs a job now, outside any schedule
    pub async fn trigger(&self, job_type: JobType) -> Result<JobSummary> {
        info!(job_type = %job_type, "Triggering immediate job");
        self.run(job_type).await
    }

    /// Re-attempts every failed URL still under the retry cap
    ///
    /// Entity URLs are re-scraped and upserted; content URLs are re-fetched
    /// and re-saved. Other URL types are left alone.
    pub async fn retry_failed_urls(&self) -> Result<RetryReport> {
        let failed = self.store(|s| s.get_failed(self.settings.max_retries))?;
        let mut report = RetryReport::default();

        for tracked in failed {
            let recovered = match tracked.url_type {
                UrlType::Entity => {
                    let item = ListingItem {
                        url: tracked.url.clone(),
                        ..Default::default()
                    };
                    match self.scrape_entity(None, &item).await {
                        Ok(_) => true,
                        Err(error) => {
                            if let Err(e) = self.store(|s| s.mark_failed(&tracked.url, &error)) {
                                warn!(url = %tracked.url, error = %e, "Could not record entity failure");
                            }
                            false
                        }
                    }
                }
                url_type if url_type.is_content() => self.save_content(None, &tracked.url).await,
                url_type => {
                    debug!(url = %tracked.url, url_type = %url_type, "Skipping non-scrapable URL");
                    continue;
                }
            };

            report.retried += 1;
            if recovered {
                report.recovered += 1;
            } else {
                report.still_failed += 1;
            }
        }

        info!(
            retried = report.retried,
            recovered = report.recovered,
            still_failed = report.still_failed,
            "Failed URL retry complete"
        );
        Ok(report)
    }

    /// Closes jobs RUNNING longer than `threshold`
    pub fn reconcile_stale_jobs(&self, threshold: Duration) -> Result<Vec<ReconciledJob>> {
        reconcile_stale_jobs(&self.storage, threshold)
    }
}

/// Closes jobs RUNNING longer than `threshold`
///
/// A job with tracked URLs becomes COMPLETED with the counts recomputed from
/// its tracked URLs; a job with none becomes FAILED. Either way the
/// completion timestamp is the reconciliation time.
pub fn reconcile_stale_jobs(storage: &SharedStorage, threshold: Duration) -> Result<Vec<ReconciledJob>> {
    let cutoff = Utc::now() - threshold;
    let running = with_storage(storage, |s| s.get_running())?;
    let mut reconciled = Vec::new();

    for job in running.into_iter().filter(|job| job.started_at <= cutoff) {
        let counts = with_storage(storage, |s| s.count_for_job(job.id))?;

        let (status, message) = if counts.discovered > 0 {
            (JobStatus::Completed, None)
        } else {
            (
                JobStatus::Failed,
                Some("Stale job reconciled with no tracked progress"),
            )
        };

        with_storage(storage, |s| {
            s.close_stale_job(job.id, status, Utc::now(), counts, message)
        })?;

        warn!(
            job_id = job.id,
            job_type = %job.job_type,
            status = %status,
            scraped = counts.scraped,
            failed = counts.failed,
            "Reconciled stale job"
        );

        reconciled.push(ReconciledJob {
            job_id: job.id,
            job_type: job.job_type,
            status,
            counts,
        });
    }

    Ok(reconciled)
}
