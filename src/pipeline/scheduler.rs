//! Recurring pipeline schedule
//!
//! Three jobs run on `tokio-cron-scheduler`:
//! - entity refresh every `entity-interval-hours` (plus once at start)
//! - content refresh on `content-cron` (daily 02:00 by default)
//! - sitemap refresh on `sitemap-cron` (Sunday 01:00 by default)
//!
//! Cron expressions have six fields (seconds first) and are evaluated in
//! UTC. Every run holds a read guard on a shared gate; shutdown takes the
//! write guard, so it waits for in-flight runs and nothing runs afterwards.

use super::orchestrator::{JobSummary, Orchestrator};
use crate::config::ScheduleConfig;
use crate::state::JobType;
use crate::{HarvestError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// What a scheduled slot does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    EntityRefresh,
    ContentRefresh,
    SitemapRefresh,
}

impl ScheduledJob {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EntityRefresh => "entity refresh",
            Self::ContentRefresh => "content refresh",
            Self::SitemapRefresh => "sitemap refresh",
        }
    }
}

/// Shared state every scheduled callback runs against
#[derive(Clone)]
struct Runner {
    orchestrator: Arc<Orchestrator>,
    gate: Arc<RwLock<()>>,
    accepting: Arc<AtomicBool>,
}

impl Runner {
    /// Runs a scheduled job, logging and swallowing failures
    async fn run_scheduled(&self, job: ScheduledJob) {
        let _guard = self.gate.read().await;
        if !self.accepting.load(Ordering::SeqCst) {
            return;
        }

        info!(job = job.name(), "Running scheduled job");
        match job {
            ScheduledJob::EntityRefresh => self.log_outcome(job, self.orchestrator.run_entity_scrape().await),
            ScheduledJob::ContentRefresh => {
                self.log_outcome(job, self.orchestrator.run_content_scrape().await)
            }
            ScheduledJob::SitemapRefresh => {
                let urls = self.orchestrator.refresh_sitemap().await;
                info!(job = job.name(), urls = urls.len(), "Scheduled job completed");
            }
        }
    }

    fn log_outcome(&self, job: ScheduledJob, outcome: Result<JobSummary>) {
        match outcome {
            Ok(summary) => info!(
                job = job.name(),
                job_id = summary.job_id,
                scraped = summary.counts.scraped,
                failed = summary.counts.failed,
                "Scheduled job completed"
            ),
            Err(e) => error!(job = job.name(), error = %e, "Scheduled job failed"),
        }
    }
}

/// Cron and interval scheduler around an [`Orchestrator`]
pub struct PipelineScheduler {
    runner: Runner,
    schedule: ScheduleConfig,
    scheduler: Mutex<Option<JobScheduler>>,
}

impl PipelineScheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, schedule: ScheduleConfig) -> Self {
        Self {
            runner: Runner {
                orchestrator,
                gate: Arc::new(RwLock::new(())),
                accepting: Arc::new(AtomicBool::new(true)),
            },
            schedule,
            scheduler: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.runner.accepting.load(Ordering::SeqCst)
    }

    fn cron_job(&self, cron: &str, job: ScheduledJob) -> Result<Job> {
        let runner = self.runner.clone();
        Job::new_async(cron, move |_uuid, _lock| {
            let runner = runner.clone();
            Box::pin(async move { runner.run_scheduled(job).await })
        })
        .map_err(|e| HarvestError::Scheduler(format!("{} ({}): {}", job.name(), cron, e)))
    }

    /// Registers the three jobs, starts ticking and kicks off an entity refresh
    pub async fn start(&self) -> Result<()> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            warn!("Scheduler already started");
            return Ok(());
        }
        if !self.is_running() {
            return Err(HarvestError::Scheduler("scheduler has been shut down".to_string()));
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| HarvestError::Scheduler(e.to_string()))?;

        let interval = Duration::from_secs(self.schedule.entity_interval_hours * 3600);
        let runner = self.runner.clone();
        let entity_job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let runner = runner.clone();
            Box::pin(async move { runner.run_scheduled(ScheduledJob::EntityRefresh).await })
        })
        .map_err(|e| HarvestError::Scheduler(e.to_string()))?;

        let content_job = self.cron_job(&self.schedule.content_cron, ScheduledJob::ContentRefresh)?;
        let sitemap_job = self.cron_job(&self.schedule.sitemap_cron, ScheduledJob::SitemapRefresh)?;

        for job in [entity_job, content_job, sitemap_job] {
            scheduler
                .add(job)
                .await
                .map_err(|e| HarvestError::Scheduler(e.to_string()))?;
        }
        scheduler
            .start()
            .await
            .map_err(|e| HarvestError::Scheduler(e.to_string()))?;

        info!(
            entity_interval_hours = self.schedule.entity_interval_hours,
            content_cron = %self.schedule.content_cron,
            sitemap_cron = %self.schedule.sitemap_cron,
            "Scheduler started"
        );
        *slot = Some(scheduler);
        drop(slot);

        let runner = self.runner.clone();
        tokio::spawn(async move {
            info!("Running initial entity refresh");
            runner.run_scheduled(ScheduledJob::EntityRefresh).await;
        });

        Ok(())
    }

    /// Runs a job immediately
    ///
    /// Unlike scheduled runs, the outcome is returned to the caller.
    pub async fn trigger(&self, job_type: JobType) -> Result<JobSummary> {
        let _guard = self.runner.gate.read().await;
        if !self.is_running() {
            return Err(HarvestError::Scheduler("scheduler has been shut down".to_string()));
        }
        self.runner.orchestrator.trigger(job_type).await
    }

    /// Stops scheduling and waits for in-flight runs
    pub async fn shutdown(&self) -> Result<()> {
        self.runner.accepting.store(false, Ordering::SeqCst);

        let scheduler = self.scheduler.lock().await.take();
        if let Some(mut scheduler) = scheduler {
            if let Err(e) = scheduler.shutdown().await {
                warn!(error = %e, "Scheduler shutdown reported an error");
            }
        }

        let _quiesced = self.runner.gate.write().await;
        info!("Scheduler stopped");
        Ok(())
    }
}
