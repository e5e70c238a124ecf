//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers three
//! recurring jobs: the incremental collection run, the daily full run
//! (collection plus metadata refresh), and an hourly watchdog that forces a
//! run when the incremental job has gone stale. Job bodies catch and log
//! every failure; a bad run must never take the scheduler down with it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use aipulse_ai::OpenAiClient;
use aipulse_collect::{enrich_pending, refresh_metadata, Collector, SourceClients};
use aipulse_core::AppConfig;

/// Deferred-enrichment cap for the frequent incremental runs.
const INCREMENTAL_ENRICH_LIMIT: i64 = 20;
/// Deferred-enrichment cap for the daily full run.
const FULL_ENRICH_LIMIT: i64 = 50;
/// Items re-checked per daily metadata refresh.
const METADATA_REFRESH_LIMIT: i64 = 200;
/// Watchdog fires at minute 30 of every hour.
const WATCHDOG_CRON: &str = "0 30 * * * *";

/// One registered job, as surfaced by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub name: &'static str,
    pub schedule: String,
}

/// Point-in-time copy of the scheduler bookkeeping.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerSnapshot {
    pub running: bool,
    pub last_run_started_at: Option<DateTime<Utc>>,
    pub last_run_finished_at: Option<DateTime<Utc>>,
    pub last_run_saved: Option<usize>,
    pub last_incremental_success_at: Option<DateTime<Utc>>,
    pub jobs: Vec<JobInfo>,
}

/// Shared bookkeeping for the collection jobs: a running flag that keeps
/// overlapping runs from piling up, plus timestamps the watchdog and the
/// status endpoint read.
#[derive(Clone, Default)]
pub struct SchedulerState {
    inner: Arc<Mutex<SchedulerSnapshot>>,
}

impl SchedulerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> SchedulerSnapshot {
        self.inner.lock().await.clone()
    }

    async fn register_job(&self, name: &'static str, schedule: String) {
        self.inner.lock().await.jobs.push(JobInfo { name, schedule });
    }

    /// Marks a run as started. Returns `false` (and changes nothing) when a
    /// run is already in progress.
    async fn begin_run(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.running {
            return false;
        }
        inner.running = true;
        inner.last_run_started_at = Some(Utc::now());
        true
    }

    async fn finish_run(&self, saved: usize, incremental: bool) {
        let mut inner = self.inner.lock().await;
        inner.running = false;
        inner.last_run_finished_at = Some(Utc::now());
        inner.last_run_saved = Some(saved);
        if incremental {
            inner.last_incremental_success_at = Some(Utc::now());
        }
    }
}

/// Builds and starts the background job scheduler.
///
/// Registers all recurring jobs and starts the scheduler. Returns the running
/// [`JobScheduler`] handle, which must be kept alive for the lifetime of the
/// process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    collector: Arc<Collector<OpenAiClient>>,
    enricher: Arc<OpenAiClient>,
    clients: Arc<SourceClients>,
    pool: PgPool,
    config: Arc<AppConfig>,
    state: SchedulerState,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_incremental_job(
        &scheduler,
        Arc::clone(&collector),
        Arc::clone(&enricher),
        pool.clone(),
        Arc::clone(&config),
        state.clone(),
    )
    .await?;
    register_full_job(
        &scheduler,
        Arc::clone(&collector),
        Arc::clone(&enricher),
        clients,
        pool.clone(),
        Arc::clone(&config),
        state.clone(),
    )
    .await?;
    register_watchdog_job(&scheduler, collector, enricher, pool, config, state).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

fn incremental_cron(interval_hours: u32) -> String {
    let hours = interval_hours.max(1);
    format!("0 0 */{hours} * * *")
}

fn full_cron(hour_utc: u32) -> String {
    let hour = hour_utc.min(23);
    format!("0 0 {hour} * * *")
}

/// Register the incremental collection job: every N hours, collect all
/// enabled sources, then run a small deferred-enrichment batch when anything
/// new was saved.
async fn register_incremental_job(
    scheduler: &JobScheduler,
    collector: Arc<Collector<OpenAiClient>>,
    enricher: Arc<OpenAiClient>,
    pool: PgPool,
    config: Arc<AppConfig>,
    state: SchedulerState,
) -> Result<(), JobSchedulerError> {
    let cron = incremental_cron(config.incremental_interval_hours);
    state.register_job("incremental", cron.clone()).await;

    let pool = Arc::new(pool);
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let collector = Arc::clone(&collector);
        let enricher = Arc::clone(&enricher);
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let state = state.clone();

        Box::pin(async move {
            tracing::info!("scheduler: starting incremental collection run");
            run_collection(
                &collector,
                &enricher,
                &pool,
                &config,
                &state,
                INCREMENTAL_ENRICH_LIMIT,
                true,
            )
            .await;
            tracing::info!("scheduler: incremental collection run complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Register the daily full job: a collection run with a larger enrichment
/// batch, followed by a batched metadata refresh over stored items.
async fn register_full_job(
    scheduler: &JobScheduler,
    collector: Arc<Collector<OpenAiClient>>,
    enricher: Arc<OpenAiClient>,
    clients: Arc<SourceClients>,
    pool: PgPool,
    config: Arc<AppConfig>,
    state: SchedulerState,
) -> Result<(), JobSchedulerError> {
    let cron = full_cron(config.full_run_hour_utc);
    state.register_job("full", cron.clone()).await;

    let pool = Arc::new(pool);
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let collector = Arc::clone(&collector);
        let enricher = Arc::clone(&enricher);
        let clients = Arc::clone(&clients);
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let state = state.clone();

        Box::pin(async move {
            tracing::info!("scheduler: starting daily full run");
            run_collection(
                &collector,
                &enricher,
                &pool,
                &config,
                &state,
                FULL_ENRICH_LIMIT,
                false,
            )
            .await;
            run_metadata_refresh(&pool, &clients, &config).await;
            tracing::info!("scheduler: daily full run complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Register the hourly watchdog: when the incremental job has not succeeded
/// within the configured staleness window, force a run immediately.
async fn register_watchdog_job(
    scheduler: &JobScheduler,
    collector: Arc<Collector<OpenAiClient>>,
    enricher: Arc<OpenAiClient>,
    pool: PgPool,
    config: Arc<AppConfig>,
    state: SchedulerState,
) -> Result<(), JobSchedulerError> {
    state
        .register_job("watchdog", WATCHDOG_CRON.to_string())
        .await;

    let pool = Arc::new(pool);
    let job = Job::new_async(WATCHDOG_CRON, move |_uuid, _lock| {
        let collector = Arc::clone(&collector);
        let enricher = Arc::clone(&enricher);
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let state = state.clone();

        Box::pin(async move {
            let last = state.snapshot().await.last_incremental_success_at;
            if !is_stale(last, config.watchdog_stale_hours) {
                return;
            }

            tracing::warn!(
                stale_hours = config.watchdog_stale_hours,
                "scheduler: incremental run is stale, watchdog forcing a run"
            );
            run_collection(
                &collector,
                &enricher,
                &pool,
                &config,
                &state,
                INCREMENTAL_ENRICH_LIMIT,
                true,
            )
            .await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// One collection run: fan out over enabled sources, then enrich a batch of
/// freshly saved items. Skips entirely when another run is in flight.
async fn run_collection(
    collector: &Collector<OpenAiClient>,
    enricher: &OpenAiClient,
    pool: &PgPool,
    config: &AppConfig,
    state: &SchedulerState,
    enrich_limit: i64,
    incremental: bool,
) {
    if !state.begin_run().await {
        tracing::info!("scheduler: a collection run is already in progress; skipping");
        return;
    }

    let summary = collector.run_all().await;
    let saved = summary.total_saved();

    if saved > 0 {
        match enrich_pending(pool, enricher, &config.enrich_lang, enrich_limit).await {
            Ok(report) => {
                tracing::info!(
                    updated = report.updated,
                    failed = report.failed,
                    "scheduler: deferred enrichment finished"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "scheduler: deferred enrichment failed");
            }
        }
    }

    state.finish_run(saved, incremental).await;
}

/// Re-fetch live counters for stored items, in rate-limit-friendly batches.
async fn run_metadata_refresh(pool: &PgPool, clients: &SourceClients, config: &AppConfig) {
    let delay = std::time::Duration::from_millis(config.enrich_batch_delay_ms);
    match refresh_metadata(
        pool,
        clients,
        None,
        METADATA_REFRESH_LIMIT,
        config.enrich_batch_size,
        delay,
    )
    .await
    {
        Ok(report) => {
            tracing::info!(
                updated = report.updated,
                failed = report.failed,
                "scheduler: metadata refresh finished"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: metadata refresh failed");
        }
    }
}

fn is_stale(last_success: Option<DateTime<Utc>>, stale_hours: u64) -> bool {
    let Some(last) = last_success else {
        // Never succeeded since startup: force a run.
        return true;
    };
    #[allow(clippy::cast_possible_wrap)]
    let max_age = Duration::hours(stale_hours as i64);
    Utc::now() - last > max_age
}
