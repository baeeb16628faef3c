//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the daily
//! analytics sync.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use pulseboard_integrations::{IntegrationFactory, PgSyncStore};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// A `pending` stream untouched for this long is treated as abandoned.
const STALE_PENDING_HOURS: i64 = 1;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    factory: Arc<IntegrationFactory>,
    lookback_days: u32,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_daily_sync_job(&scheduler, pool, factory, lookback_days).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the daily sync of every active, errored or stale pending stream.
///
/// Runs at 03:00 UTC (`0 0 3 * * *`) and covers the `lookback_days` days
/// ending yesterday.
async fn register_daily_sync_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    factory: Arc<IntegrationFactory>,
    lookback_days: u32,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 0 3 * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let factory = Arc::clone(&factory);

        Box::pin(async move {
            let (start, end) = lookback_window(Utc::now().date_naive(), lookback_days);
            tracing::info!(%start, %end, "scheduler: starting daily analytics sync");
            run_daily_sync(&pool, &factory, start, end).await;
            tracing::info!("scheduler: daily analytics sync complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// `[today - lookback_days, today - 1]`; a zero lookback still covers
/// yesterday.
fn lookback_window(today: NaiveDate, lookback_days: u32) -> (NaiveDate, NaiveDate) {
    let end = today - Duration::days(1);
    let start = end - Duration::days(i64::from(lookback_days.max(1)) - 1);
    (start, end)
}

/// Sync every schedulable stream. One stream failing never stops the others.
async fn run_daily_sync(
    pool: &PgPool,
    factory: &IntegrationFactory,
    start: NaiveDate,
    end: NaiveDate,
) {
    let pending_before = Utc::now() - Duration::hours(STALE_PENDING_HOURS);
    let streams = match pulseboard_db::list_schedulable_data_streams(pool, pending_before).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load data streams");
            return;
        }
    };

    if streams.is_empty() {
        tracing::info!("scheduler: no data streams to sync; skipping");
        return;
    }

    tracing::info!(count = streams.len(), "scheduler: syncing data streams");

    let store = PgSyncStore::new(pool.clone());
    let mut failed = 0usize;
    for stream in &streams {
        match store.sync_stream(factory, stream, start, end).await {
            Ok(outcome) => tracing::info!(
                data_stream_id = %stream.id,
                platform = %stream.platform_type,
                rows_written = outcome.rows_written,
                failed_days = outcome.failed_days,
                "scheduler: stream synced"
            ),
            Err(e) => {
                failed += 1;
                tracing::error!(
                    data_stream_id = %stream.id,
                    platform = %stream.platform_type,
                    error = %e,
                    "scheduler: stream sync failed"
                );
            }
        }
    }

    if failed > 0 {
        tracing::warn!(
            failed,
            total = streams.len(),
            "scheduler: daily sync finished with failures"
        );
    }
}
