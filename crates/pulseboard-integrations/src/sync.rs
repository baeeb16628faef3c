//! Sync orchestration: fetch a date range for one data stream, persist it
//! idempotently, and track the stream's status around the run.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pulseboard_core::{IntegrationConfig, IntegrationData};
use serde::Serialize;
use uuid::Uuid;

use crate::error::IntegrationError;
use crate::integration::Integration;

/// Persistence side of a sync run.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn mark_pending(&self, data_stream_id: Uuid) -> Result<(), IntegrationError>;

    async fn mark_active(
        &self,
        data_stream_id: Uuid,
        synced_at: DateTime<Utc>,
    ) -> Result<(), IntegrationError>;

    /// Must leave `last_synced_at` untouched.
    async fn mark_error(&self, data_stream_id: Uuid, message: &str)
        -> Result<(), IntegrationError>;

    async fn save_config(
        &self,
        data_stream_id: Uuid,
        config: &IntegrationConfig,
    ) -> Result<(), IntegrationError>;

    /// Upserts on `(organization_id, data_stream_id, date)`; returns rows written.
    async fn upsert_analytics(
        &self,
        organization_id: Uuid,
        data_stream_id: Uuid,
        rows: &[IntegrationData],
    ) -> Result<u64, IntegrationError>;
}

/// Summary of a successful sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub data_stream_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: usize,
    /// Days stored as zero metrics because their upstream fetch failed.
    pub failed_days: usize,
    pub rows_written: u64,
    pub synced_at: DateTime<Utc>,
}

/// Runs one sync of `[start, end]` for a data stream.
///
/// The stream is marked `pending`, then `active` with a fresh
/// `last_synced_at` on success. On failure it is marked `error` (keeping its
/// previous `last_synced_at`) and the original error is returned.
/// Refreshed credentials are saved as soon as the fetch completes.
///
/// # Errors
///
/// Returns the first error from marking the stream pending, fetching,
/// saving credentials, upserting or marking the stream active.
pub async fn sync_data(
    integration: &mut dyn Integration,
    store: &dyn SyncStore,
    data_stream_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<SyncOutcome, IntegrationError> {
    let organization_id = integration.organization_id();
    let platform = integration.platform_name();

    store.mark_pending(data_stream_id).await?;
    tracing::info!(
        %data_stream_id,
        %organization_id,
        platform,
        %start,
        %end,
        "sync started"
    );

    match run(integration, store, data_stream_id, start, end).await {
        Ok(outcome) => {
            tracing::info!(
                %data_stream_id,
                platform,
                days = outcome.days,
                failed_days = outcome.failed_days,
                rows_written = outcome.rows_written,
                "sync completed"
            );
            Ok(outcome)
        }
        Err(e) => {
            tracing::error!(%data_stream_id, platform, error = %e, "sync failed");
            if let Err(mark_err) = store.mark_error(data_stream_id, &e.to_string()).await {
                tracing::warn!(
                    %data_stream_id,
                    error = %mark_err,
                    "failed to record sync error on stream"
                );
            }
            Err(e)
        }
    }
}

async fn run(
    integration: &mut dyn Integration,
    store: &dyn SyncStore,
    data_stream_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<SyncOutcome, IntegrationError> {
    let fetched = integration.fetch_data(start, end).await;

    if integration.config_changed() {
        store
            .save_config(data_stream_id, integration.config())
            .await?;
        tracing::debug!(%data_stream_id, "persisted refreshed credentials");
    }

    let rows = fetched?;
    let failed_days = rows.iter().filter(|r| r.error().is_some()).count();
    let rows_written = store
        .upsert_analytics(integration.organization_id(), data_stream_id, &rows)
        .await?;

    let synced_at = Utc::now();
    store.mark_active(data_stream_id, synced_at).await?;

    Ok(SyncOutcome {
        data_stream_id,
        start_date: start,
        end_date: end,
        days: rows.len(),
        failed_days,
        rows_written,
        synced_at,
    })
}
