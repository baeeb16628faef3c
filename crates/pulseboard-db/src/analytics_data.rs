//! Database operations for the `analytics_data` table.

use chrono::{DateTime, NaiveDate, Utc};
use pulseboard_core::IntegrationData;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `analytics_data` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalyticsDataRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub data_stream_id: Uuid,
    pub date: NaiveDate,
    pub metrics: Value,
    pub raw_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts one row per day for a stream inside a single transaction.
///
/// Conflicts on `(organization_id, data_stream_id, date)` overwrite
/// `metrics` and `raw_data`, so re-syncing a range never duplicates rows.
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back and no rows from this batch are kept.
pub async fn upsert_analytics_data(
    pool: &PgPool,
    organization_id: Uuid,
    data_stream_id: Uuid,
    rows: &[IntegrationData],
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;
    let mut written = 0u64;

    for row in rows {
        let metrics = serde_json::to_value(&row.metrics)?;
        let result = sqlx::query(
            "INSERT INTO analytics_data \
                 (organization_id, data_stream_id, date, metrics, raw_data) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (organization_id, data_stream_id, date) DO UPDATE SET \
                 metrics    = EXCLUDED.metrics, \
                 raw_data   = EXCLUDED.raw_data, \
                 updated_at = NOW()",
        )
        .bind(organization_id)
        .bind(data_stream_id)
        .bind(row.date)
        .bind(metrics)
        .bind(&row.raw_data)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Lists an organization's analytics rows in `[start, end]`, oldest first.
///
/// When `data_stream_id` is `None`, rows from every stream are returned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_analytics_data(
    pool: &PgPool,
    organization_id: Uuid,
    data_stream_id: Option<Uuid>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<AnalyticsDataRow>, DbError> {
    let rows = sqlx::query_as::<_, AnalyticsDataRow>(
        "SELECT id, organization_id, data_stream_id, date, metrics, raw_data, \
                created_at, updated_at \
         FROM analytics_data \
         WHERE organization_id = $1 \
           AND ($2::uuid IS NULL OR data_stream_id = $2) \
           AND date BETWEEN $3 AND $4 \
         ORDER BY date, data_stream_id",
    )
    .bind(organization_id)
    .bind(data_stream_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
