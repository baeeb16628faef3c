//! Database operations for the `data_streams` table.

use chrono::{DateTime, Utc};
use pulseboard_core::{IntegrationConfig, PlatformType, StreamStatus};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const STREAM_COLUMNS: &str = "id, organization_id, platform_type, name, status, \
     last_synced_at, last_error, config, created_at, updated_at";

/// A row from the `data_streams` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DataStreamRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub platform_type: String,
    pub name: String,
    pub status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Opaque credentials JSON; see [`IntegrationConfig`].
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataStreamRow {
    /// Decodes the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Json`] if the column does not hold a valid config.
    pub fn integration_config(&self) -> Result<IntegrationConfig, DbError> {
        Ok(serde_json::from_value(self.config.clone())?)
    }

    /// Parsed platform type, `None` for rows written with an unknown key.
    #[must_use]
    pub fn platform(&self) -> Option<PlatformType> {
        self.platform_type.parse().ok()
    }

    #[must_use]
    pub fn stream_status(&self) -> Option<StreamStatus> {
        self.status.parse().ok()
    }
}

/// Fields required to create a new stream.
#[derive(Debug, Clone)]
pub struct NewDataStream<'a> {
    pub organization_id: Uuid,
    pub platform_type: PlatformType,
    pub name: &'a str,
    pub config: &'a IntegrationConfig,
}

/// Inserts a new stream in `pending` status and returns it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails or [`DbError::Json`] if
/// the config cannot be encoded.
pub async fn create_data_stream(
    pool: &PgPool,
    new: &NewDataStream<'_>,
) -> Result<DataStreamRow, DbError> {
    let config = serde_json::to_value(new.config)?;
    let row = sqlx::query_as::<_, DataStreamRow>(&format!(
        "INSERT INTO data_streams (id, organization_id, platform_type, name, status, config) \
         VALUES ($1, $2, $3, $4, 'pending', $5) \
         RETURNING {STREAM_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(new.organization_id)
    .bind(new.platform_type.as_str())
    .bind(new.name)
    .bind(config)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a stream by id regardless of organization.
///
/// Intended for internal callers (scheduler, CLI) that are not acting on
/// behalf of a tenant.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists.
pub async fn get_data_stream(pool: &PgPool, id: Uuid) -> Result<DataStreamRow, DbError> {
    sqlx::query_as::<_, DataStreamRow>(&format!(
        "SELECT {STREAM_COLUMNS} FROM data_streams WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Fetches a stream only if it belongs to `organization_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the stream does not exist or belongs to
/// another organization.
pub async fn get_data_stream_for_org(
    pool: &PgPool,
    organization_id: Uuid,
    id: Uuid,
) -> Result<DataStreamRow, DbError> {
    sqlx::query_as::<_, DataStreamRow>(&format!(
        "SELECT {STREAM_COLUMNS} FROM data_streams \
         WHERE id = $1 AND organization_id = $2"
    ))
    .bind(id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Lists an organization's streams, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_data_streams(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Vec<DataStreamRow>, DbError> {
    let rows = sqlx::query_as::<_, DataStreamRow>(&format!(
        "SELECT {STREAM_COLUMNS} FROM data_streams \
         WHERE organization_id = $1 \
         ORDER BY created_at DESC, id"
    ))
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists every stream the daily sync should pick up, across all
/// organizations.
///
/// That is `active` and `error` streams, plus `pending` streams whose last
/// update is older than `pending_before` (never synced, or abandoned
/// mid-sync). `disconnected` streams are skipped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_schedulable_data_streams(
    pool: &PgPool,
    pending_before: DateTime<Utc>,
) -> Result<Vec<DataStreamRow>, DbError> {
    let rows = sqlx::query_as::<_, DataStreamRow>(&format!(
        "SELECT {STREAM_COLUMNS} FROM data_streams \
         WHERE status IN ('active', 'error') \
            OR (status = 'pending' AND updated_at < $1) \
         ORDER BY organization_id, created_at"
    ))
    .bind(pending_before)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Marks a stream `pending` at the start of a sync.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the stream does not exist.
pub async fn mark_stream_pending(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE data_streams SET status = 'pending', updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Marks a stream `active`, records `last_synced_at` and clears `last_error`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the stream does not exist.
pub async fn mark_stream_active(
    pool: &PgPool,
    id: Uuid,
    synced_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE data_streams \
         SET status = 'active', last_synced_at = $1, last_error = NULL, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(synced_at)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Marks a stream `error`. `last_synced_at` is left untouched.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the stream does not exist.
pub async fn mark_stream_error(pool: &PgPool, id: Uuid, message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE data_streams \
         SET status = 'error', last_error = $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Replaces the stored credentials, e.g. after a token refresh.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the stream does not exist.
pub async fn update_stream_config(
    pool: &PgPool,
    id: Uuid,
    config: &IntegrationConfig,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE data_streams SET config = $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(serde_json::to_value(config)?)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
