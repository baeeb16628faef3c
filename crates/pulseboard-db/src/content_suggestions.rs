//! Database operations for the `content_suggestions` table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `content_suggestions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentSuggestionRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub provider: String,
    /// The parsed suggestion list as returned to the caller.
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Stores one batch of generated suggestions and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_content_suggestions(
    pool: &PgPool,
    organization_id: Uuid,
    provider: &str,
    payload: &Value,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO content_suggestions (organization_id, provider, payload) \
         VALUES ($1, $2, $3) \
         RETURNING id",
    )
    .bind(organization_id)
    .bind(provider)
    .bind(payload)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Most recent suggestion batches for an organization.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_content_suggestions(
    pool: &PgPool,
    organization_id: Uuid,
    limit: i64,
) -> Result<Vec<ContentSuggestionRow>, DbError> {
    let rows = sqlx::query_as::<_, ContentSuggestionRow>(
        "SELECT id, organization_id, provider, payload, created_at \
         FROM content_suggestions \
         WHERE organization_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(organization_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
