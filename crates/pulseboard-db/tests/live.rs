//! Live integration tests for pulseboard-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/pulseboard-db/`).

use chrono::{Duration, NaiveDate, Utc};
use pulseboard_core::{IntegrationConfig, IntegrationData, PlatformMetrics, PlatformType};
use pulseboard_db::{
    create_data_stream, get_data_stream, get_data_stream_for_org, insert_content_suggestions,
    list_schedulable_data_streams, list_analytics_data, list_content_suggestions, list_data_streams,
    mark_stream_active, mark_stream_error, mark_stream_pending, update_stream_config,
    upsert_analytics_data, DbError, NewDataStream,
};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).expect("valid date")
}

fn metrics(impressions: i64) -> PlatformMetrics {
    PlatformMetrics {
        impressions,
        reach: impressions / 2,
        ..PlatformMetrics::zero()
    }
}

async fn seed_stream(pool: &sqlx::PgPool, org: Uuid) -> Uuid {
    let config = IntegrationConfig::new("access").with_refresh_token("refresh");
    create_data_stream(
        pool,
        &NewDataStream {
            organization_id: org,
            platform_type: PlatformType::LinkedIn,
            name: "Company page",
            config: &config,
        },
    )
    .await
    .expect("create_data_stream failed")
    .id
}

// ---------------------------------------------------------------------------
// data_streams
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_data_stream_starts_pending(pool: sqlx::PgPool) {
    let org = Uuid::new_v4();
    let id = seed_stream(&pool, org).await;

    let row = get_data_stream(&pool, id).await.expect("stream exists");
    assert_eq!(row.status, "pending");
    assert_eq!(row.platform_type, "linkedin");
    assert!(row.last_synced_at.is_none());
    let config = row.integration_config().expect("config decodes");
    assert_eq!(config.refresh_token.as_deref(), Some("refresh"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn streams_are_scoped_to_their_organization(pool: sqlx::PgPool) {
    let org = Uuid::new_v4();
    let other_org = Uuid::new_v4();
    let id = seed_stream(&pool, org).await;

    assert!(get_data_stream_for_org(&pool, org, id).await.is_ok());
    let err = get_data_stream_for_org(&pool, other_org, id)
        .await
        .expect_err("other org must not see stream");
    assert!(matches!(err, DbError::NotFound));

    assert_eq!(list_data_streams(&pool, org).await.unwrap().len(), 1);
    assert!(list_data_streams(&pool, other_org).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn status_transitions_track_last_synced_at(pool: sqlx::PgPool) {
    let id = seed_stream(&pool, Uuid::new_v4()).await;

    let synced_at = Utc::now();
    mark_stream_active(&pool, id, synced_at).await.unwrap();
    let row = get_data_stream(&pool, id).await.unwrap();
    assert_eq!(row.status, "active");
    let first_sync = row.last_synced_at.expect("last_synced_at set");

    mark_stream_pending(&pool, id).await.unwrap();
    mark_stream_error(&pool, id, "upstream exploded").await.unwrap();
    let row = get_data_stream(&pool, id).await.unwrap();
    assert_eq!(row.status, "error");
    assert_eq!(row.last_error.as_deref(), Some("upstream exploded"));
    assert_eq!(row.last_synced_at, Some(first_sync));
}

#[sqlx::test(migrations = "../../migrations")]
async fn schedulable_streams_include_errored_and_stale_pending(pool: sqlx::PgPool) {
    let org = Uuid::new_v4();
    let active = seed_stream(&pool, org).await;
    let errored = seed_stream(&pool, org).await;
    let fresh_pending = seed_stream(&pool, org).await;
    let stale_pending = seed_stream(&pool, org).await;
    let disconnected = seed_stream(&pool, org).await;

    mark_stream_active(&pool, active, Utc::now()).await.unwrap();
    mark_stream_error(&pool, errored, "token expired").await.unwrap();
    sqlx::query(
        "UPDATE data_streams SET updated_at = NOW() - INTERVAL '3 hours' WHERE id = $1",
    )
    .bind(stale_pending)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("UPDATE data_streams SET status = 'disconnected' WHERE id = $1")
        .bind(disconnected)
        .execute(&pool)
        .await
        .unwrap();

    let cutoff = Utc::now() - Duration::hours(1);
    let ids: Vec<Uuid> = list_schedulable_data_streams(&pool, cutoff)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();

    assert!(ids.contains(&active));
    assert!(ids.contains(&errored));
    assert!(ids.contains(&stale_pending));
    assert!(!ids.contains(&fresh_pending));
    assert!(!ids.contains(&disconnected));
}

#[sqlx::test(migrations = "../../migrations")]
async fn status_updates_on_missing_stream_return_not_found(pool: sqlx::PgPool) {
    let err = mark_stream_pending(&pool, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_stream_config_replaces_credentials(pool: sqlx::PgPool) {
    let id = seed_stream(&pool, Uuid::new_v4()).await;
    let fresh = IntegrationConfig::new("new-access").with_refresh_token("new-refresh");

    update_stream_config(&pool, id, &fresh).await.unwrap();

    let row = get_data_stream(&pool, id).await.unwrap();
    assert_eq!(row.integration_config().unwrap(), fresh);
}

// ---------------------------------------------------------------------------
// analytics_data
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_analytics_data_is_idempotent_per_day(pool: sqlx::PgPool) {
    let org = Uuid::new_v4();
    let stream = seed_stream(&pool, org).await;

    let first = vec![
        IntegrationData {
            date: day(1),
            metrics: metrics(100),
            raw_data: serde_json::json!({"run": 1}),
        },
        IntegrationData {
            date: day(2),
            metrics: metrics(200),
            raw_data: serde_json::json!({"run": 1}),
        },
    ];
    upsert_analytics_data(&pool, org, stream, &first).await.unwrap();

    let second = vec![IntegrationData {
        date: day(2),
        metrics: metrics(250),
        raw_data: serde_json::json!({"run": 2}),
    }];
    upsert_analytics_data(&pool, org, stream, &second)
        .await
        .unwrap();

    let rows = list_analytics_data(&pool, org, Some(stream), day(1), day(31))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2, "re-sync must overwrite, not duplicate");
    assert_eq!(rows[0].date, day(1));
    assert_eq!(rows[1].metrics["impressions"], 250);
    assert_eq!(rows[1].raw_data["run"], 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_analytics_data_filters_by_range_and_org(pool: sqlx::PgPool) {
    let org = Uuid::new_v4();
    let stream = seed_stream(&pool, org).await;
    let rows: Vec<IntegrationData> = (1..=5)
        .map(|d| IntegrationData {
            date: day(d),
            metrics: metrics(i64::from(d)),
            raw_data: serde_json::json!({}),
        })
        .collect();
    upsert_analytics_data(&pool, org, stream, &rows).await.unwrap();

    let window = list_analytics_data(&pool, org, None, day(2), day(4))
        .await
        .unwrap();
    assert_eq!(window.len(), 3);

    let foreign = list_analytics_data(&pool, Uuid::new_v4(), None, day(1), day(5))
        .await
        .unwrap();
    assert!(foreign.is_empty());
}

// ---------------------------------------------------------------------------
// content_suggestions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn content_suggestions_round_trip(pool: sqlx::PgPool) {
    let org = Uuid::new_v4();
    let payload = serde_json::json!([{"title": "Launch teaser"}]);

    insert_content_suggestions(&pool, org, "openai", &payload)
        .await
        .unwrap();

    let rows = list_content_suggestions(&pool, org, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].provider, "openai");
    assert_eq!(rows[0].payload, payload);
}
