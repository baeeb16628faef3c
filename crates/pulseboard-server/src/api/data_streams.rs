//! Data stream handlers. Every lookup is scoped to the organization in the
//! path, so a stream id from another tenant behaves as not found.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use pulseboard_db::{DataStreamRow, NewDataStream};
use pulseboard_integrations::{PgSyncStore, SyncOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::platforms::{map_integration_error, parse_platform};
use super::{map_db_error, validate_date_range, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateDataStreamRequest {
    pub platform_type: String,
    pub name: String,
    /// Authorization code returned to the OAuth redirect URI.
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct SyncRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Stream as exposed over the API. Credentials are never returned.
#[derive(Debug, Serialize)]
pub(super) struct DataStreamItem {
    id: Uuid,
    organization_id: Uuid,
    platform_type: String,
    name: String,
    status: String,
    last_synced_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DataStreamRow> for DataStreamItem {
    fn from(row: DataStreamRow) -> Self {
        Self {
            id: row.id,
            organization_id: row.organization_id,
            platform_type: row.platform_type,
            name: row.name,
            status: row.status,
            last_synced_at: row.last_synced_at,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ConnectionStatus {
    data_stream_id: Uuid,
    connected: bool,
}

async fn load_stream(
    state: &AppState,
    request_id: &str,
    organization_id: Uuid,
    stream_id: Uuid,
) -> Result<DataStreamRow, ApiError> {
    pulseboard_db::get_data_stream_for_org(&state.pool, organization_id, stream_id)
        .await
        .map_err(|e| match e {
            pulseboard_db::DbError::NotFound => ApiError::new(
                request_id,
                "not_found",
                format!("data stream {stream_id} not found"),
            ),
            other => map_db_error(request_id.to_owned(), &other),
        })
}

const MAX_NAME_CHARS: usize = 200;

/// POST /api/v1/organizations/{organization_id}/data-streams
pub(super) async fn create_data_stream(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(organization_id): Path<Uuid>,
    Json(body): Json<CreateDataStreamRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DataStreamItem>>), ApiError> {
    let rid = &req_id.0;

    let name = body.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("name must be 1-{MAX_NAME_CHARS} characters"),
        ));
    }
    if body.code.trim().is_empty() {
        return Err(ApiError::new(rid, "validation_error", "code is required"));
    }
    let platform_type = parse_platform(rid, &body.platform_type)?;

    let config = state
        .factory
        .exchange_code(platform_type, body.code.trim())
        .await
        .map_err(|e| map_integration_error(rid, &e))?;

    let row = pulseboard_db::create_data_stream(
        &state.pool,
        &NewDataStream {
            organization_id,
            platform_type,
            name,
            config: &config,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        %organization_id,
        data_stream_id = %row.id,
        platform = platform_type.as_str(),
        "data stream connected"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(DataStreamItem::from(row), req_id.0)),
    ))
}

/// GET /api/v1/organizations/{organization_id}/data-streams
pub(super) async fn list_data_streams(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(organization_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<DataStreamItem>>>, ApiError> {
    let rows = pulseboard_db::list_data_streams(&state.pool, organization_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(DataStreamItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// POST /api/v1/organizations/{organization_id}/data-streams/{stream_id}/sync
pub(super) async fn sync_data_stream(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((organization_id, stream_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SyncRequest>,
) -> Result<Json<ApiResponse<SyncOutcome>>, ApiError> {
    let rid = &req_id.0;
    validate_date_range(rid, body.start_date, body.end_date)?;
    let stream = load_stream(&state, rid, organization_id, stream_id).await?;

    let store = PgSyncStore::new(state.pool.clone());
    let outcome = store
        .sync_stream(&state.factory, &stream, body.start_date, body.end_date)
        .await
        .map_err(|e| ApiError::new(rid, "sync_failed", e.to_string()))?;

    Ok(Json(ApiResponse::new(outcome, req_id.0)))
}

/// POST /api/v1/organizations/{organization_id}/data-streams/{stream_id}/test
pub(super) async fn test_data_stream(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((organization_id, stream_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<ConnectionStatus>>, ApiError> {
    let rid = &req_id.0;
    let stream = load_stream(&state, rid, organization_id, stream_id).await?;

    let config = stream
        .integration_config()
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let integration = state
        .factory
        .create_integration(&stream.platform_type, organization_id, config)
        .map_err(|e| map_integration_error(rid, &e))?;
    let connected = integration.test_connection().await;

    tracing::info!(data_stream_id = %stream_id, connected, "connection test");

    Ok(Json(ApiResponse::new(
        ConnectionStatus {
            data_stream_id: stream_id,
            connected,
        },
        req_id.0,
    )))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use pulseboard_core::{IntegrationConfig, PlatformType};
    use pulseboard_db::NewDataStream;
    use pulseboard_llm::LlmService;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::test_support::{app, send};

    async fn seed_ga_stream(pool: &sqlx::PgPool, organization_id: Uuid) -> Uuid {
        let mut config = IntegrationConfig::new("ga-token");
        config
            .extra
            .insert("property_id".to_owned(), serde_json::json!("777"));
        pulseboard_db::create_data_stream(
            pool,
            &NewDataStream {
                organization_id,
                platform_type: PlatformType::GoogleAnalytics,
                name: "Website",
                config: &config,
            },
        )
        .await
        .expect("seed stream")
        .id
    }

    fn report(sessions: &str) -> serde_json::Value {
        serde_json::json!({
            "rows": [{
                "metricValues": [
                    {"value": sessions}, {"value": "8"}, {"value": "5"},
                    {"value": "30"}, {"value": "1"}, {"value": "2"}
                ]
            }]
        })
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn create_exchanges_code_and_hides_credentials(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/accessToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "li-access",
                "refresh_token": "li-refresh",
                "expires_in": 5_184_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let org = Uuid::new_v4();
        let (status, json) = send(
            app(pool.clone(), &server.uri(), LlmService::default()),
            "POST",
            &format!("/api/v1/organizations/{org}/data-streams"),
            Some(serde_json::json!({
                "platform_type": "linkedin",
                "name": "Company page",
                "code": "auth-code"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["status"], "pending");
        assert_eq!(json["data"]["platform_type"], "linkedin");
        assert!(json["data"].get("config").is_none());

        let id: Uuid = json["data"]["id"].as_str().unwrap().parse().unwrap();
        let stored = pulseboard_db::get_data_stream(&pool, id).await.unwrap();
        let config = stored.integration_config().unwrap();
        assert_eq!(config.access_token, "li-access");
        assert_eq!(config.refresh_token.as_deref(), Some("li-refresh"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn create_rejects_unsupported_platform(pool: sqlx::PgPool) {
        let org = Uuid::new_v4();
        let (status, json) = send(
            app(pool, "http://127.0.0.1:9", LlmService::default()),
            "POST",
            &format!("/api/v1/organizations/{org}/data-streams"),
            Some(serde_json::json!({"platform_type": "twitter", "name": "X", "code": "c"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn create_counts_name_length_in_characters(pool: sqlx::PgPool) {
        let org = Uuid::new_v4();

        // 150 two-byte characters: 300 bytes but within the 200 character cap.
        // Validation passes, so the request fails later at the unreachable
        // token endpoint rather than with a validation error.
        let (status, json) = send(
            app(pool.clone(), "http://127.0.0.1:9", LlmService::default()),
            "POST",
            &format!("/api/v1/organizations/{org}/data-streams"),
            Some(serde_json::json!({
                "platform_type": "linkedin",
                "name": "é".repeat(150),
                "code": "c"
            })),
        )
        .await;
        assert_ne!(json["error"]["code"], "validation_error");
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, json) = send(
            app(pool, "http://127.0.0.1:9", LlmService::default()),
            "POST",
            &format!("/api/v1/organizations/{org}/data-streams"),
            Some(serde_json::json!({
                "platform_type": "linkedin",
                "name": "é".repeat(201),
                "code": "c"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn streams_are_invisible_to_other_organizations(pool: sqlx::PgPool) {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let stream_id = seed_ga_stream(&pool, owner).await;

        let (status, json) = send(
            app(pool.clone(), "http://127.0.0.1:9", LlmService::default()),
            "GET",
            &format!("/api/v1/organizations/{other}/data-streams"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().map(Vec::len), Some(0));

        let (status, json) = send(
            app(pool, "http://127.0.0.1:9", LlmService::default()),
            "POST",
            &format!("/api/v1/organizations/{other}/data-streams/{stream_id}/sync"),
            Some(serde_json::json!({"start_date": "2025-03-01", "end_date": "2025-03-01"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn sync_stores_rows_and_activates_stream(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/properties/777:runReport"))
            .respond_with(ResponseTemplate::new(200).set_body_json(report("40")))
            .expect(2)
            .mount(&server)
            .await;

        let org = Uuid::new_v4();
        let stream_id = seed_ga_stream(&pool, org).await;

        let (status, json) = send(
            app(pool.clone(), &server.uri(), LlmService::default()),
            "POST",
            &format!("/api/v1/organizations/{org}/data-streams/{stream_id}/sync"),
            Some(serde_json::json!({"start_date": "2025-03-01", "end_date": "2025-03-02"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["days"], 2);
        assert_eq!(json["data"]["failed_days"], 0);

        let stream = pulseboard_db::get_data_stream(&pool, stream_id).await.unwrap();
        assert_eq!(stream.status, "active");
        assert!(stream.last_synced_at.is_some());

        let rows = pulseboard_db::list_analytics_data(
            &pool,
            org,
            Some(stream_id),
            "2025-03-01".parse().unwrap(),
            "2025-03-02".parse().unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].metrics["impressions"], 40);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unauthorized_sync_fails_and_marks_stream_error(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/properties/777:runReport"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let org = Uuid::new_v4();
        let stream_id = seed_ga_stream(&pool, org).await;

        let (status, json) = send(
            app(pool.clone(), &server.uri(), LlmService::default()),
            "POST",
            &format!("/api/v1/organizations/{org}/data-streams/{stream_id}/sync"),
            Some(serde_json::json!({"start_date": "2025-03-01", "end_date": "2025-03-01"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["code"], "sync_failed");

        let stream = pulseboard_db::get_data_stream(&pool, stream_id).await.unwrap();
        assert_eq!(stream.status, "error");
        assert!(stream.last_error.is_some());
        assert!(stream.last_synced_at.is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn sync_rejects_inverted_range(pool: sqlx::PgPool) {
        let org = Uuid::new_v4();
        let stream_id = seed_ga_stream(&pool, org).await;

        let (status, _) = send(
            app(pool, "http://127.0.0.1:9", LlmService::default()),
            "POST",
            &format!("/api/v1/organizations/{org}/data-streams/{stream_id}/sync"),
            Some(serde_json::json!({"start_date": "2025-03-05", "end_date": "2025-03-01"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_endpoint_reports_probe_result(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/accountSummaries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let org = Uuid::new_v4();
        let stream_id = seed_ga_stream(&pool, org).await;

        let (status, json) = send(
            app(pool, &server.uri(), LlmService::default()),
            "POST",
            &format!("/api/v1/organizations/{org}/data-streams/{stream_id}/test"),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["connected"], true);
    }
}
