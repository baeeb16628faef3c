mod ai;
mod analytics;
mod data_streams;
mod platforms;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use pulseboard_core::{AppConfig, MAX_SYNC_RANGE_DAYS};
use pulseboard_integrations::IntegrationFactory;
use pulseboard_llm::LlmService;
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub factory: Arc<IntegrationFactory>,
    pub llm: Arc<LlmService>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "sync_failed" | "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(20).clamp(1, 100)
}

pub(super) fn map_db_error(request_id: String, error: &pulseboard_db::DbError) -> ApiError {
    if matches!(error, pulseboard_db::DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "resource not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

/// Rejects inverted or oversized date ranges.
pub(super) fn validate_date_range(
    request_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), ApiError> {
    if end < start {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            format!("end_date {end} is before start_date {start}"),
        ));
    }
    if (end - start).num_days() >= MAX_SYNC_RANGE_DAYS {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            format!("date range must not exceed {MAX_SYNC_RANGE_DAYS} days"),
        ));
    }
    Ok(())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/platforms", get(platforms::list_platforms))
        .route(
            "/api/v1/oauth/{platform}/authorize",
            get(platforms::authorize),
        )
        .route(
            "/api/v1/organizations/{organization_id}/data-streams",
            get(data_streams::list_data_streams).post(data_streams::create_data_stream),
        )
        .route(
            "/api/v1/organizations/{organization_id}/data-streams/{stream_id}/sync",
            post(data_streams::sync_data_stream),
        )
        .route(
            "/api/v1/organizations/{organization_id}/data-streams/{stream_id}/test",
            post(data_streams::test_data_stream),
        )
        .route(
            "/api/v1/organizations/{organization_id}/analytics",
            get(analytics::list_analytics),
        )
        .route("/api/v1/ai/providers", get(ai::list_providers))
        .route(
            "/api/v1/organizations/{organization_id}/ai/content-suggestions",
            get(ai::list_content_suggestions).post(ai::generate_content_suggestions),
        )
        .route(
            "/api/v1/organizations/{organization_id}/ai/insights",
            post(ai::generate_insights),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match pulseboard_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::new(
                HealthData {
                    status: "ok",
                    database: "ok",
                },
                req_id.0,
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::new(
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    req_id.0,
                )),
            )
        }
    }
}

#[must_use]
pub fn rate_limit_state(config: &AppConfig) -> RateLimitState {
    RateLimitState::per_minute(config.rate_limit_per_minute)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use pulseboard_core::OAuthClientCredentials;
    use pulseboard_integrations::{IntegrationFactory, OAuthClients, PlatformEndpoints};
    use pulseboard_llm::LlmService;
    use tower::ServiceExt;

    use super::{build_app, AppState};
    use crate::middleware::{AuthState, RateLimitState};

    pub(crate) fn clients() -> OAuthClients {
        let creds = |id: &str| {
            Some(OAuthClientCredentials {
                client_id: id.to_owned(),
                client_secret: format!("{id}-secret"),
            })
        };
        OAuthClients {
            meta: creds("meta-app"),
            linkedin: creds("li-app"),
            google: None,
            public_url: "https://pulse.example.com".to_owned(),
        }
    }

    /// App whose adapters all talk to `upstream` and whose LLM registry is
    /// `llm`.
    pub(crate) fn app(pool: sqlx::PgPool, upstream: &str, llm: LlmService) -> Router {
        let factory = IntegrationFactory::with_endpoints(
            clients(),
            reqwest::Client::new(),
            PlatformEndpoints::all_at(upstream),
        );
        let state = AppState {
            pool,
            factory: Arc::new(factory),
            llm: Arc::new(llm),
        };
        build_app(state, AuthState::disabled(), RateLimitState::per_minute(1_000))
    }

    pub(crate) async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json parse")
        };
        (status, json)
    }
}
