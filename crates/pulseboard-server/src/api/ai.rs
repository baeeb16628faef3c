//! AI-assisted content suggestions and analytics insights.
//!
//! Generation itself never fails once a provider is registered: an
//! unusable model response yields an empty list or the placeholder insight.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use pulseboard_llm::{AnalyticsInsight, ContentSuggestion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ContentSuggestionsRequest {
    #[serde(default)]
    pub analytics_data: Value,
    #[serde(default)]
    pub objectives: Value,
    #[serde(default)]
    pub competitor_data: Value,
    pub provider: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct InsightsRequest {
    #[serde(default)]
    pub metrics: Value,
    #[serde(default)]
    pub platform_data: Value,
    pub provider: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProvidersResponse {
    available: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub(super) struct SuggestionBatch {
    id: i64,
    provider: String,
    suggestions: Value,
    created_at: DateTime<Utc>,
}

fn require_provider(state: &AppState, request_id: &str, provider: &str) -> Result<(), ApiError> {
    if state.llm.is_provider_available(provider) {
        Ok(())
    } else {
        Err(ApiError::new(
            request_id,
            "validation_error",
            format!("AI provider '{provider}' is not configured"),
        ))
    }
}

pub(super) async fn list_providers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<ProvidersResponse>> {
    Json(ApiResponse::new(
        ProvidersResponse {
            available: state.llm.available_providers(),
        },
        req_id.0,
    ))
}

/// POST /api/v1/organizations/{organization_id}/ai/content-suggestions
///
/// Non-empty results are stored as one batch for the organization.
pub(super) async fn generate_content_suggestions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(organization_id): Path<Uuid>,
    Json(body): Json<ContentSuggestionsRequest>,
) -> Result<Json<ApiResponse<Vec<ContentSuggestion>>>, ApiError> {
    let rid = &req_id.0;
    require_provider(&state, rid, &body.provider)?;

    let suggestions = state
        .llm
        .generate_content_suggestions(
            &body.analytics_data,
            &body.objectives,
            &body.competitor_data,
            &body.provider,
        )
        .await;

    if !suggestions.is_empty() {
        let payload = serde_json::to_value(&suggestions).map_err(|e| {
            tracing::error!(error = %e, "failed to encode suggestions");
            ApiError::new(rid, "internal_error", "failed to encode suggestions")
        })?;
        pulseboard_db::insert_content_suggestions(
            &state.pool,
            organization_id,
            &body.provider,
            &payload,
        )
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    }

    tracing::info!(
        %organization_id,
        provider = %body.provider,
        count = suggestions.len(),
        "content suggestions generated"
    );

    Ok(Json(ApiResponse::new(suggestions, req_id.0)))
}

/// GET /api/v1/organizations/{organization_id}/ai/content-suggestions
pub(super) async fn list_content_suggestions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(organization_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<SuggestionBatch>>>, ApiError> {
    let rows = pulseboard_db::list_content_suggestions(
        &state.pool,
        organization_id,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| SuggestionBatch {
            id: row.id,
            provider: row.provider,
            suggestions: row.payload,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// POST /api/v1/organizations/{organization_id}/ai/insights
pub(super) async fn generate_insights(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(organization_id): Path<Uuid>,
    Json(body): Json<InsightsRequest>,
) -> Result<Json<ApiResponse<AnalyticsInsight>>, ApiError> {
    require_provider(&state, &req_id.0, &body.provider)?;

    let insight = state
        .llm
        .generate_analytics_insights(&body.metrics, &body.platform_data, &body.provider)
        .await;

    tracing::info!(
        %organization_id,
        provider = %body.provider,
        "analytics insights generated"
    );

    Ok(Json(ApiResponse::new(insight, req_id.0)))
}
