//! Platform metadata and the first leg of the OAuth connect flow.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use pulseboard_core::PlatformType;
use pulseboard_integrations::{
    generate_oauth_state, IntegrationError, IntegrationFactory, PlatformInfo,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct AuthorizeQuery {
    pub organization_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(super) struct AuthorizeResponse {
    url: String,
    state: String,
    organization_id: Uuid,
}

pub(super) async fn list_platforms(
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<PlatformInfo>>> {
    Json(ApiResponse::new(IntegrationFactory::platforms(), req_id.0))
}

/// GET /api/v1/oauth/{platform}/authorize?organization_id=
///
/// The returned `state` must be echoed back by the caller when the code is
/// exchanged; it is not persisted server-side.
pub(super) async fn authorize(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(platform): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<ApiResponse<AuthorizeResponse>>, ApiError> {
    let rid = &req_id.0;
    let platform_type = parse_platform(rid, &platform)?;
    let nonce = generate_oauth_state();

    let url = state
        .factory
        .authorization_url(platform_type, &nonce)
        .map_err(|e| map_integration_error(rid, &e))?;

    tracing::info!(
        platform = platform_type.as_str(),
        organization_id = %query.organization_id,
        "issued OAuth authorization URL"
    );

    Ok(Json(ApiResponse::new(
        AuthorizeResponse {
            url: url.to_string(),
            state: nonce,
            organization_id: query.organization_id,
        },
        req_id.0,
    )))
}

pub(super) fn parse_platform(request_id: &str, value: &str) -> Result<PlatformType, ApiError> {
    value.parse().map_err(|_| {
        ApiError::new(
            request_id,
            "validation_error",
            format!("unsupported platform type '{value}'"),
        )
    })
}

/// Client-side misconfiguration maps to 400, anything from upstream to 502.
pub(super) fn map_integration_error(request_id: &str, error: &IntegrationError) -> ApiError {
    match error {
        IntegrationError::UnsupportedPlatform(_) | IntegrationError::MissingClientCredentials(_) => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        IntegrationError::Persistence(db) => super::map_db_error(request_id.to_owned(), db),
        _ => {
            tracing::warn!(error = %error, "upstream platform call failed");
            ApiError::new(request_id, "upstream_error", error.to_string())
        }
    }
}
