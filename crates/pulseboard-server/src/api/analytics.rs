use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, validate_date_range, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct AnalyticsQuery {
    pub data_stream_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub(super) struct AnalyticsItem {
    data_stream_id: Uuid,
    date: NaiveDate,
    metrics: Value,
    raw_data: Value,
}

/// GET /api/v1/organizations/{organization_id}/analytics
pub(super) async fn list_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(organization_id): Path<Uuid>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<Vec<AnalyticsItem>>>, ApiError> {
    validate_date_range(&req_id.0, query.start_date, query.end_date)?;

    let rows = pulseboard_db::list_analytics_data(
        &state.pool,
        organization_id,
        query.data_stream_id,
        query.start_date,
        query.end_date,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| AnalyticsItem {
            data_stream_id: row.data_stream_id,
            date: row.date,
            metrics: row.metrics,
            raw_data: row.raw_data,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}
