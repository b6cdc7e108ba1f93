use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::usage::UsageFilter,
};

/// Usage reporting for the dashboard, nested under `/api/dashboard/usage`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/logs", get(get_logs))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StatsQuery {
    api_key_id: Option<i64>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LogsQuery {
    api_key_id: Option<i64>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// GET /api/dashboard/usage/stats
async fn get_stats(
    State(app_state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> AppResult<impl IntoResponse> {
    let stats = app_state
        .usage_use_cases
        .get_stats(&UsageFilter {
            api_key_id: query.api_key_id,
            start_date: query.start_date,
            end_date: query.end_date,
        })
        .await?;
    Ok(Json(stats))
}

/// GET /api/dashboard/usage/logs
async fn get_logs(
    State(app_state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> AppResult<impl IntoResponse> {
    let logs = app_state
        .usage_use_cases
        .get_logs(
            &UsageFilter {
                api_key_id: query.api_key_id,
                start_date: query.start_date,
                end_date: query.end_date,
            },
            query.limit,
            query.offset,
        )
        .await?;
    Ok(Json(serde_json::json!({ "logs": logs })))
}
