use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::{
    adapters::http::{app_state::AppState, middleware::ApiKeyContext},
    app_error::AppResult,
    application::use_cases::usage::UsageFilter,
};

/// Gated namespaces under `/api/v1`. The CMS mounts its real post and user
/// handlers over these routes in its own deployment; the placeholders here
/// keep every namespace routable so the gate's capability table is exercised
/// end to end. The admin namespace is real: it serves usage statistics to
/// admin-capable keys.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(placeholder).post(placeholder))
        .route(
            "/posts/{id}",
            get(placeholder).put(placeholder).delete(placeholder),
        )
        .route("/users", get(placeholder).post(placeholder))
        .route(
            "/users/{id}",
            get(placeholder).put(placeholder).delete(placeholder),
        )
        .route("/admin/usage/stats", get(admin_usage_stats))
}

/// Acknowledges the authorized call with the identity the gate attached.
async fn placeholder(Extension(ctx): Extension<ApiKeyContext>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "authorizedKeyId": ctx.key_id })),
    )
}

#[derive(serde::Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AdminStatsQuery {
    api_key_id: Option<i64>,
    start_date: Option<chrono::DateTime<chrono::Utc>>,
    end_date: Option<chrono::DateTime<chrono::Utc>>,
}

/// GET /api/v1/admin/usage/stats
async fn admin_usage_stats(
    State(app_state): State<AppState>,
    Query(query): Query<AdminStatsQuery>,
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
