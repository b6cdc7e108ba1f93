use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::api_key::ApiKeyPatch,
    domain::entities::api_key::{ApiKey, PermissionSet},
};

/// Dashboard surface for key management, nested under
/// `/api/dashboard/{owner_id}/keys`. The dashboard BFF authenticates its
/// session upstream; this service scopes every operation to the owner in the
/// path.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_keys).post(create_key))
        .route("/{id}", patch(update_key).delete(delete_key))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateKeyPayload {
    name: String,
    permissions: Option<PermissionSet>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UpdateKeyPayload {
    name: Option<String>,
    permissions: Option<PermissionSet>,
    enabled: Option<bool>,
    /// Absent leaves the expiry untouched; an explicit `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    expires_at: Option<Option<DateTime<Utc>>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DateTime<Utc>>::deserialize(deserializer).map(Some)
}

/// Key metadata as shown to the dashboard. Never carries the digest; the
/// secret itself appears only in the create response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyResponse {
    id: i64,
    name: String,
    masked_key: String,
    permissions: PermissionSet,
    enabled: bool,
    expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            masked_key: key.masked(),
            name: key.name,
            permissions: key.permissions,
            enabled: key.enabled,
            expires_at: key.expires_at,
            last_used_at: key.last_used_at,
            created_at: key.created_at,
            updated_at: key.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateKeyResponse {
    key: ApiKeyResponse,
    /// Shown exactly once; loss is unrecoverable by design.
    secret: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/dashboard/{owner_id}/keys
async fn create_key(
    State(app_state): State<AppState>,
    Path(owner_id): Path<i64>,
    Json(payload): Json<CreateKeyPayload>,
) -> AppResult<impl IntoResponse> {
    let (key, secret) = app_state
        .api_key_use_cases
        .create_key(owner_id, &payload.name, payload.permissions, payload.expires_at)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateKeyResponse {
            key: key.into(),
            secret,
        }),
    ))
}

/// GET /api/dashboard/{owner_id}/keys
async fn list_keys(
    State(app_state): State<AppState>,
    Path(owner_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let keys = app_state.api_key_use_cases.list_keys(owner_id).await?;
    let keys: Vec<ApiKeyResponse> = keys.into_iter().map(Into::into).collect();
    Ok(Json(keys))
}

/// PATCH /api/dashboard/{owner_id}/keys/{id}
async fn update_key(
    State(app_state): State<AppState>,
    Path((owner_id, id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateKeyPayload>,
) -> AppResult<impl IntoResponse> {
    verify_key_ownership(&app_state, owner_id, id).await?;

    let key = app_state
        .api_key_use_cases
        .update_key(
            id,
            ApiKeyPatch {
                name: payload.name,
                permissions: payload.permissions,
                enabled: payload.enabled,
                expires_at: payload.expires_at,
            },
        )
        .await?;

    Ok(Json(ApiKeyResponse::from(key)))
}

/// DELETE /api/dashboard/{owner_id}/keys/{id}
async fn delete_key(
    State(app_state): State<AppState>,
    Path((owner_id, id)): Path<(i64, i64)>,
) -> AppResult<impl IntoResponse> {
    verify_key_ownership(&app_state, owner_id, id).await?;

    if !app_state.api_key_use_cases.delete_key(id).await? {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Keys of other owners are indistinguishable from missing ones.
async fn verify_key_ownership(app_state: &AppState, owner_id: i64, id: i64) -> AppResult<()> {
    let key = app_state.api_key_use_cases.get_key(id).await?;
    if key.owner_id != owner_id {
        return Err(AppError::NotFound);
    }
    Ok(())
}
