use axum::Router;

use crate::adapters::http::app_state::AppState;

pub mod api_keys;
pub mod content;
pub mod usage;

/// Session-authenticated dashboard surface, mounted at `/api/dashboard`.
pub fn dashboard_router() -> Router<AppState> {
    Router::new()
        .nest("/{owner_id}/keys", api_keys::router())
        .nest("/usage", usage::router())
}
