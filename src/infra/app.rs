use axum::{Router, http, middleware};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::api_key_gate, routes},
    infra::setup::init_tracing,
};

/// Puts a router of gated namespaces behind the key gate. A panic inside a
/// mounted handler becomes a plain 500 beneath the gate, so the gate always
/// observes a response and writes its usage-log row.
pub fn apply_api_gate(router: Router<AppState>, app_state: AppState) -> Router<AppState> {
    router
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(app_state, api_key_gate))
}

pub fn create_app(app_state: AppState) -> Router {
    init_tracing();

    let cors = CorsLayer::new()
        .allow_origin(app_state.config.cors_origin.clone())
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::PUT,
            http::Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);

    // Only the /api/v1 namespaces sit behind the key gate; the dashboard
    // surface is session-authenticated upstream by the BFF.
    let gated = apply_api_gate(routes::content::router(), app_state.clone());

    Router::new()
        .nest("/api/v1", gated)
        .nest("/api/dashboard", routes::dashboard_router())
        .with_state(app_state)
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http-request",
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    request_id = %request_id
                )
            }),
        )
}
