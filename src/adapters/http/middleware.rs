use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppError,
    domain::entities::{api_key::Capability, api_key::PermissionSet, usage_log::NewUsageLogEntry},
};

/// Header carrying the plaintext secret on every API-authenticated call.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Context attached to the request for downstream handlers once the gate has
/// authorized the call.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub key_id: i64,
    pub owner_id: i64,
    pub permissions: PermissionSet,
}

/// Authorization gate for the API-key-authenticated namespaces.
///
/// Every request that reaches the gate produces exactly one usage-log entry,
/// whether it was authorized, denied, or failed inside the handler. The log
/// write has its own error boundary and never alters the response.
pub async fn api_key_gate(
    State(app_state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let endpoint = uri.path().to_string();
    let request_ip = client_ip(&request, app_state.config.trust_proxy);
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    // Wrapped in SecretString immediately; the raw value is never logged.
    let presented: Option<SecretString> = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| SecretString::from(s.to_string()));

    let mut api_key_id = None;

    let response = match presented {
        None => AppError::MissingApiKey.into_response(),
        Some(secret) => {
            match app_state
                .api_key_use_cases
                .validate(secret.expose_secret())
                .await
            {
                // Unknown, disabled, and expired keys are indistinguishable
                // to the caller.
                None => AppError::InvalidApiKey.into_response(),
                Some(key) => {
                    api_key_id = Some(key.id);
                    let capability = required_capability(&endpoint, &method);
                    if key.permissions.allows(capability) {
                        request.extensions_mut().insert(ApiKeyContext {
                            key_id: key.id,
                            owner_id: key.owner_id,
                            permissions: key.permissions,
                        });
                        next.run(request).await
                    } else {
                        AppError::Forbidden(capability).into_response()
                    }
                }
            }
        }
    };

    let entry = NewUsageLogEntry {
        api_key_id,
        endpoint,
        method: method.to_string(),
        status_code: response.status().as_u16() as i32,
        response_time_ms: start.elapsed().as_millis() as i64,
        request_ip,
        user_agent,
    };
    // `record` swallows store failures; the response is already final.
    app_state.usage_use_cases.record(entry).await;

    response
}

/// Fixed namespace table: posts and users split read/write by method class,
/// admin requires the admin flag regardless of method. Gated paths outside
/// the table fail closed by requiring admin.
fn required_capability(path: &str, method: &Method) -> Capability {
    let rest = path.strip_prefix("/api/v1").unwrap_or(path);
    let namespace = rest.trim_start_matches('/').split('/').next().unwrap_or("");
    let mutating = !matches!(*method, Method::GET | Method::HEAD);

    match namespace {
        "posts" if mutating => Capability::WritePosts,
        "posts" => Capability::ReadPosts,
        "users" if mutating => Capability::WriteUsers,
        "users" => Capability::ReadUsers,
        _ => Capability::Admin,
    }
}

fn client_ip(request: &Request, trust_proxy: bool) -> String {
    // Only trust forwarded headers if explicitly configured (when behind a
    // reverse proxy).
    if trust_proxy && let Some(ip) = forwarded_ip(request) {
        return ip;
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_ip(req: &Request) -> Option<String> {
    // Extract IP from X-Forwarded-For or X-Real-IP headers
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let trimmed = first.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    if let Some(real) = req.headers().get("x-real-ip")
        && let Ok(val) = real.to_str()
        && !val.trim().is_empty()
    {
        return Some(val.trim().to_string());
    }
    None
}
