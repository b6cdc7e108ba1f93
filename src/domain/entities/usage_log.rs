use chrono::{DateTime, Utc};
use serde::Serialize;

/// One immutable record of a single authenticated (or attempted) API call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogEntry {
    pub id: i64,
    /// Absent when the request never resolved to a key (missing/unknown key).
    pub api_key_id: Option<i64>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub request_ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// Payload for appending a log entry; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewUsageLogEntry {
    pub api_key_id: Option<i64>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub request_ip: String,
    pub user_agent: String,
}
