use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app_error::AppResult;
use crate::domain::entities::usage_log::{NewUsageLogEntry, UsageLogEntry};

/// Hard cap on a single log page; the dashboard paginates with "load more".
const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 50;

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait UsageLogRepo: Send + Sync {
    /// Append-only insert; entries are never mutated afterwards.
    async fn insert(&self, entry: NewUsageLogEntry) -> AppResult<()>;

    async fn stats(&self, filter: &UsageFilter) -> AppResult<UsageStats>;

    /// Matching entries, newest first.
    async fn list(
        &self,
        filter: &UsageFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<UsageLogEntry>>;
}

#[derive(Debug, Clone, Default)]
pub struct UsageFilter {
    pub api_key_id: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Summary statistics over a window of usage-log entries.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_requests: i64,
    /// Percentage (0-100) of entries with status < 400. Zero when empty.
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    /// Grouped by exact endpoint string; path parameters are not normalized,
    /// matching the dashboard's "view by endpoint" display.
    pub requests_by_endpoint: HashMap<String, i64>,
}

impl UsageStats {
    pub fn empty() -> Self {
        Self {
            total_requests: 0,
            success_rate: 0.0,
            avg_response_time_ms: 0.0,
            requests_by_endpoint: HashMap::new(),
        }
    }
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct UsageUseCases {
    repo: Arc<dyn UsageLogRepo>,
}

impl UsageUseCases {
    pub fn new(repo: Arc<dyn UsageLogRepo>) -> Self {
        Self { repo }
    }

    /// Append one usage record. Logging is observability, not business
    /// logic: store failures are reported to tracing and swallowed, so the
    /// response already computed for the caller is never affected.
    pub async fn record(&self, entry: NewUsageLogEntry) {
        if let Err(err) = self.repo.insert(entry).await {
            tracing::error!(error = %err, "Failed to write API usage log entry");
        }
    }

    pub async fn get_stats(&self, filter: &UsageFilter) -> AppResult<UsageStats> {
        self.repo.stats(filter).await
    }

    pub async fn get_logs(
        &self,
        filter: &UsageFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Vec<UsageLogEntry>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        self.repo.list(filter, limit, offset).await
    }
}
