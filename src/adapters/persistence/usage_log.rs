use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::usage::{UsageFilter, UsageLogRepo, UsageStats},
    domain::entities::usage_log::{NewUsageLogEntry, UsageLogEntry},
};

fn row_to_entry(row: sqlx::postgres::PgRow) -> UsageLogEntry {
    UsageLogEntry {
        id: row.get("id"),
        api_key_id: row.get("api_key_id"),
        endpoint: row.get("endpoint"),
        method: row.get("method"),
        status_code: row.get("status_code"),
        response_time_ms: row.get("response_time_ms"),
        request_ip: row.get("request_ip"),
        user_agent: row.get("user_agent"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl UsageLogRepo for PostgresPersistence {
    async fn insert(&self, entry: NewUsageLogEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_usage_logs
                (api_key_id, endpoint, method, status_code, response_time_ms, request_ip, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.api_key_id)
        .bind(&entry.endpoint)
        .bind(&entry.method)
        .bind(entry.status_code)
        .bind(entry.response_time_ms)
        .bind(&entry.request_ip)
        .bind(&entry.user_agent)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn stats(&self, filter: &UsageFilter) -> AppResult<UsageStats> {
        let totals = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status_code < 400) AS successes,
                   COALESCE(AVG(response_time_ms), 0)::DOUBLE PRECISION AS avg_ms
            FROM api_usage_logs
            WHERE ($1::BIGINT IS NULL OR api_key_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at <= $3)
            "#,
        )
        .bind(filter.api_key_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        let total: i64 = totals.get("total");
        if total == 0 {
            return Ok(UsageStats::empty());
        }
        let successes: i64 = totals.get("successes");
        let avg_ms: f64 = totals.get("avg_ms");

        let rows = sqlx::query(
            r#"
            SELECT endpoint, COUNT(*) AS requests
            FROM api_usage_logs
            WHERE ($1::BIGINT IS NULL OR api_key_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at <= $3)
            GROUP BY endpoint
            "#,
        )
        .bind(filter.api_key_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        let requests_by_endpoint: HashMap<String, i64> = rows
            .into_iter()
            .map(|row| (row.get("endpoint"), row.get("requests")))
            .collect();

        Ok(UsageStats {
            total_requests: total,
            success_rate: successes as f64 / total as f64 * 100.0,
            avg_response_time_ms: avg_ms,
            requests_by_endpoint,
        })
    }

    async fn list(
        &self,
        filter: &UsageFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<UsageLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, api_key_id, endpoint, method, status_code, response_time_ms,
                   request_ip, user_agent, created_at
            FROM api_usage_logs
            WHERE ($1::BIGINT IS NULL OR api_key_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at <= $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.api_key_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_entry).collect())
    }
}
