use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::api_key::{ApiKeyPatch, ApiKeyRepo},
    domain::entities::api_key::{ApiKey, PermissionSet},
};

const API_KEY_COLUMNS: &str = "id, owner_id, name, key_prefix, key_digest, permissions, \
     enabled, expires_at, last_used_at, created_at, updated_at";

fn row_to_api_key(row: sqlx::postgres::PgRow) -> ApiKey {
    let id: i64 = row.get("id");
    let permissions: serde_json::Value = row.get("permissions");

    ApiKey {
        id,
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        key_prefix: row.get("key_prefix"),
        key_digest: row.get("key_digest"),
        permissions: parse_json_with_fallback(
            &permissions,
            "permissions",
            "api_key",
            &id.to_string(),
        ),
        enabled: row.get("enabled"),
        expires_at: row.get("expires_at"),
        last_used_at: row.get("last_used_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn permissions_json(permissions: &PermissionSet) -> AppResult<serde_json::Value> {
    serde_json::to_value(permissions)
        .map_err(|err| AppError::Internal(format!("failed to encode permissions: {err}")))
}

#[async_trait]
impl ApiKeyRepo for PostgresPersistence {
    async fn create(
        &self,
        owner_id: i64,
        name: &str,
        key_prefix: &str,
        key_digest: &str,
        permissions: PermissionSet,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<ApiKey> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO api_keys (owner_id, name, key_prefix, key_digest, permissions, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {API_KEY_COLUMNS}
            "#,
        ))
        .bind(owner_id)
        .bind(name)
        .bind(key_prefix)
        .bind(key_digest)
        .bind(permissions_json(&permissions)?)
        .bind(expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row_to_api_key(row))
    }

    async fn find_active(
        &self,
        key_prefix: &str,
        key_digest: &str,
    ) -> AppResult<Option<ApiKey>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {API_KEY_COLUMNS}
            FROM api_keys
            WHERE key_prefix = $1 AND key_digest = $2 AND enabled = TRUE
            "#,
        ))
        .bind(key_prefix)
        .bind(key_digest)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_api_key))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<ApiKey>> {
        let row = sqlx::query(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_api_key))
    }

    async fn update(&self, id: i64, patch: ApiKeyPatch) -> AppResult<ApiKey> {
        let permissions = match &patch.permissions {
            Some(p) => Some(permissions_json(p)?),
            None => None,
        };
        // expires_at distinguishes "leave alone" from "set to NULL", so it
        // cannot ride the COALESCE used for the other fields.
        let (set_expiry, expires_at) = match patch.expires_at {
            Some(value) => (true, value),
            None => (false, None),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE api_keys
            SET name = COALESCE($2, name),
                permissions = COALESCE($3, permissions),
                enabled = COALESCE($4, enabled),
                expires_at = CASE WHEN $5 THEN $6 ELSE expires_at END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING {API_KEY_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(patch.name)
        .bind(permissions)
        .bind(patch.enabled)
        .bind(set_expiry)
        .bind(expires_at)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_api_key).ok_or(AppError::NotFound)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_owner(&self, owner_id: i64) -> AppResult<Vec<ApiKey>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {API_KEY_COLUMNS}
            FROM api_keys
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        ))
        .bind(owner_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_api_key).collect())
    }

    async fn update_last_used(&self, id: i64) -> AppResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(())
    }
}
