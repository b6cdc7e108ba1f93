//! In-memory mock implementations of the persistence traits.
//!
//! These back unit tests of the use cases and HTTP-level integration tests
//! of the gate and dashboard routes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::api_key::{
    ApiKeyPatch, ApiKeyRepo, PREFIX_LEN, digest_secret,
};
use crate::application::use_cases::usage::{UsageFilter, UsageLogRepo, UsageStats};
use crate::domain::entities::api_key::{ApiKey, PermissionSet};
use crate::domain::entities::usage_log::{NewUsageLogEntry, UsageLogEntry};

// ============================================================================
// InMemoryApiKeyRepo
// ============================================================================

/// In-memory implementation of `ApiKeyRepo` for testing.
#[derive(Default)]
pub struct InMemoryApiKeyRepo {
    keys: Mutex<HashMap<i64, ApiKey>>,
    next_id: AtomicI64,
    fail_lookups: bool,
}

impl InMemoryApiKeyRepo {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            fail_lookups: false,
        }
    }

    /// A repo whose lookups always fail, for exercising the fail-closed
    /// contract of validation.
    pub fn failing() -> Self {
        Self {
            fail_lookups: true,
            ..Self::new()
        }
    }

    /// Seed a key from a known raw secret so tests can authenticate with it.
    pub fn seed_key(
        &self,
        owner_id: i64,
        raw_secret: &str,
        permissions: PermissionSet,
        expires_at: Option<DateTime<Utc>>,
    ) -> ApiKey {
        let now = Utc::now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let prefix = raw_secret.get(..PREFIX_LEN).unwrap_or(raw_secret);

        let key = ApiKey {
            id,
            owner_id,
            name: "Test Key".to_string(),
            key_prefix: prefix.to_string(),
            key_digest: digest_secret(raw_secret),
            permissions,
            enabled: true,
            expires_at,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };

        self.keys.lock().unwrap().insert(id, key.clone());
        key
    }
}

#[async_trait]
impl ApiKeyRepo for InMemoryApiKeyRepo {
    async fn create(
        &self,
        owner_id: i64,
        name: &str,
        key_prefix: &str,
        key_digest: &str,
        permissions: PermissionSet,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<ApiKey> {
        let now = Utc::now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let key = ApiKey {
            id,
            owner_id,
            name: name.to_string(),
            key_prefix: key_prefix.to_string(),
            key_digest: key_digest.to_string(),
            permissions,
            enabled: true,
            expires_at,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };

        self.keys.lock().unwrap().insert(id, key.clone());
        Ok(key)
    }

    async fn find_active(
        &self,
        key_prefix: &str,
        key_digest: &str,
    ) -> AppResult<Option<ApiKey>> {
        if self.fail_lookups {
            return Err(AppError::Database("lookup failed".into()));
        }

        Ok(self
            .keys
            .lock()
            .unwrap()
            .values()
            .find(|k| k.enabled && k.key_prefix == key_prefix && k.key_digest == key_digest)
            .cloned())
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<ApiKey>> {
        Ok(self.keys.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, id: i64, patch: ApiKeyPatch) -> AppResult<ApiKey> {
        let mut keys = self.keys.lock().unwrap();
        let key = keys.get_mut(&id).ok_or(AppError::NotFound)?;

        if let Some(name) = patch.name {
            key.name = name;
        }
        if let Some(permissions) = patch.permissions {
            key.permissions = permissions;
        }
        if let Some(enabled) = patch.enabled {
            key.enabled = enabled;
        }
        if let Some(expires_at) = patch.expires_at {
            key.expires_at = expires_at;
        }
        key.updated_at = Utc::now();

        Ok(key.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        Ok(self.keys.lock().unwrap().remove(&id).is_some())
    }

    async fn list_by_owner(&self, owner_id: i64) -> AppResult<Vec<ApiKey>> {
        let mut keys: Vec<ApiKey> = self
            .keys
            .lock()
            .unwrap()
            .values()
            .filter(|k| k.owner_id == owner_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(keys)
    }

    async fn update_last_used(&self, id: i64) -> AppResult<()> {
        let mut keys = self.keys.lock().unwrap();
        if let Some(key) = keys.get_mut(&id) {
            key.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryUsageLogRepo
// ============================================================================

/// In-memory implementation of `UsageLogRepo` for testing.
pub struct InMemoryUsageLogRepo {
    entries: Mutex<Vec<UsageLogEntry>>,
    next_id: AtomicI64,
    fail_inserts: bool,
}

impl InMemoryUsageLogRepo {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail_inserts: false,
        }
    }

    /// A repo whose inserts always fail, for exercising the swallowed-error
    /// contract of usage recording.
    pub fn failing() -> Self {
        Self {
            fail_inserts: true,
            ..Self::new()
        }
    }

    /// Snapshot of all entries, oldest first (insertion order).
    pub fn entries(&self) -> Vec<UsageLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    fn matches(entry: &UsageLogEntry, filter: &UsageFilter) -> bool {
        if let Some(key_id) = filter.api_key_id
            && entry.api_key_id != Some(key_id)
        {
            return false;
        }
        if let Some(start) = filter.start_date
            && entry.created_at < start
        {
            return false;
        }
        if let Some(end) = filter.end_date
            && entry.created_at > end
        {
            return false;
        }
        true
    }
}

impl Default for InMemoryUsageLogRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageLogRepo for InMemoryUsageLogRepo {
    async fn insert(&self, entry: NewUsageLogEntry) -> AppResult<()> {
        if self.fail_inserts {
            return Err(AppError::Database("insert failed".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().push(UsageLogEntry {
            id,
            api_key_id: entry.api_key_id,
            endpoint: entry.endpoint,
            method: entry.method,
            status_code: entry.status_code,
            response_time_ms: entry.response_time_ms,
            request_ip: entry.request_ip,
            user_agent: entry.user_agent,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn stats(&self, filter: &UsageFilter) -> AppResult<UsageStats> {
        let entries = self.entries.lock().unwrap();
        let matching: Vec<&UsageLogEntry> =
            entries.iter().filter(|e| Self::matches(e, filter)).collect();

        if matching.is_empty() {
            return Ok(UsageStats::empty());
        }

        let total = matching.len() as i64;
        let successes = matching.iter().filter(|e| e.status_code < 400).count() as f64;
        let total_ms: i64 = matching.iter().map(|e| e.response_time_ms).sum();

        let mut requests_by_endpoint = std::collections::HashMap::new();
        for entry in &matching {
            *requests_by_endpoint.entry(entry.endpoint.clone()).or_insert(0) += 1;
        }

        Ok(UsageStats {
            total_requests: total,
            success_rate: successes / total as f64 * 100.0,
            avg_response_time_ms: total_ms as f64 / total as f64,
            requests_by_endpoint,
        })
    }

    async fn list(
        &self,
        filter: &UsageFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<UsageLogEntry>> {
        let entries = self.entries.lock().unwrap();
        let mut matching: Vec<UsageLogEntry> = entries
            .iter()
            .filter(|e| Self::matches(e, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}
