//! Test app state builder for HTTP-level integration testing.
//!
//! Creates a minimal `AppState` backed by in-memory mocks for testing the
//! authorization gate and the dashboard routes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use chrono::{DateTime, Utc};

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{api_key::ApiKeyUseCases, usage::UsageUseCases},
    domain::entities::api_key::PermissionSet,
    infra::config::AppConfig,
    test_utils::{InMemoryApiKeyRepo, InMemoryUsageLogRepo},
};

/// Builder for creating `AppState` with in-memory mocks.
///
/// # Example
///
/// ```ignore
/// let (app_state, _, logs) = TestAppStateBuilder::new()
///     .with_key(1, "a1b2c3d4e5f6...", PermissionSet::default(), None)
///     .build_with_mocks();
/// ```
pub struct TestAppStateBuilder {
    // (owner_id, raw_secret, permissions, expires_at)
    keys: Vec<(i64, String, PermissionSet, Option<DateTime<Utc>>)>,
    trust_proxy: bool,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            keys: vec![],
            trust_proxy: false,
        }
    }

    /// Seed an API key from a known raw secret so tests can present it.
    pub fn with_key(
        mut self,
        owner_id: i64,
        raw_secret: &str,
        permissions: PermissionSet,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.keys
            .push((owner_id, raw_secret.to_string(), permissions, expires_at));
        self
    }

    pub fn with_trust_proxy(mut self) -> Self {
        self.trust_proxy = true;
        self
    }

    /// Build the AppState, returning the mock repos for test assertions.
    pub fn build_with_mocks(
        self,
    ) -> (AppState, Arc<InMemoryApiKeyRepo>, Arc<InMemoryUsageLogRepo>) {
        let key_repo = Arc::new(InMemoryApiKeyRepo::new());
        for (owner_id, raw_secret, permissions, expires_at) in &self.keys {
            key_repo.seed_key(*owner_id, raw_secret, *permissions, *expires_at);
        }

        let usage_repo = Arc::new(InMemoryUsageLogRepo::new());

        let config = Arc::new(AppConfig {
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            database_url: String::new(),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            trust_proxy: self.trust_proxy,
        });

        let app_state = AppState {
            config,
            api_key_use_cases: Arc::new(ApiKeyUseCases::new(key_repo.clone())),
            usage_use_cases: Arc::new(UsageUseCases::new(usage_repo.clone())),
        };

        (app_state, key_repo, usage_repo)
    }

    pub fn build(self) -> AppState {
        self.build_with_mocks().0
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
