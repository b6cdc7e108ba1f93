use std::sync::Arc;

use crate::{
    application::use_cases::{api_key::ApiKeyUseCases, usage::UsageUseCases},
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub api_key_use_cases: Arc<ApiKeyUseCases>,
    pub usage_use_cases: Arc<UsageUseCases>,
}
