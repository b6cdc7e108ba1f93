use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        api_key::{ApiKeyRepo, ApiKeyUseCases},
        usage::{UsageLogRepo, UsageUseCases},
    },
    infra::{config::AppConfig, postgres_persistence},
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let api_key_repo = postgres_arc.clone() as Arc<dyn ApiKeyRepo>;
    let usage_log_repo = postgres_arc as Arc<dyn UsageLogRepo>;

    Ok(AppState {
        config: Arc::new(config),
        api_key_use_cases: Arc::new(ApiKeyUseCases::new(api_key_repo)),
        usage_use_cases: Arc::new(UsageUseCases::new(usage_log_repo)),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pressgate=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let json_layer = File::create("app.log").ok().map(|file| {
        fmt::layer()
            .json()
            .with_writer(file)
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
