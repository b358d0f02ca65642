//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use crate::envelope::{self, Attribution};
use crate::services::{NoopNotifier, Notifier, TelegramNotifier};
use crate::state::AppState;
use anyhow::{Context, Result};
use kabox_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    crate::telemetry::init_telemetry(json_logs);

    validation::validate_config(&config).context("Configuration validation failed")?;
    tracing::info!(environment = %config.environment(), "Configuration loaded and validated");

    let storage = storage::setup_storage(&config).await?;
    let databases = database::setup_databases(&config).await?;
    let notifier = setup_notifier(&config)?;

    let state = Arc::new(AppState::new(config.clone(), storage, databases, notifier));
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

fn setup_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    match config.telegram() {
        Some(settings) => {
            tracing::info!("Telegram notifications enabled");
            Ok(Arc::new(TelegramNotifier::new(settings)?))
        }
        None => {
            tracing::info!("Telegram notifications disabled");
            Ok(Arc::new(NoopNotifier))
        }
    }
}

/// Install response attribution. Called by route setup so tests get it too.
pub(crate) fn install_attribution(config: &Config) {
    envelope::install(Attribution::from_config(config));
}
