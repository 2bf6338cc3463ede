//! Application setup and initialization

pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use handoff_core::Config;
use handoff_store::StoreSweeper;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Initialize the entire application: telemetry, state, background sweep and routes.
pub fn initialize_app(
    config: Config,
    shutdown: CancellationToken,
) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(&config.environment)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let state = Arc::new(AppState::new(config.clone()));

    StoreSweeper::new(state.store.clone(), config.sweep_interval).start(shutdown);

    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
