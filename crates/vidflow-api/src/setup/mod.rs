//! Startup wiring: configuration, telemetry, database, storage, services
//! and routes, in that order.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use vidflow_core::Config;

pub async fn initialize_app(config: &Config) -> Result<(Arc<AppState>, Router)> {
    crate::telemetry::init_telemetry(config.is_production())?;
    config.validate().context("Invalid configuration")?;
    tracing::info!(
        environment = %config.environment(),
        storage = ?config.storage_backend(),
        "Configuration validated"
    );

    let pool = database::setup_database(config).await?;
    let storage = storage::setup_storage(config).await?;
    let state = services::initialize_services(config, pool, storage)?;
    let router = routes::setup_routes(config, state.clone())?;

    Ok((state, router))
}
