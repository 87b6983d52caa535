//! Service wiring for production: Postgres repositories, configured storage
//! and the HTTP provider client.

use crate::state::{AppSettings, AppState, Collaborators};
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use vidflow_core::Config;
use vidflow_db::{OrphanedEventRepository, VideoAssetRepository};
use vidflow_provider::HttpProviderClient;
use vidflow_storage::Storage;

pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let provider =
        HttpProviderClient::from_config(config).context("Failed to build provider client")?;

    let collaborators = Collaborators {
        store: Arc::new(VideoAssetRepository::new(pool.clone())),
        orphans: Arc::new(OrphanedEventRepository::new(pool.clone())),
        provider: Arc::new(provider),
        storage,
        pool: Some(pool),
    };

    let state = AppState::assemble(collaborators, AppSettings::from_config(config));
    tracing::info!("Services initialized");
    Ok(state)
}
