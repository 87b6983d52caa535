//! Storage backend setup

use anyhow::{Context, Result};
use std::sync::Arc;
use vidflow_core::Config;
use vidflow_storage::{create_storage, Storage};

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;
    tracing::info!(backend = %storage.backend(), "Storage backend ready");
    Ok(storage)
}
