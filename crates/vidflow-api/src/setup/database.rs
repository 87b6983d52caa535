//! PostgreSQL pool, migrations and schema check.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use vidflow_core::Config;

const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Connect, migrate, and fail fast when `video_assets` or
/// `orphaned_webhook_events` lack a column the repositories read.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(config.database_url())
        .await
        .context("Cannot connect to DATABASE_URL")?;
    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database pool ready"
    );

    let migrator = sqlx::migrate!("../../migrations");
    migrator
        .run(&pool)
        .await
        .context("Applying migrations failed")?;
    tracing::info!(migrations = migrator.iter().count(), "Migrations up to date");

    vidflow_db::verify_schema(&pool)
        .await
        .context("Schema does not match what vidflow expects")?;

    Ok(pool)
}
