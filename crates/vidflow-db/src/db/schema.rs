//! Startup schema check.
//!
//! Migrations run before this; the check only confirms the columns the
//! repositories rely on are present, so drift fails the process at boot
//! instead of individual requests later.

use sqlx::PgPool;
use vidflow_core::AppError;

/// Tables and the columns each must expose.
pub const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "video_assets",
        &[
            "local_id",
            "external_asset_id",
            "external_playback_id",
            "external_upload_id",
            "lifecycle_state",
            "thumbnail_url",
            "stream_url",
            "download_url",
            "duration_seconds",
            "aspect_ratio",
            "source_object_key",
            "title",
            "error_reason",
            "poster_url",
            "poster_strategy",
            "created_at",
            "updated_at",
            "ready_at",
        ],
    ),
    (
        "orphaned_webhook_events",
        &["id", "event_type", "object_id", "payload", "received_at"],
    ),
];

/// Columns listed in `required` but absent from `present`.
pub fn missing_columns(required: &[&str], present: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|col| !present.iter().any(|p| p == *col))
        .map(|col| col.to_string())
        .collect()
}

/// Fail with a configuration error when the database does not match `REQUIRED_SCHEMA`.
#[tracing::instrument(skip(pool))]
pub async fn verify_schema(pool: &PgPool) -> Result<(), AppError> {
    let mut problems = Vec::new();

    for (table, required) in REQUIRED_SCHEMA {
        let present: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            "#,
        )
        .bind(*table)
        .fetch_all(pool)
        .await?;

        if present.is_empty() {
            problems.push(format!("table {} is missing", table));
            continue;
        }

        let missing = missing_columns(required, &present);
        if !missing.is_empty() {
            problems.push(format!("{} is missing columns: {}", table, missing.join(", ")));
        }
    }

    if problems.is_empty() {
        tracing::info!("Database schema verified");
        Ok(())
    } else {
        Err(AppError::Configuration(format!(
            "Database schema is out of date ({}); run migrations",
            problems.join("; ")
        )))
    }
}
