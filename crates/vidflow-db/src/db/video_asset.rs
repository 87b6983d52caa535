use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use vidflow_core::models::{
    DerivedUrls, LifecycleState, NewVideoAsset, ThumbnailSource, VideoAsset, VideoAssetUpdate,
};
use vidflow_core::AppError;

/// Unique index backing the one-record-per-remote-asset rule.
pub const EXTERNAL_ASSET_ID_INDEX: &str = "video_assets_external_asset_id_key";

/// Narrow persistence interface for video asset records.
///
/// Every method is atomic at the row level. Writes that collide on
/// `external_asset_id` fail with [`AppError::DuplicateAsset`] so callers can
/// tell a lost creation race apart from other database failures.
#[async_trait]
pub trait VideoAssetStore: Send + Sync {
    /// Insert a record for an asset the provider has accepted. A retry with the
    /// same `local_id` converges on the existing row.
    async fn upsert_by_external_id(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError>;

    /// Insert a record that has no remote asset yet (upload slot path).
    async fn insert_pending(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError>;

    async fn find_by_external_id(
        &self,
        external_asset_id: &str,
    ) -> Result<Option<VideoAsset>, AppError>;

    async fn find_by_local_id(&self, local_id: Uuid) -> Result<Option<VideoAsset>, AppError>;

    async fn find_by_upload_id(
        &self,
        external_upload_id: &str,
    ) -> Result<Option<VideoAsset>, AppError>;

    /// Apply a partial update. Returns `None` when the row does not exist or
    /// its current state fails the update's state guard.
    async fn update_fields(
        &self,
        local_id: Uuid,
        update: &VideoAssetUpdate,
    ) -> Result<Option<VideoAsset>, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct VideoAssetRow {
    local_id: Uuid,
    external_asset_id: Option<String>,
    external_playback_id: Option<String>,
    external_upload_id: Option<String>,
    lifecycle_state: LifecycleState,
    thumbnail_url: Option<String>,
    stream_url: Option<String>,
    download_url: Option<String>,
    duration_seconds: Option<f64>,
    aspect_ratio: Option<String>,
    source_object_key: String,
    title: Option<String>,
    error_reason: Option<String>,
    poster_url: Option<String>,
    poster_strategy: Option<ThumbnailSource>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    ready_at: Option<DateTime<Utc>>,
}

impl From<VideoAssetRow> for VideoAsset {
    fn from(row: VideoAssetRow) -> Self {
        let derived_urls = match (
            row.external_playback_id.as_ref(),
            row.thumbnail_url,
            row.stream_url,
            row.download_url,
        ) {
            (Some(_), Some(thumbnail_url), Some(stream_url), Some(download_url)) => {
                Some(DerivedUrls {
                    thumbnail_url,
                    stream_url,
                    download_url,
                })
            }
            _ => None,
        };

        VideoAsset {
            local_id: row.local_id,
            external_asset_id: row.external_asset_id,
            external_playback_id: row.external_playback_id,
            external_upload_id: row.external_upload_id,
            lifecycle_state: row.lifecycle_state,
            derived_urls,
            duration_seconds: row.duration_seconds,
            aspect_ratio: row.aspect_ratio,
            source_object_key: row.source_object_key,
            title: row.title,
            error_reason: row.error_reason,
            poster_url: row.poster_url,
            poster_strategy: row.poster_strategy,
            created_at: row.created_at,
            updated_at: row.updated_at,
            ready_at: row.ready_at,
        }
    }
}

/// Map a write failure, surfacing collisions on the external asset id distinctly.
fn map_write_error(err: sqlx::Error, external_asset_id: Option<&str>) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            if db_err.constraint() == Some(EXTERNAL_ASSET_ID_INDEX) {
                return AppError::DuplicateAsset {
                    external_asset_id: external_asset_id.unwrap_or_default().to_string(),
                };
            }
            return AppError::InvalidInput(format!(
                "Unique constraint violated: {}",
                db_err.constraint().unwrap_or("unknown")
            ));
        }
    }
    AppError::Database(err)
}

/// PostgreSQL repository for `video_assets`
#[derive(Clone)]
pub struct VideoAssetRepository {
    pool: PgPool,
}

impl VideoAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError> {
        let external_asset_id = new.external_asset_id.clone();
        let row = sqlx::query_as::<Postgres, VideoAssetRow>(
            r#"
            INSERT INTO video_assets (
                local_id, external_asset_id, external_upload_id,
                lifecycle_state, source_object_key, title
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (local_id) DO UPDATE SET
                external_asset_id = COALESCE(video_assets.external_asset_id, EXCLUDED.external_asset_id),
                external_upload_id = COALESCE(video_assets.external_upload_id, EXCLUDED.external_upload_id),
                title = COALESCE(video_assets.title, EXCLUDED.title),
                lifecycle_state = CASE
                    WHEN video_assets.lifecycle_state = 'pending' THEN EXCLUDED.lifecycle_state
                    ELSE video_assets.lifecycle_state
                END,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(new.local_id)
        .bind(new.external_asset_id)
        .bind(new.external_upload_id)
        .bind(new.lifecycle_state)
        .bind(new.source_object_key)
        .bind(new.title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, external_asset_id.as_deref()))?;

        Ok(row.into())
    }
}

#[async_trait]
impl VideoAssetStore for VideoAssetRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "video_assets", db.operation = "upsert", local_id = %new.local_id))]
    async fn upsert_by_external_id(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError> {
        if new.external_asset_id.is_none() {
            return Err(AppError::InvalidInput(
                "upsert_by_external_id requires an external asset id".to_string(),
            ));
        }
        self.insert(new).await
    }

    #[tracing::instrument(skip(self, new), fields(db.table = "video_assets", db.operation = "insert", local_id = %new.local_id))]
    async fn insert_pending(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError> {
        self.insert(new).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "video_assets", db.operation = "select"))]
    async fn find_by_external_id(
        &self,
        external_asset_id: &str,
    ) -> Result<Option<VideoAsset>, AppError> {
        let row = sqlx::query_as::<Postgres, VideoAssetRow>(
            "SELECT * FROM video_assets WHERE external_asset_id = $1",
        )
        .bind(external_asset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip(self), fields(db.table = "video_assets", db.operation = "select", db.record_id = %local_id))]
    async fn find_by_local_id(&self, local_id: Uuid) -> Result<Option<VideoAsset>, AppError> {
        let row = sqlx::query_as::<Postgres, VideoAssetRow>(
            "SELECT * FROM video_assets WHERE local_id = $1",
        )
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip(self), fields(db.table = "video_assets", db.operation = "select"))]
    async fn find_by_upload_id(
        &self,
        external_upload_id: &str,
    ) -> Result<Option<VideoAsset>, AppError> {
        let row = sqlx::query_as::<Postgres, VideoAssetRow>(
            "SELECT * FROM video_assets WHERE external_upload_id = $1",
        )
        .bind(external_upload_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "video_assets", db.operation = "update", db.record_id = %local_id))]
    async fn update_fields(
        &self,
        local_id: Uuid,
        update: &VideoAssetUpdate,
    ) -> Result<Option<VideoAsset>, AppError> {
        let guard: Vec<String> = update
            .require_state_in
            .iter()
            .map(|s| s.to_string())
            .collect();
        let urls = update.derived_urls.as_ref();

        let row = sqlx::query_as::<Postgres, VideoAssetRow>(
            r#"
            UPDATE video_assets SET
                external_asset_id = COALESCE($2, external_asset_id),
                external_playback_id = COALESCE($3, external_playback_id),
                lifecycle_state = COALESCE($4, lifecycle_state),
                thumbnail_url = COALESCE($5, thumbnail_url),
                stream_url = COALESCE($6, stream_url),
                download_url = COALESCE($7, download_url),
                duration_seconds = COALESCE($8, duration_seconds),
                aspect_ratio = COALESCE($9, aspect_ratio),
                error_reason = COALESCE($10, error_reason),
                poster_url = COALESCE($11, poster_url),
                poster_strategy = COALESCE($12, poster_strategy),
                ready_at = COALESCE(ready_at, $13),
                updated_at = NOW()
            WHERE local_id = $1
              AND (cardinality($14::text[]) = 0 OR lifecycle_state::text = ANY($14))
            RETURNING *
            "#,
        )
        .bind(local_id)
        .bind(update.external_asset_id.as_deref())
        .bind(update.external_playback_id.as_deref())
        .bind(update.lifecycle_state)
        .bind(urls.map(|u| u.thumbnail_url.as_str()))
        .bind(urls.map(|u| u.stream_url.as_str()))
        .bind(urls.map(|u| u.download_url.as_str()))
        .bind(update.duration_seconds)
        .bind(update.aspect_ratio.as_deref())
        .bind(update.error_reason.as_deref())
        .bind(update.poster_url.as_deref())
        .bind(update.poster_strategy)
        .bind(update.ready_at)
        .bind(&guard)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, update.external_asset_id.as_deref()))?;

        Ok(row.map(Into::into))
    }
}
