//! Poster fallback chain.
//!
//! Strategies run in order, cheapest first, until one produces a URL. A
//! failed attempt is recorded and the next strategy runs; a configuration
//! error stops the chain instead of being papered over by a weaker poster.

mod ffmpeg;
mod placeholder;
mod provider_capture;

pub use ffmpeg::FfmpegFrameStrategy;
pub use placeholder::PlaceholderStrategy;
pub use provider_capture::ProviderCaptureStrategy;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;
use vidflow_core::models::{ThumbnailSource, VideoAssetUpdate};
use vidflow_core::{AppError, Config, PlaybackUrlBuilder};
use vidflow_db::VideoAssetStore;
use vidflow_provider::ProviderClient;
use vidflow_storage::Storage;

/// What a strategy needs to know about the asset.
#[derive(Debug, Clone)]
pub struct ThumbnailTarget {
    pub local_id: Uuid,
    pub source_object_key: String,
    pub title: Option<String>,
    pub external_asset_id: Option<String>,
}

#[async_trait]
pub trait ThumbnailStrategy: Send + Sync {
    fn source(&self) -> ThumbnailSource;

    /// Produce a poster URL for `target`.
    async fn attempt(&self, target: &ThumbnailTarget) -> Result<String, AppError>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StrategyFailure {
    pub strategy: ThumbnailSource,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailOutcome {
    pub url: String,
    pub strategy_used: ThumbnailSource,
    pub failures: Vec<StrategyFailure>,
    /// False when the record already held a poster from a stronger strategy.
    pub persisted: bool,
}

#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub ffmpeg_path: String,
    pub ffmpeg_timeout: Duration,
    pub placeholder_width: u32,
    pub placeholder_height: u32,
}

impl ThumbnailConfig {
    pub fn from_config(config: &Config) -> Self {
        let (placeholder_width, placeholder_height) = config.placeholder_dimensions();
        Self {
            ffmpeg_path: config.ffmpeg_path().to_string(),
            ffmpeg_timeout: config.ffmpeg_timeout(),
            placeholder_width,
            placeholder_height,
        }
    }
}

pub struct ThumbnailChain {
    store: Arc<dyn VideoAssetStore>,
    strategies: Vec<Arc<dyn ThumbnailStrategy>>,
}

impl ThumbnailChain {
    pub fn new(store: Arc<dyn VideoAssetStore>, strategies: Vec<Arc<dyn ThumbnailStrategy>>) -> Self {
        Self { store, strategies }
    }

    /// Provider capture, then local extraction, then placeholder.
    pub fn standard(
        store: Arc<dyn VideoAssetStore>,
        provider: Arc<dyn ProviderClient>,
        storage: Arc<dyn Storage>,
        urls: PlaybackUrlBuilder,
        config: ThumbnailConfig,
    ) -> Self {
        let strategies: Vec<Arc<dyn ThumbnailStrategy>> = vec![
            Arc::new(ProviderCaptureStrategy::new(provider, urls)),
            Arc::new(FfmpegFrameStrategy::new(
                storage.clone(),
                config.ffmpeg_path,
                config.ffmpeg_timeout,
            )),
            Arc::new(PlaceholderStrategy::new(
                storage,
                config.placeholder_width,
                config.placeholder_height,
            )),
        ];
        Self::new(store, strategies)
    }

    #[tracing::instrument(skip(self), fields(local_id = %local_id))]
    pub async fn generate(
        &self,
        local_id: Uuid,
        source_object_key: &str,
    ) -> Result<ThumbnailOutcome, AppError> {
        let record = self
            .store
            .find_by_local_id(local_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", local_id)))?;

        let target = ThumbnailTarget {
            local_id,
            source_object_key: source_object_key.to_string(),
            title: record.title.clone(),
            external_asset_id: record.external_asset_id.clone(),
        };

        let mut failures = Vec::new();
        let mut winner = None;

        for strategy in &self.strategies {
            let source = strategy.source();
            match strategy.attempt(&target).await {
                Ok(url) => {
                    winner = Some((url, source));
                    break;
                }
                Err(e) if e.is_configuration() => {
                    tracing::error!(
                        local_id = %local_id,
                        strategy = %source,
                        error = %e,
                        "Poster generation aborted by configuration error"
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        local_id = %local_id,
                        strategy = %source,
                        error = %e,
                        "Poster strategy failed, trying next"
                    );
                    failures.push(StrategyFailure {
                        strategy: source,
                        error: e.to_string(),
                    });
                }
            }
        }

        let Some((url, strategy_used)) = winner else {
            let summary = failures
                .iter()
                .map(|f| format!("{}: {}", f.strategy, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            tracing::error!(
                local_id = %local_id,
                failures = %summary,
                "Every poster strategy failed"
            );
            return Err(AppError::AllStrategiesFailed(summary));
        };

        let persisted = self.persist(local_id, &url, strategy_used).await?;

        tracing::info!(
            local_id = %local_id,
            strategy = %strategy_used,
            failed_attempts = failures.len(),
            persisted,
            "Poster generated"
        );

        Ok(ThumbnailOutcome {
            url,
            strategy_used,
            failures,
            persisted,
        })
    }

    /// Run the chain off the request path. Failures are only logged.
    pub fn spawn_background(
        self: &Arc<Self>,
        local_id: Uuid,
        source_object_key: String,
    ) -> JoinHandle<()> {
        let chain = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = chain.generate(local_id, &source_object_key).await {
                tracing::error!(local_id = %local_id, error = %e, "Background poster generation failed");
            }
        })
    }

    /// Store the poster unless the record holds one from a stronger strategy.
    async fn persist(
        &self,
        local_id: Uuid,
        url: &str,
        strategy: ThumbnailSource,
    ) -> Result<bool, AppError> {
        let current = self
            .store
            .find_by_local_id(local_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", local_id)))?;

        if let Some(existing) = current.poster_strategy {
            if existing.authority() > strategy.authority() {
                tracing::debug!(
                    local_id = %local_id,
                    existing = %existing,
                    candidate = %strategy,
                    "Keeping poster from stronger strategy"
                );
                return Ok(false);
            }
            if existing == strategy && current.poster_url.as_deref() == Some(url) {
                return Ok(true);
            }
        }

        let update = VideoAssetUpdate {
            poster_url: Some(url.to_string()),
            poster_strategy: Some(strategy),
            ..Default::default()
        };
        Ok(self.store.update_fields(local_id, &update).await?.is_some())
    }
}
