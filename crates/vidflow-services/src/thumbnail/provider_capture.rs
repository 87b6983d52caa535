use async_trait::async_trait;
use std::sync::Arc;
use vidflow_core::models::{ProviderAssetStatus, ThumbnailSource};
use vidflow_core::{AppError, PlaybackUrlBuilder};
use vidflow_provider::ProviderClient;

use super::{ThumbnailStrategy, ThumbnailTarget};

/// Frame captured by the provider's image service.
pub struct ProviderCaptureStrategy {
    provider: Arc<dyn ProviderClient>,
    urls: PlaybackUrlBuilder,
}

impl ProviderCaptureStrategy {
    pub fn new(provider: Arc<dyn ProviderClient>, urls: PlaybackUrlBuilder) -> Self {
        Self { provider, urls }
    }
}

#[async_trait]
impl ThumbnailStrategy for ProviderCaptureStrategy {
    fn source(&self) -> ThumbnailSource {
        ThumbnailSource::ProviderCapture
    }

    async fn attempt(&self, target: &ThumbnailTarget) -> Result<String, AppError> {
        let Some(ref external_asset_id) = target.external_asset_id else {
            return Err(AppError::NotFound(format!(
                "Video {} has no remote asset yet",
                target.local_id
            )));
        };

        let asset = self.provider.get_asset(external_asset_id).await?;
        if asset.status != ProviderAssetStatus::Ready {
            return Err(AppError::ProviderTransient(format!(
                "Asset {} is not ready for frame capture",
                external_asset_id
            )));
        }

        let playback_id = asset.primary_playback_id().ok_or_else(|| {
            AppError::NotFound(format!("Asset {} has no playback id", external_asset_id))
        })?;

        Ok(self
            .urls
            .thumbnail_url(playback_id, self.urls.thumbnail_time_seconds()))
    }
}
