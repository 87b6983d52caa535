use async_trait::async_trait;
use vidflow_core::models::{ProviderAsset, ProviderUpload};

use crate::error::ProviderError;
use crate::types::{CreateAssetRequest, CreateUploadRequest};

/// Operations the ingest pipeline needs from the provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn create_asset(&self, request: &CreateAssetRequest)
        -> Result<ProviderAsset, ProviderError>;

    async fn get_asset(&self, asset_id: &str) -> Result<ProviderAsset, ProviderError>;

    async fn delete_asset(&self, asset_id: &str) -> Result<(), ProviderError>;

    async fn create_upload(
        &self,
        request: &CreateUploadRequest,
    ) -> Result<ProviderUpload, ProviderError>;

    async fn get_upload(&self, upload_id: &str) -> Result<ProviderUpload, ProviderError>;

    /// Ask the provider to generate captions for an audio track.
    async fn request_generated_captions(
        &self,
        asset_id: &str,
        track_id: &str,
        language: &str,
    ) -> Result<(), ProviderError>;
}
