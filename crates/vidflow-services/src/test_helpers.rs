//! Test doubles shared by this crate's tests and downstream integration suites.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;
use vidflow_core::models::{
    NewVideoAsset, PlaybackId, ProviderAsset, ProviderAssetStatus, ProviderUpload, VideoAsset,
    VideoAssetUpdate,
};
use vidflow_core::{AppError, StorageBackend};
use vidflow_db::{InMemoryVideoAssetStore, VideoAssetStore};
use vidflow_provider::{CreateAssetRequest, CreateUploadRequest, ProviderClient, ProviderError};
use vidflow_storage::{ByteStream, Storage, StorageError, StorageResult};

#[derive(Default)]
struct MockState {
    create_results: VecDeque<Result<ProviderAsset, ProviderError>>,
    assets: HashMap<String, ProviderAsset>,
    asset_sequences: HashMap<String, VecDeque<Result<ProviderAsset, ProviderError>>>,
    uploads: HashMap<String, ProviderUpload>,
    fail_all: Option<ProviderError>,
    calls: Vec<String>,
    create_requests: Vec<CreateAssetRequest>,
}

/// Scripted provider. Unscripted calls return sensible defaults.
#[derive(Default)]
pub struct MockProviderClient {
    state: Mutex<MockState>,
}

impl MockProviderClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock provider state poisoned")
    }

    /// Queue the response of the next `create_asset` call.
    pub fn push_create_result(&self, result: Result<ProviderAsset, ProviderError>) -> &Self {
        self.state().create_results.push_back(result);
        self
    }

    /// Snapshot returned by `get_asset` once any queued sequence is exhausted.
    pub fn set_asset(&self, asset: ProviderAsset) -> &Self {
        self.state().assets.insert(asset.id.clone(), asset);
        self
    }

    /// Responses returned by successive `get_asset` calls for one id.
    pub fn push_asset_result(
        &self,
        asset_id: &str,
        result: Result<ProviderAsset, ProviderError>,
    ) -> &Self {
        self.state()
            .asset_sequences
            .entry(asset_id.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn set_upload(&self, upload: ProviderUpload) -> &Self {
        self.state().uploads.insert(upload.id.clone(), upload);
        self
    }

    /// Every subsequent call fails with this error.
    pub fn fail_all_with(&self, err: ProviderError) -> &Self {
        self.state().fail_all = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.state().calls.iter().filter(|c| c.as_str() == name).count()
    }

    pub fn create_requests(&self) -> Vec<CreateAssetRequest> {
        self.state().create_requests.clone()
    }

    fn record(&self, name: &str) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.calls.push(name.to_string());
        match state.fail_all {
            Some(ref err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// A ready snapshot with one public playback id and an audio track.
pub fn ready_asset(id: &str, playback_id: &str, duration: f64) -> ProviderAsset {
    ProviderAsset {
        id: id.to_string(),
        status: ProviderAssetStatus::Ready,
        playback_ids: vec![PlaybackId {
            id: playback_id.to_string(),
            policy: None,
        }],
        duration: Some(duration),
        aspect_ratio: Some("16:9".to_string()),
        tracks: vec![vidflow_core::models::ProviderTrack {
            id: format!("{}-audio", id),
            track_type: Some("audio".to_string()),
            status: Some("ready".to_string()),
        }],
        ..Default::default()
    }
}

pub fn preparing_asset(id: &str) -> ProviderAsset {
    ProviderAsset {
        id: id.to_string(),
        status: ProviderAssetStatus::Preparing,
        ..Default::default()
    }
}

#[async_trait]
impl ProviderClient for MockProviderClient {
    async fn create_asset(
        &self,
        request: &CreateAssetRequest,
    ) -> Result<ProviderAsset, ProviderError> {
        self.record("create_asset")?;
        let mut state = self.state();
        state.create_requests.push(request.clone());
        let mut result = state
            .create_results
            .pop_front()
            .unwrap_or_else(|| Ok(preparing_asset(&format!("EA-{}", request.passthrough))));
        if let Ok(ref mut asset) = result {
            asset.passthrough = Some(request.passthrough.clone());
        }
        result
    }

    async fn get_asset(&self, asset_id: &str) -> Result<ProviderAsset, ProviderError> {
        self.record("get_asset")?;
        let mut state = self.state();
        if let Some(next) = state
            .asset_sequences
            .get_mut(asset_id)
            .and_then(|queue| queue.pop_front())
        {
            return next;
        }
        state
            .assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("asset {}", asset_id)))
    }

    async fn delete_asset(&self, asset_id: &str) -> Result<(), ProviderError> {
        self.record("delete_asset")?;
        self.state()
            .assets
            .remove(asset_id)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(format!("asset {}", asset_id)))
    }

    async fn create_upload(
        &self,
        request: &CreateUploadRequest,
    ) -> Result<ProviderUpload, ProviderError> {
        self.record("create_upload")?;
        let id = format!("UP-{}", request.new_asset_settings.passthrough);
        let upload = ProviderUpload {
            id: id.clone(),
            status: Some("waiting".to_string()),
            url: Some(format!("https://uploads.example.com/{}", id)),
            asset_id: None,
        };
        self.state().uploads.insert(id, upload.clone());
        Ok(upload)
    }

    async fn get_upload(&self, upload_id: &str) -> Result<ProviderUpload, ProviderError> {
        self.record("get_upload")?;
        self.state()
            .uploads
            .get(upload_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("upload {}", upload_id)))
    }

    async fn request_generated_captions(
        &self,
        _asset_id: &str,
        _track_id: &str,
        _language: &str,
    ) -> Result<(), ProviderError> {
        self.record("request_generated_captions")
    }
}

/// Storage whose every operation fails.
pub struct FailingStorage;

#[async_trait]
impl Storage for FailingStorage {
    async fn source_url(&self, key: &str, _ttl: Duration) -> StorageResult<String> {
        Err(offline("sign", key))
    }

    async fn read(&self, key: &str) -> StorageResult<ByteStream> {
        Err(offline("read", key))
    }

    async fn write(&self, key: &str, _data: Bytes, _content_type: &str) -> StorageResult<String> {
        Err(offline("write", key))
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

fn offline(operation: &'static str, key: &str) -> StorageError {
    StorageError::Operation {
        operation,
        key: key.to_string(),
        message: "storage offline".to_string(),
    }
}

/// Record store that delays or refuses guarded writes, for exercising slow
/// databases and lost write races. Reads go straight to the inner store.
#[derive(Clone)]
pub struct InterferingStore {
    inner: InMemoryVideoAssetStore,
    update_delay: Duration,
    refuse_updates: bool,
}

impl InterferingStore {
    /// Every `update_fields` sleeps for `delay` before writing.
    pub fn slow(inner: InMemoryVideoAssetStore, delay: Duration) -> Self {
        Self {
            inner,
            update_delay: delay,
            refuse_updates: false,
        }
    }

    /// Every `update_fields` reports a failed state guard without writing.
    pub fn contended(inner: InMemoryVideoAssetStore) -> Self {
        Self {
            inner,
            update_delay: Duration::ZERO,
            refuse_updates: true,
        }
    }
}

#[async_trait]
impl VideoAssetStore for InterferingStore {
    async fn upsert_by_external_id(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError> {
        self.inner.upsert_by_external_id(new).await
    }

    async fn insert_pending(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError> {
        self.inner.insert_pending(new).await
    }

    async fn find_by_external_id(
        &self,
        external_asset_id: &str,
    ) -> Result<Option<VideoAsset>, AppError> {
        self.inner.find_by_external_id(external_asset_id).await
    }

    async fn find_by_local_id(&self, local_id: Uuid) -> Result<Option<VideoAsset>, AppError> {
        self.inner.find_by_local_id(local_id).await
    }

    async fn find_by_upload_id(
        &self,
        external_upload_id: &str,
    ) -> Result<Option<VideoAsset>, AppError> {
        self.inner.find_by_upload_id(external_upload_id).await
    }

    async fn update_fields(
        &self,
        local_id: Uuid,
        update: &VideoAssetUpdate,
    ) -> Result<Option<VideoAsset>, AppError> {
        if !self.update_delay.is_zero() {
            tokio::time::sleep(self.update_delay).await;
        }
        if self.refuse_updates {
            return Ok(None);
        }
        self.inner.update_fields(local_id, update).await
    }
}
