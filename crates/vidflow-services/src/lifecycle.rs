//! Asset lifecycle transitions.
//!
//! Every transition is idempotent and order aware: it reads the record,
//! computes only the fields that would change, and writes them with a state
//! guard so a concurrent or late event can never move a record backwards.
//! Both the webhook path and the polling path go through here.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use vidflow_core::models::{
    AssetOptions, LifecycleState, NewVideoAsset, ProviderAsset, ProviderAssetStatus, VideoAsset,
    VideoAssetUpdate,
};
use vidflow_core::{AppError, Config, PlaybackUrlBuilder};
use vidflow_db::VideoAssetStore;
use vidflow_provider::{CreateAssetRequest, CreateUploadRequest, ProviderClient, ProviderError};
use vidflow_storage::Storage;

use crate::dedup::DeduplicationGuard;
use crate::events::{EventPublisher, LifecycleEvent};

/// A guarded write that loses a race is recomputed once against the fresh row.
const MAX_TRANSITION_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Lifetime of the source URL handed to the provider.
    pub source_url_ttl: Duration,
    /// CORS origin registered on direct-upload slots.
    pub upload_cors_origin: String,
}

impl LifecycleConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_url_ttl: config.source_url_ttl(),
            upload_cors_origin: config
                .cors_origins()
                .first()
                .cloned()
                .unwrap_or_else(|| "*".to_string()),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            source_url_ttl: Duration::from_secs(6 * 3600),
            upload_cors_origin: "*".to_string(),
        }
    }
}

pub struct AssetLifecycleManager {
    store: Arc<dyn VideoAssetStore>,
    provider: Arc<dyn ProviderClient>,
    storage: Arc<dyn Storage>,
    urls: PlaybackUrlBuilder,
    dedup: DeduplicationGuard,
    events: EventPublisher,
    config: LifecycleConfig,
}

impl AssetLifecycleManager {
    pub fn new(
        store: Arc<dyn VideoAssetStore>,
        provider: Arc<dyn ProviderClient>,
        storage: Arc<dyn Storage>,
        urls: PlaybackUrlBuilder,
        events: EventPublisher,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            dedup: DeduplicationGuard::new(store.clone()),
            store,
            provider,
            storage,
            urls,
            events,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn VideoAssetStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn ProviderClient> {
        &self.provider
    }

    pub fn dedup(&self) -> &DeduplicationGuard {
        &self.dedup
    }

    pub async fn get(&self, local_id: Uuid) -> Result<VideoAsset, AppError> {
        self.store
            .find_by_local_id(local_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", local_id)))
    }

    /// Create the remote asset for an uploaded object and record it as `preparing`.
    ///
    /// Nothing is persisted when the provider call fails. Repeating the call for
    /// a `local_id` that already has a remote asset returns the stored record.
    #[tracing::instrument(skip(self, options, title), fields(local_id = %local_id))]
    pub async fn create_from_object_key(
        &self,
        source_object_key: &str,
        local_id: Uuid,
        title: Option<String>,
        options: &AssetOptions,
    ) -> Result<VideoAsset, AppError> {
        if source_object_key.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "object_key must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.store.find_by_local_id(local_id).await? {
            if existing.external_asset_id.is_some() {
                tracing::info!(
                    local_id = %local_id,
                    "Remote asset already exists for this id, returning stored record"
                );
                return Ok(existing);
            }
        }

        let source_url = self
            .storage
            .source_url(source_object_key, self.config.source_url_ttl)
            .await?;

        let request = CreateAssetRequest::new(source_url, local_id.to_string(), options);
        let remote = self.provider.create_asset(&request).await.map_err(|e| {
            tracing::warn!(local_id = %local_id, error = %e, "Provider asset creation failed");
            AppError::from(e)
        })?;

        let store = self.store.clone();
        let result = self
            .dedup
            .find_or_create(&remote.id, || {
                let store = store.clone();
                let new = NewVideoAsset::preparing(local_id, source_object_key, &remote.id)
                    .with_title(title.clone());
                async move { store.upsert_by_external_id(new).await }
            })
            .await?;

        if !result.created && result.asset.local_id != local_id {
            tracing::warn!(
                local_id = %local_id,
                owner_local_id = %result.asset.local_id,
                external_asset_id = %remote.id,
                "Remote asset already owned by another record"
            );
        }

        tracing::info!(
            local_id = %result.asset.local_id,
            external_asset_id = %remote.id,
            created = result.created,
            "Video asset recorded"
        );

        // The create response can already carry a terminal status.
        match remote.status {
            ProviderAssetStatus::Ready | ProviderAssetStatus::Errored => {
                self.apply_snapshot(result.asset.local_id, &remote).await
            }
            _ => Ok(result.asset),
        }
    }

    /// Create a direct-upload slot and record it as `pending`.
    #[tracing::instrument(skip(self, options, title), fields(local_id = %local_id))]
    pub async fn create_upload_slot(
        &self,
        local_id: Uuid,
        title: Option<String>,
        options: &AssetOptions,
    ) -> Result<(VideoAsset, String), AppError> {
        let request = CreateUploadRequest::new(
            local_id.to_string(),
            self.config.upload_cors_origin.clone(),
            options,
        );
        let upload = self.provider.create_upload(&request).await?;
        let upload_url = upload.url.clone().ok_or_else(|| {
            AppError::ProviderValidation("Upload slot returned without an upload URL".to_string())
        })?;

        let asset = self
            .store
            .insert_pending(
                NewVideoAsset::awaiting_upload(
                    local_id,
                    format!("direct-uploads/{}", upload.id),
                    &upload.id,
                )
                .with_title(title),
            )
            .await?;

        tracing::info!(
            local_id = %local_id,
            external_upload_id = %upload.id,
            "Upload slot created"
        );
        Ok((asset, upload_url))
    }

    /// Move the record to `ready` with the snapshot's playback metadata.
    #[tracing::instrument(skip(self, snapshot), fields(local_id = %local_id, external_asset_id = %snapshot.id))]
    pub async fn apply_ready(
        &self,
        local_id: Uuid,
        snapshot: &ProviderAsset,
    ) -> Result<VideoAsset, AppError> {
        let mut current = self.get(local_id).await?;

        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            if current.lifecycle_state == LifecycleState::Errored {
                return Err(Self::stale(local_id, "ready", current.lifecycle_state));
            }

            let update = self.ready_update(&current, snapshot);
            if update.is_empty() {
                tracing::debug!(local_id = %local_id, "Ready snapshot already applied");
                return Ok(current);
            }

            let transitioning = current.lifecycle_state != LifecycleState::Ready;
            let guard: &[LifecycleState] = if transitioning {
                &LifecycleState::PREPARING_SOURCES
            } else {
                &LifecycleState::READY_SOURCES
            };

            match self
                .store
                .update_fields(local_id, &update.guarded_by(guard))
                .await?
            {
                Some(updated) => {
                    if transitioning {
                        tracing::info!(
                            local_id = %local_id,
                            playback_id = ?updated.external_playback_id,
                            "Video asset ready"
                        );
                        self.events.publish(LifecycleEvent::AssetReady {
                            local_id,
                            external_asset_id: updated.external_asset_id.clone(),
                            playback_id: updated.external_playback_id.clone(),
                            audio_track_id: snapshot.audio_track_id().map(str::to_string),
                            source_object_key: updated.source_object_key.clone(),
                        });
                    }
                    return Ok(updated);
                }
                // Someone else moved the record; recompute against the fresh row.
                None => current = self.get(local_id).await?,
            }
        }

        tracing::warn!(
            local_id = %local_id,
            state = %current.lifecycle_state,
            attempts = MAX_TRANSITION_ATTEMPTS,
            "Ready snapshot not applied, record kept changing under the write"
        );
        Err(AppError::Internal(format!(
            "Concurrent updates kept video {} from becoming ready",
            local_id
        )))
    }

    /// Move the record to `errored`. A `ready` record is never downgraded.
    #[tracing::instrument(skip(self, reason), fields(local_id = %local_id))]
    pub async fn apply_errored(&self, local_id: Uuid, reason: &str) -> Result<VideoAsset, AppError> {
        let current = self.get(local_id).await?;

        if current.lifecycle_state == LifecycleState::Ready {
            return Err(Self::stale(local_id, "errored", current.lifecycle_state));
        }

        let mut update = VideoAssetUpdate::default();
        if current.lifecycle_state != LifecycleState::Errored {
            update.lifecycle_state = Some(LifecycleState::Errored);
        }
        if current.error_reason.as_deref() != Some(reason) {
            update.error_reason = Some(reason.to_string());
        }
        if update.is_empty() {
            tracing::debug!(local_id = %local_id, "Errored state already applied");
            return Ok(current);
        }

        let transitioning = update.lifecycle_state.is_some();
        match self
            .store
            .update_fields(local_id, &update.guarded_by(&LifecycleState::ERRORED_SOURCES))
            .await?
        {
            Some(updated) => {
                if transitioning {
                    tracing::warn!(local_id = %local_id, reason = %reason, "Video asset errored");
                    self.events.publish(LifecycleEvent::AssetErrored {
                        local_id,
                        reason: reason.to_string(),
                    });
                }
                Ok(updated)
            }
            None => {
                let fresh = self.get(local_id).await?;
                Err(Self::stale(local_id, "errored", fresh.lifecycle_state))
            }
        }
    }

    /// Record that the provider is processing the asset.
    ///
    /// Only applies while `pending` or `preparing`; over a terminal state this
    /// is a logged no-op. Fills in the asset id for upload-slot records.
    #[tracing::instrument(skip(self, snapshot), fields(local_id = %local_id))]
    pub async fn apply_preparing(
        &self,
        local_id: Uuid,
        snapshot: &ProviderAsset,
    ) -> Result<VideoAsset, AppError> {
        let current = self.get(local_id).await?;

        if !current.lifecycle_state.accepts_preparing() {
            tracing::debug!(
                local_id = %local_id,
                state = %current.lifecycle_state,
                "Ignoring preparing over terminal state"
            );
            return Ok(current);
        }

        let mut update = VideoAssetUpdate::default();
        if current.lifecycle_state == LifecycleState::Pending {
            update.lifecycle_state = Some(LifecycleState::Preparing);
        }
        if current.external_asset_id.is_none() && !snapshot.id.is_empty() {
            update.external_asset_id = Some(snapshot.id.clone());
        }
        if update.is_empty() {
            return Ok(current);
        }

        match self
            .store
            .update_fields(
                local_id,
                &update.guarded_by(&LifecycleState::PREPARING_SOURCES),
            )
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    local_id = %local_id,
                    external_asset_id = ?updated.external_asset_id,
                    "Video asset preparing"
                );
                Ok(updated)
            }
            None => {
                tracing::debug!(local_id = %local_id, "Record left preparing concurrently");
                self.get(local_id).await
            }
        }
    }

    /// Apply whatever the snapshot's status says.
    pub async fn apply_snapshot(
        &self,
        local_id: Uuid,
        snapshot: &ProviderAsset,
    ) -> Result<VideoAsset, AppError> {
        match snapshot.status {
            ProviderAssetStatus::Ready => self.apply_ready(local_id, snapshot).await,
            ProviderAssetStatus::Errored => {
                self.apply_errored(local_id, &snapshot.error_reason()).await
            }
            _ => self.apply_preparing(local_id, snapshot).await,
        }
    }

    /// Delete the remote asset. The local record is kept.
    #[tracing::instrument(skip(self), fields(local_id = %local_id))]
    pub async fn invalidate_remote(&self, local_id: Uuid) -> Result<VideoAsset, AppError> {
        let current = self.get(local_id).await?;
        let Some(ref external_asset_id) = current.external_asset_id else {
            return Err(AppError::InvalidInput(format!(
                "Video {} has no remote asset",
                local_id
            )));
        };

        match self.provider.delete_asset(external_asset_id).await {
            Ok(()) => {
                tracing::info!(
                    local_id = %local_id,
                    external_asset_id = %external_asset_id,
                    "Remote asset invalidated"
                );
            }
            Err(ProviderError::NotFound(_)) => {
                tracing::info!(
                    local_id = %local_id,
                    external_asset_id = %external_asset_id,
                    "Remote asset already gone"
                );
            }
            Err(e) => return Err(e.into()),
        }
        Ok(current)
    }

    /// Fields of `current` that differ from what `snapshot` says a ready asset looks like.
    fn ready_update(&self, current: &VideoAsset, snapshot: &ProviderAsset) -> VideoAssetUpdate {
        let mut update = VideoAssetUpdate::default();

        if current.lifecycle_state != LifecycleState::Ready {
            update.lifecycle_state = Some(LifecycleState::Ready);
        }
        if current.external_asset_id.is_none() && !snapshot.id.is_empty() {
            update.external_asset_id = Some(snapshot.id.clone());
        }

        let playback_id = snapshot
            .primary_playback_id()
            .map(str::to_string)
            .or_else(|| current.external_playback_id.clone());
        if playback_id.is_some() && playback_id != current.external_playback_id {
            update.external_playback_id = playback_id.clone();
        }
        let derived = self.urls.derive_optional(playback_id.as_deref());
        if derived.is_some() && derived != current.derived_urls {
            update.derived_urls = derived;
        }

        if snapshot.duration.is_some() && snapshot.duration != current.duration_seconds {
            update.duration_seconds = snapshot.duration;
        }
        if snapshot.aspect_ratio.is_some() && snapshot.aspect_ratio != current.aspect_ratio {
            update.aspect_ratio = snapshot.aspect_ratio.clone();
        }
        if current.ready_at.is_none() {
            update.ready_at = Some(Utc::now());
        }

        update
    }

    fn stale(local_id: Uuid, event: &str, state: LifecycleState) -> AppError {
        tracing::warn!(
            local_id = %local_id,
            state = %state,
            event = %event,
            "Dropping stale lifecycle event"
        );
        AppError::StaleEvent(format!(
            "{} cannot be applied to video {} in state {}",
            event, local_id, state
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ready_asset, FailingStorage, MockProviderClient};
    use vidflow_db::InMemoryVideoAssetStore;
    use vidflow_storage::LocalStorage;

    struct Harness {
        manager: AssetLifecycleManager,
        store: InMemoryVideoAssetStore,
        provider: Arc<MockProviderClient>,
        events: tokio::sync::mpsc::Receiver<LifecycleEvent>,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:4000/media".to_string())
            .await
            .unwrap();
        let store = InMemoryVideoAssetStore::new();
        let provider = Arc::new(MockProviderClient::new());
        let (publisher, events) = EventPublisher::channel(16);
        let manager = AssetLifecycleManager::new(
            Arc::new(store.clone()),
            provider.clone(),
            Arc::new(storage),
            PlaybackUrlBuilder::new("image.mux.com", "stream.mux.com", 1.0, "high"),
            publisher,
            LifecycleConfig::default(),
        );
        Harness {
            manager,
            store,
            provider,
            events,
            _dir: dir,
        }
    }

    async fn seeded(h: &Harness, external_asset_id: &str) -> Uuid {
        let local_id = Uuid::new_v4();
        h.store
            .upsert_by_external_id(NewVideoAsset::preparing(
                local_id,
                "videos/abc.mp4",
                external_asset_id,
            ))
            .await
            .unwrap();
        local_id
    }

    #[tokio::test]
    async fn test_create_persists_preparing_with_one_write() {
        let h = harness().await;
        let local_id = Uuid::new_v4();
        h.provider
            .push_create_result(Ok(crate::test_helpers::preparing_asset("EA1")));

        let asset = h
            .manager
            .create_from_object_key("videos/abc.mp4", local_id, None, &AssetOptions::default())
            .await
            .unwrap();

        assert_eq!(asset.local_id, local_id);
        assert_eq!(asset.external_asset_id.as_deref(), Some("EA1"));
        assert_eq!(asset.lifecycle_state, LifecycleState::Preparing);
        assert!(asset.derived_urls.is_none());
        assert_eq!(h.store.write_count(), 1);

        let request = &h.provider.create_requests()[0];
        assert_eq!(request.passthrough, local_id.to_string());
        assert_eq!(
            request.input[0].url,
            "http://localhost:4000/media/videos/abc.mp4"
        );
    }

    #[tokio::test]
    async fn test_provider_failure_persists_nothing() {
        let h = harness().await;
        h.provider
            .push_create_result(Err(ProviderError::Validation("bad input".to_string())));

        let result = h
            .manager
            .create_from_object_key(
                "videos/abc.mp4",
                Uuid::new_v4(),
                None,
                &AssetOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(AppError::ProviderValidation(_))));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_credentials_surface_as_configuration() {
        let h = harness().await;
        h.provider
            .fail_all_with(ProviderError::Configuration("no token".to_string()));

        let err = h
            .manager
            .create_from_object_key(
                "videos/abc.mp4",
                Uuid::new_v4(),
                None,
                &AssetOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unreachable_storage_creates_nothing_remotely() {
        let store = InMemoryVideoAssetStore::new();
        let provider = Arc::new(MockProviderClient::new());
        let manager = AssetLifecycleManager::new(
            Arc::new(store.clone()),
            provider.clone(),
            Arc::new(FailingStorage),
            PlaybackUrlBuilder::new("image.mux.com", "stream.mux.com", 1.0, "high"),
            EventPublisher::disabled(),
            LifecycleConfig::default(),
        );

        let result = manager
            .create_from_object_key("videos/abc.mp4", Uuid::new_v4(), None, &AssetOptions::default())
            .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(provider.call_count("create_asset"), 0);
    }

    #[tokio::test]
    async fn test_apply_ready_is_idempotent() {
        let mut h = harness().await;
        let local_id = seeded(&h, "EA1").await;
        let writes_before = h.store.write_count();
        let snapshot = ready_asset("EA1", "PB1", 42.5);

        let first = h.manager.apply_ready(local_id, &snapshot).await.unwrap();
        let second = h.manager.apply_ready(local_id, &snapshot).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.store.write_count(), writes_before + 1);
        assert_eq!(first.lifecycle_state, LifecycleState::Ready);
        assert_eq!(first.external_playback_id.as_deref(), Some("PB1"));
        assert_eq!(first.duration_seconds, Some(42.5));
        assert!(first.ready_at.is_some());
        assert_eq!(
            first.derived_urls.unwrap().stream_url,
            "https://stream.mux.com/PB1.m3u8"
        );

        assert!(matches!(
            h.events.try_recv(),
            Ok(LifecycleEvent::AssetReady { .. })
        ));
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_apply_ready_updates_only_changed_fields() {
        let h = harness().await;
        let local_id = seeded(&h, "EA1").await;
        let first = h
            .manager
            .apply_ready(local_id, &ready_asset("EA1", "PB1", 42.5))
            .await
            .unwrap();

        let mut later = ready_asset("EA1", "PB1", 42.5);
        later.aspect_ratio = Some("4:3".to_string());
        let second = h.manager.apply_ready(local_id, &later).await.unwrap();

        assert_eq!(second.aspect_ratio.as_deref(), Some("4:3"));
        assert_eq!(second.ready_at, first.ready_at);
        assert_eq!(second.derived_urls, first.derived_urls);
    }

    #[tokio::test]
    async fn test_errored_after_ready_is_stale() {
        let h = harness().await;
        let local_id = seeded(&h, "EA1").await;
        h.manager
            .apply_ready(local_id, &ready_asset("EA1", "PB1", 42.5))
            .await
            .unwrap();
        let writes = h.store.write_count();

        let result = h.manager.apply_errored(local_id, "input corrupt").await;

        assert!(matches!(result, Err(AppError::StaleEvent(_))));
        assert_eq!(h.store.write_count(), writes);
        let current = h.manager.get(local_id).await.unwrap();
        assert_eq!(current.lifecycle_state, LifecycleState::Ready);
        assert!(current.error_reason.is_none());
    }

    #[tokio::test]
    async fn test_apply_errored_is_idempotent_and_emits_once() {
        let mut h = harness().await;
        let local_id = seeded(&h, "EA1").await;

        let first = h.manager.apply_errored(local_id, "unsupported codec").await.unwrap();
        let writes = h.store.write_count();
        let second = h.manager.apply_errored(local_id, "unsupported codec").await.unwrap();

        assert_eq!(first.lifecycle_state, LifecycleState::Errored);
        assert_eq!(first.error_reason.as_deref(), Some("unsupported codec"));
        assert_eq!(first, second);
        assert_eq!(h.store.write_count(), writes);
        assert!(matches!(
            h.events.try_recv(),
            Ok(LifecycleEvent::AssetErrored { .. })
        ));
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ready_after_errored_is_stale() {
        let mut h = harness().await;
        let local_id = seeded(&h, "EA1").await;
        h.manager.apply_errored(local_id, "transient").await.unwrap();
        let before = h.manager.get(local_id).await.unwrap();
        let writes = h.store.write_count();
        while h.events.try_recv().is_ok() {}

        let result = h
            .manager
            .apply_ready(local_id, &ready_asset("EA1", "PB1", 10.0))
            .await;

        assert!(matches!(result, Err(AppError::StaleEvent(_))));
        assert_eq!(h.store.write_count(), writes);
        assert!(h.events.try_recv().is_err());
        let current = h.manager.get(local_id).await.unwrap();
        assert_eq!(current, before);
        assert_eq!(current.lifecycle_state, LifecycleState::Errored);
    }

    #[tokio::test]
    async fn test_ready_reports_error_when_writes_keep_losing() {
        let store = InMemoryVideoAssetStore::new();
        let local_id = Uuid::new_v4();
        store
            .upsert_by_external_id(NewVideoAsset::preparing(local_id, "videos/abc.mp4", "EA1"))
            .await
            .unwrap();
        let (publisher, mut events) = EventPublisher::channel(16);
        let manager = AssetLifecycleManager::new(
            Arc::new(crate::test_helpers::InterferingStore::contended(store.clone())),
            Arc::new(MockProviderClient::new()),
            Arc::new(FailingStorage),
            PlaybackUrlBuilder::new("image.mux.com", "stream.mux.com", 1.0, "high"),
            publisher,
            LifecycleConfig::default(),
        );

        let result = manager
            .apply_ready(local_id, &ready_asset("EA1", "PB1", 10.0))
            .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(events.try_recv().is_err());
        let current = store.find_by_local_id(local_id).await.unwrap().unwrap();
        assert_eq!(current.lifecycle_state, LifecycleState::Preparing);
    }

    #[tokio::test]
    async fn test_preparing_never_regresses_terminal_state() {
        let h = harness().await;
        let local_id = seeded(&h, "EA1").await;
        h.manager
            .apply_ready(local_id, &ready_asset("EA1", "PB1", 42.5))
            .await
            .unwrap();
        let writes = h.store.write_count();

        let asset = h
            .manager
            .apply_preparing(local_id, &crate::test_helpers::preparing_asset("EA1"))
            .await
            .unwrap();

        assert_eq!(asset.lifecycle_state, LifecycleState::Ready);
        assert_eq!(h.store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_upload_slot_then_preparing_fills_asset_id() {
        let h = harness().await;
        let local_id = Uuid::new_v4();

        let (asset, upload_url) = h
            .manager
            .create_upload_slot(local_id, Some("Demo".to_string()), &AssetOptions::default())
            .await
            .unwrap();
        assert_eq!(asset.lifecycle_state, LifecycleState::Pending);
        assert!(upload_url.starts_with("https://uploads.example.com/"));

        let asset = h
            .manager
            .apply_preparing(local_id, &crate::test_helpers::preparing_asset("EA7"))
            .await
            .unwrap();
        assert_eq!(asset.lifecycle_state, LifecycleState::Preparing);
        assert_eq!(asset.external_asset_id.as_deref(), Some("EA7"));
        assert_eq!(asset.title.as_deref(), Some("Demo"));
    }

    #[tokio::test]
    async fn test_invalidate_remote_keeps_local_record() {
        let h = harness().await;
        let local_id = seeded(&h, "EA1").await;
        h.provider.set_asset(ready_asset("EA1", "PB1", 1.0));

        h.manager.invalidate_remote(local_id).await.unwrap();
        assert_eq!(h.provider.call_count("delete_asset"), 1);

        // Already deleted remotely: still fine.
        h.manager.invalidate_remote(local_id).await.unwrap();
        assert!(h.store.find_by_local_id(local_id).await.unwrap().is_some());
    }
}
