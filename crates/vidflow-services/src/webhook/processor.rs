use std::sync::Arc;
use uuid::Uuid;
use vidflow_core::models::{
    LifecycleState, OrphanedEvent, VideoAsset, WebhookEvent, WebhookEventType,
};
use vidflow_core::AppError;
use vidflow_db::OrphanedEventLog;

use crate::lifecycle::AssetLifecycleManager;

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Applied {
        local_id: Uuid,
        state: LifecycleState,
    },
    /// The event would have moved a terminal record backwards.
    Stale { local_id: Uuid },
    /// No local record matched; the event was logged.
    Orphaned,
    /// Event type this service does not act on.
    Ignored { event_type: String },
}

/// Maps verified webhook events onto lifecycle transitions.
pub struct WebhookProcessor {
    lifecycle: Arc<AssetLifecycleManager>,
    orphans: Arc<dyn OrphanedEventLog>,
}

impl WebhookProcessor {
    pub fn new(lifecycle: Arc<AssetLifecycleManager>, orphans: Arc<dyn OrphanedEventLog>) -> Self {
        Self { lifecycle, orphans }
    }

    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type, object_id = %event.object_id))]
    pub async fn process(&self, event: &WebhookEvent) -> Result<ProcessOutcome, AppError> {
        if let WebhookEventType::Unrecognized(ref raw) = event.event_type {
            tracing::debug!(event_type = %raw, "Ignoring unrecognized webhook event");
            return Ok(ProcessOutcome::Ignored {
                event_type: raw.clone(),
            });
        }

        let Some(asset) = self.resolve(event).await? else {
            tracing::warn!(
                external_asset_id = ?event.external_asset_id,
                external_upload_id = ?event.external_upload_id,
                "Webhook event matches no local record, logging as orphaned"
            );
            self.orphans.record(&OrphanedEvent::from(event)).await?;
            return Ok(ProcessOutcome::Orphaned);
        };
        let local_id = asset.local_id;

        let result = match event.event_type {
            WebhookEventType::AssetCreated | WebhookEventType::UploadAssetCreated => {
                self.lifecycle
                    .apply_preparing(local_id, &event.snapshot)
                    .await
            }
            WebhookEventType::AssetReady => {
                self.lifecycle.apply_ready(local_id, &event.snapshot).await
            }
            WebhookEventType::AssetErrored => {
                self.lifecycle
                    .apply_errored(local_id, &event.snapshot.error_reason())
                    .await
            }
            WebhookEventType::AssetUpdated => {
                self.lifecycle
                    .apply_snapshot(local_id, &event.snapshot)
                    .await
            }
            WebhookEventType::Unrecognized(_) => return Ok(ProcessOutcome::Ignored {
                event_type: event.event_type.to_string(),
            }),
        };

        match result {
            Ok(updated) => Ok(ProcessOutcome::Applied {
                local_id,
                state: updated.lifecycle_state,
            }),
            Err(AppError::StaleEvent(reason)) => {
                tracing::info!(local_id = %local_id, reason = %reason, "Stale webhook event dropped");
                Ok(ProcessOutcome::Stale { local_id })
            }
            Err(e) => Err(e),
        }
    }

    /// Passthrough token, then asset id, then upload id.
    async fn resolve(&self, event: &WebhookEvent) -> Result<Option<VideoAsset>, AppError> {
        let store = self.lifecycle.store();

        if let Some(local_id) = event.passthrough_local_id() {
            if let Some(asset) = store.find_by_local_id(local_id).await? {
                return Ok(Some(asset));
            }
            tracing::debug!(local_id = %local_id, "Passthrough token matches no record");
        }

        if let Some(ref external_asset_id) = event.external_asset_id {
            if let Some(asset) = self.lifecycle.dedup().find(external_asset_id).await? {
                return Ok(Some(asset));
            }
        }

        if let Some(ref upload_id) = event.external_upload_id {
            if let Some(asset) = store.find_by_upload_id(upload_id).await? {
                return Ok(Some(asset));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPublisher;
    use crate::lifecycle::LifecycleConfig;
    use crate::test_helpers::{FailingStorage, MockProviderClient};
    use crate::waiter::{CompletionWaiter, WaitPolicy};
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use vidflow_provider::ProviderClient;
    use vidflow_core::models::{NewVideoAsset, VideoAssetUpdate};
    use vidflow_core::PlaybackUrlBuilder;
    use vidflow_db::{InMemoryOrphanedEventLog, InMemoryVideoAssetStore, VideoAssetStore};

    struct Harness {
        processor: WebhookProcessor,
        lifecycle: Arc<AssetLifecycleManager>,
        store: InMemoryVideoAssetStore,
        orphans: InMemoryOrphanedEventLog,
        provider: Arc<MockProviderClient>,
    }

    fn harness() -> Harness {
        let store = InMemoryVideoAssetStore::new();
        let orphans = InMemoryOrphanedEventLog::new();
        let provider = Arc::new(MockProviderClient::new());
        let lifecycle = Arc::new(AssetLifecycleManager::new(
            Arc::new(store.clone()),
            provider.clone(),
            Arc::new(FailingStorage),
            PlaybackUrlBuilder::new("image.mux.com", "stream.mux.com", 1.0, "high"),
            EventPublisher::disabled(),
            LifecycleConfig::default(),
        ));
        Harness {
            processor: WebhookProcessor::new(lifecycle.clone(), Arc::new(orphans.clone())),
            lifecycle,
            store,
            orphans,
            provider,
        }
    }

    fn event(body: serde_json::Value) -> WebhookEvent {
        WebhookEvent::from_slice(body.to_string().as_bytes(), Utc::now()).unwrap()
    }

    fn ready_event(asset_id: &str, passthrough: Option<Uuid>) -> WebhookEvent {
        event(json!({
            "type": "video.asset.ready",
            "object": {"id": asset_id},
            "data": {
                "id": asset_id,
                "status": "ready",
                "passthrough": passthrough.map(|p| p.to_string()),
                "playback_ids": [{"id": "PB1", "policy": "public"}],
                "duration": 42.5,
                "aspect_ratio": "16:9"
            }
        }))
    }

    fn errored_event(asset_id: &str) -> WebhookEvent {
        event(json!({
            "type": "video.asset.errored",
            "object": {"id": asset_id},
            "data": {"status": "errored", "errors": {"type": "invalid_input", "messages": ["bad file"]}}
        }))
    }

    async fn seed(h: &Harness, external_asset_id: &str) -> Uuid {
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
    async fn test_ready_event_applies_playback_metadata() {
        let h = harness();
        let local_id = seed(&h, "EA1").await;

        let outcome = h
            .processor
            .process(&ready_event("EA1", Some(local_id)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ProcessOutcome::Applied {
                local_id,
                state: LifecycleState::Ready
            }
        );

        let asset = h.store.find_by_local_id(local_id).await.unwrap().unwrap();
        assert_eq!(asset.external_playback_id.as_deref(), Some("PB1"));
        assert_eq!(asset.duration_seconds, Some(42.5));
        let urls = asset.derived_urls.unwrap();
        assert_eq!(
            urls.thumbnail_url,
            "https://image.mux.com/PB1/thumbnail.jpg?time=1"
        );
        assert_eq!(urls.stream_url, "https://stream.mux.com/PB1.m3u8");
        assert_eq!(urls.download_url, "https://stream.mux.com/PB1/high.mp4");
    }

    #[tokio::test]
    async fn test_duplicate_delivery_writes_once() {
        let h = harness();
        let local_id = seed(&h, "EA1").await;
        let event = ready_event("EA1", Some(local_id));

        h.processor.process(&event).await.unwrap();
        let writes = h.store.write_count();
        h.processor.process(&event).await.unwrap();

        assert_eq!(h.store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_out_of_order_errored_leaves_ready() {
        let h = harness();
        let local_id = seed(&h, "EA1").await;

        h.processor.process(&ready_event("EA1", None)).await.unwrap();
        let outcome = h.processor.process(&errored_event("EA1")).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Stale { local_id });
        let asset = h.store.find_by_local_id(local_id).await.unwrap().unwrap();
        assert_eq!(asset.lifecycle_state, LifecycleState::Ready);
    }

    #[tokio::test]
    async fn test_ready_after_errored_is_stale() {
        let h = harness();
        let local_id = seed(&h, "EA1").await;
        h.processor.process(&errored_event("EA1")).await.unwrap();
        let writes = h.store.write_count();

        let outcome = h
            .processor
            .process(&ready_event("EA1", Some(local_id)))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Stale { local_id });
        assert_eq!(h.store.write_count(), writes);
        let asset = h.store.find_by_local_id(local_id).await.unwrap().unwrap();
        assert_eq!(asset.lifecycle_state, LifecycleState::Errored);
        assert!(asset.external_playback_id.is_none());
    }

    #[tokio::test]
    async fn test_ready_webhook_then_poll_writes_once() {
        let h = harness();
        let local_id = seed(&h, "EA1").await;
        let event = ready_event("EA1", Some(local_id));
        h.provider.set_asset(event.snapshot.clone());

        h.processor.process(&event).await.unwrap();
        let after_webhook = h.store.find_by_local_id(local_id).await.unwrap().unwrap();
        let writes = h.store.write_count();

        // A poll that fetched the snapshot before the webhook landed applies it late.
        let polled = h.provider.get_asset("EA1").await.unwrap();
        let applied = h.lifecycle.apply_snapshot(local_id, &polled).await.unwrap();
        let waited = CompletionWaiter::new(h.lifecycle.clone())
            .wait_until_ready(
                local_id,
                &WaitPolicy::fixed(Duration::from_millis(10), Duration::from_millis(50)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(h.store.write_count(), writes);
        assert_eq!(h.store.len().await, 1);
        assert_eq!(applied, after_webhook);
        assert!(!waited.timed_out);
        assert_eq!(waited.asset, after_webhook);
    }

    #[tokio::test]
    async fn test_errored_event_records_reason() {
        let h = harness();
        let local_id = seed(&h, "EA1").await;

        h.processor.process(&errored_event("EA1")).await.unwrap();

        let asset = h.store.find_by_local_id(local_id).await.unwrap().unwrap();
        assert_eq!(asset.lifecycle_state, LifecycleState::Errored);
        assert_eq!(asset.error_reason.as_deref(), Some("bad file"));
    }

    #[tokio::test]
    async fn test_unknown_record_is_orphaned() {
        let h = harness();

        let outcome = h
            .processor
            .process(&ready_event("EA-unknown", Some(Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Orphaned);
        let orphans = h.orphans.events().await;
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].object_id, "EA-unknown");
        assert_eq!(orphans[0].event_type, "asset.ready");
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_event_has_no_effect() {
        let h = harness();
        seed(&h, "EA1").await;
        let writes = h.store.write_count();

        let outcome = h
            .processor
            .process(&event(json!({
                "type": "video.asset.track.ready",
                "object": {"id": "EA1"},
                "data": {}
            })))
            .await
            .unwrap();

        assert!(matches!(outcome, ProcessOutcome::Ignored { .. }));
        assert_eq!(h.store.write_count(), writes);
        assert!(h.orphans.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_upload_event_resolves_by_upload_id() {
        let h = harness();
        let local_id = Uuid::new_v4();
        h.store
            .insert_pending(NewVideoAsset::awaiting_upload(local_id, "direct-uploads/UP1", "UP1"))
            .await
            .unwrap();

        let outcome = h
            .processor
            .process(&event(json!({
                "type": "video.upload.asset_created",
                "object": {"id": "UP1"},
                "data": {"id": "UP1", "asset_id": "EA9", "status": "asset_created"}
            })))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ProcessOutcome::Applied {
                local_id,
                state: LifecycleState::Preparing
            }
        );
        let asset = h.store.find_by_local_id(local_id).await.unwrap().unwrap();
        assert_eq!(asset.external_asset_id.as_deref(), Some("EA9"));
    }

    #[tokio::test]
    async fn test_created_after_ready_is_noop() {
        let h = harness();
        let local_id = seed(&h, "EA1").await;
        h.store
            .update_fields(
                local_id,
                &VideoAssetUpdate {
                    lifecycle_state: Some(LifecycleState::Ready),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let writes = h.store.write_count();

        let outcome = h
            .processor
            .process(&event(json!({
                "type": "video.asset.created",
                "object": {"id": "EA1"},
                "data": {"status": "preparing"}
            })))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ProcessOutcome::Applied {
                local_id,
                state: LifecycleState::Ready
            }
        );
        assert_eq!(h.store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_updated_event_dispatches_on_status() {
        let h = harness();
        let local_id = seed(&h, "EA1").await;

        let outcome = h
            .processor
            .process(&event(json!({
                "type": "video.asset.updated",
                "object": {"id": "EA1"},
                "data": {"status": "ready", "playback_ids": [{"id": "PB2"}]}
            })))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ProcessOutcome::Applied {
                local_id,
                state: LifecycleState::Ready
            }
        );
    }
}
