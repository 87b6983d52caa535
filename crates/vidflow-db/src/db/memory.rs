//! In-memory store implementations.
//!
//! They enforce the same uniqueness rules as the PostgreSQL schema, so the
//! deduplication and ordering behaviour can be exercised without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use vidflow_core::models::{
    LifecycleState, NewVideoAsset, OrphanedEvent, VideoAsset, VideoAssetUpdate,
};
use vidflow_core::AppError;

use super::orphaned_event::OrphanedEventLog;
use super::video_asset::VideoAssetStore;

#[derive(Clone, Default)]
pub struct InMemoryVideoAssetStore {
    records: Arc<Mutex<HashMap<Uuid, VideoAsset>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryVideoAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful inserts and updates since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Seed a record directly, bypassing the write counter.
    pub async fn seed(&self, asset: VideoAsset) {
        self.records.lock().await.insert(asset.local_id, asset);
    }

    fn conflicts(
        records: &HashMap<Uuid, VideoAsset>,
        local_id: Uuid,
        external_asset_id: Option<&str>,
        external_upload_id: Option<&str>,
    ) -> Option<AppError> {
        for other in records.values().filter(|r| r.local_id != local_id) {
            if let (Some(mine), Some(theirs)) = (external_asset_id, other.external_asset_id.as_deref())
            {
                if mine == theirs {
                    return Some(AppError::DuplicateAsset {
                        external_asset_id: mine.to_string(),
                    });
                }
            }
            if let (Some(mine), Some(theirs)) =
                (external_upload_id, other.external_upload_id.as_deref())
            {
                if mine == theirs {
                    return Some(AppError::InvalidInput(
                        "Unique constraint violated: video_assets_external_upload_id_key"
                            .to_string(),
                    ));
                }
            }
        }
        None
    }

    async fn insert(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError> {
        let mut records = self.records.lock().await;

        if let Some(err) = Self::conflicts(
            &records,
            new.local_id,
            new.external_asset_id.as_deref(),
            new.external_upload_id.as_deref(),
        ) {
            return Err(err);
        }

        let now = Utc::now();
        let asset = match records.get_mut(&new.local_id) {
            Some(existing) => {
                if existing.external_asset_id.is_none() {
                    existing.external_asset_id = new.external_asset_id;
                }
                if existing.external_upload_id.is_none() {
                    existing.external_upload_id = new.external_upload_id;
                }
                if existing.title.is_none() {
                    existing.title = new.title;
                }
                if existing.lifecycle_state == LifecycleState::Pending {
                    existing.lifecycle_state = new.lifecycle_state;
                }
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let asset = VideoAsset::from_new(new, now);
                records.insert(asset.local_id, asset.clone());
                asset
            }
        };

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(asset)
    }
}

#[async_trait]
impl VideoAssetStore for InMemoryVideoAssetStore {
    async fn upsert_by_external_id(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError> {
        if new.external_asset_id.is_none() {
            return Err(AppError::InvalidInput(
                "upsert_by_external_id requires an external asset id".to_string(),
            ));
        }
        self.insert(new).await
    }

    async fn insert_pending(&self, new: NewVideoAsset) -> Result<VideoAsset, AppError> {
        self.insert(new).await
    }

    async fn find_by_external_id(
        &self,
        external_asset_id: &str,
    ) -> Result<Option<VideoAsset>, AppError> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .find(|r| r.external_asset_id.as_deref() == Some(external_asset_id))
            .cloned())
    }

    async fn find_by_local_id(&self, local_id: Uuid) -> Result<Option<VideoAsset>, AppError> {
        Ok(self.records.lock().await.get(&local_id).cloned())
    }

    async fn find_by_upload_id(
        &self,
        external_upload_id: &str,
    ) -> Result<Option<VideoAsset>, AppError> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .find(|r| r.external_upload_id.as_deref() == Some(external_upload_id))
            .cloned())
    }

    async fn update_fields(
        &self,
        local_id: Uuid,
        update: &VideoAssetUpdate,
    ) -> Result<Option<VideoAsset>, AppError> {
        let mut records = self.records.lock().await;

        match records.get(&local_id) {
            Some(current) if update.permits(current.lifecycle_state) => {}
            _ => return Ok(None),
        }

        if let Some(err) =
            Self::conflicts(&records, local_id, update.external_asset_id.as_deref(), None)
        {
            return Err(err);
        }

        let Some(asset) = records.get_mut(&local_id) else {
            return Ok(None);
        };
        // ready_at is only ever set once
        let mut update = update.clone();
        if asset.ready_at.is_some() {
            update.ready_at = None;
        }
        update.apply_to(asset, Utc::now());

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(asset.clone()))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryOrphanedEventLog {
    events: Arc<Mutex<Vec<OrphanedEvent>>>,
}

impl InMemoryOrphanedEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<OrphanedEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl OrphanedEventLog for InMemoryOrphanedEventLog {
    async fn record(&self, event: &OrphanedEvent) -> Result<(), AppError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_external_id_is_distinguishable() {
        let store = InMemoryVideoAssetStore::new();
        store
            .upsert_by_external_id(NewVideoAsset::preparing(Uuid::new_v4(), "a.mp4", "EA1"))
            .await
            .unwrap();

        let result = store
            .upsert_by_external_id(NewVideoAsset::preparing(Uuid::new_v4(), "b.mp4", "EA1"))
            .await;

        assert!(matches!(result, Err(AppError::DuplicateAsset { .. })));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_same_local_id_converges() {
        let store = InMemoryVideoAssetStore::new();
        let local_id = Uuid::new_v4();
        let first = store
            .upsert_by_external_id(NewVideoAsset::preparing(local_id, "a.mp4", "EA1"))
            .await
            .unwrap();
        let second = store
            .upsert_by_external_id(NewVideoAsset::preparing(local_id, "a.mp4", "EA1"))
            .await
            .unwrap();

        assert_eq!(first.local_id, second.local_id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_guarded_update_rejected_for_wrong_state() {
        let store = InMemoryVideoAssetStore::new();
        let local_id = Uuid::new_v4();
        store
            .upsert_by_external_id(NewVideoAsset::preparing(local_id, "a.mp4", "EA1"))
            .await
            .unwrap();
        store
            .update_fields(
                local_id,
                &VideoAssetUpdate {
                    lifecycle_state: Some(LifecycleState::Ready),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let downgrade = VideoAssetUpdate {
            lifecycle_state: Some(LifecycleState::Errored),
            ..Default::default()
        }
        .guarded_by(&LifecycleState::ERRORED_SOURCES);

        let result = store.update_fields(local_id, &downgrade).await.unwrap();
        assert!(result.is_none());
        let current = store.find_by_local_id(local_id).await.unwrap().unwrap();
        assert_eq!(current.lifecycle_state, LifecycleState::Ready);
    }

    #[tokio::test]
    async fn test_find_by_upload_id() {
        let store = InMemoryVideoAssetStore::new();
        let local_id = Uuid::new_v4();
        store
            .insert_pending(NewVideoAsset::awaiting_upload(local_id, "direct-upload", "UP1"))
            .await
            .unwrap();

        let found = store.find_by_upload_id("UP1").await.unwrap().unwrap();
        assert_eq!(found.local_id, local_id);
        assert_eq!(found.lifecycle_state, LifecycleState::Pending);
        assert!(store.find_by_external_id("UP1").await.unwrap().is_none());
    }
}
