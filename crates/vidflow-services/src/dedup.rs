use std::future::Future;
use std::sync::Arc;
use vidflow_core::models::VideoAsset;
use vidflow_core::AppError;
use vidflow_db::VideoAssetStore;

/// Lookup plus creation together are tried at most this many times.
const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct FindOrCreate {
    pub asset: VideoAsset,
    pub created: bool,
}

/// Keeps one local record per remote asset.
///
/// Relies on the store's unique index on `external_asset_id`; no in-process
/// locking. A lost creation race is resolved by one more lookup.
#[derive(Clone)]
pub struct DeduplicationGuard {
    store: Arc<dyn VideoAssetStore>,
}

impl DeduplicationGuard {
    pub fn new(store: Arc<dyn VideoAssetStore>) -> Self {
        Self { store }
    }

    pub async fn find(&self, external_asset_id: &str) -> Result<Option<VideoAsset>, AppError> {
        self.store.find_by_external_id(external_asset_id).await
    }

    #[tracing::instrument(skip(self, create))]
    pub async fn find_or_create<F, Fut>(
        &self,
        external_asset_id: &str,
        create: F,
    ) -> Result<FindOrCreate, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<VideoAsset, AppError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            if let Some(asset) = self.find(external_asset_id).await? {
                return Ok(FindOrCreate {
                    asset,
                    created: false,
                });
            }

            match create().await {
                Ok(asset) => {
                    return Ok(FindOrCreate {
                        asset,
                        created: true,
                    })
                }
                Err(AppError::DuplicateAsset { .. }) if attempt < MAX_ATTEMPTS => {
                    tracing::info!(
                        attempt,
                        "Lost creation race for external asset, looking it up again"
                    );
                }
                Err(err @ AppError::DuplicateAsset { .. }) => {
                    tracing::error!(
                        attempt,
                        "Unique violation persisted after retry, giving up"
                    );
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;
    use uuid::Uuid;
    use vidflow_core::models::NewVideoAsset;
    use vidflow_db::InMemoryVideoAssetStore;

    #[tokio::test]
    async fn test_existing_record_is_returned_without_creation() {
        let store = InMemoryVideoAssetStore::new();
        let existing = store
            .upsert_by_external_id(NewVideoAsset::preparing(Uuid::new_v4(), "a.mp4", "EA1"))
            .await
            .unwrap();
        let guard = DeduplicationGuard::new(Arc::new(store.clone()));

        let calls = AtomicUsize::new(0);
        let result = guard
            .find_or_create("EA1", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Internal("should not run".to_string()))
            })
            .await
            .unwrap();

        assert!(!result.created);
        assert_eq!(result.asset.local_id, existing.local_id);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_converge_on_one_record() {
        let store = InMemoryVideoAssetStore::new();
        let guard = DeduplicationGuard::new(Arc::new(store.clone()));
        let n = 16;

        let mut handles = Vec::new();
        for _ in 0..n {
            let guard = guard.clone();
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let local_id = Uuid::new_v4();
                guard
                    .find_or_create("EA1", || {
                        let store = store.clone();
                        async move {
                            store
                                .upsert_by_external_id(NewVideoAsset::preparing(
                                    local_id, "a.mp4", "EA1",
                                ))
                                .await
                        }
                    })
                    .await
            }));
        }

        let mut local_ids = Vec::new();
        for handle in handles {
            local_ids.push(handle.await.unwrap().unwrap().asset.local_id);
        }

        assert_eq!(store.len().await, 1);
        let winner = store.find_by_external_id("EA1").await.unwrap().unwrap();
        assert!(local_ids.iter().all(|id| *id == winner.local_id));
    }

    #[tokio::test]
    async fn test_duplicate_race_resolves_to_winner() {
        let store = InMemoryVideoAssetStore::new();
        let guard = DeduplicationGuard::new(Arc::new(store.clone()));
        // Both callers pass the initial lookup before either inserts.
        let barrier = Arc::new(Barrier::new(2));

        let spawn_caller = |local_id: Uuid| {
            let guard = guard.clone();
            let store = store.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                let attempts = AtomicUsize::new(0);
                let result = guard
                    .find_or_create("EA2", || {
                        let store = store.clone();
                        let barrier = barrier.clone();
                        let first = attempts.fetch_add(1, Ordering::SeqCst) == 0;
                        async move {
                            if first {
                                barrier.wait().await;
                            }
                            store
                                .upsert_by_external_id(NewVideoAsset::preparing(
                                    local_id, "a.mp4", "EA2",
                                ))
                                .await
                        }
                    })
                    .await;
                (result, attempts.load(Ordering::SeqCst))
            })
        };

        let a = spawn_caller(Uuid::new_v4());
        let b = spawn_caller(Uuid::new_v4());
        let (result_a, attempts_a) = a.await.unwrap();
        let (result_b, attempts_b) = b.await.unwrap();
        let result_a = result_a.unwrap();
        let result_b = result_b.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.write_count(), 1);
        assert_eq!(result_a.asset.local_id, result_b.asset.local_id);
        assert_ne!(result_a.created, result_b.created);
        assert_eq!(attempts_a + attempts_b, 2);
    }

    #[tokio::test]
    async fn test_second_violation_is_hard_error() {
        let store = InMemoryVideoAssetStore::new();
        let guard = DeduplicationGuard::new(Arc::new(store));
        let calls = AtomicUsize::new(0);

        let result = guard
            .find_or_create("EA3", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::DuplicateAsset {
                    external_asset_id: "EA3".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::DuplicateAsset { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let store = InMemoryVideoAssetStore::new();
        let guard = DeduplicationGuard::new(Arc::new(store));
        let calls = AtomicUsize::new(0);

        let result = guard
            .find_or_create("EA4", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Storage("disk full".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
