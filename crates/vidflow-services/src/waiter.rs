//! Polling fallback for callers that want the finished asset now.
//!
//! A timeout is not an error: the caller gets the last known record with
//! `timed_out` set and the webhook path completes the record later.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vidflow_core::models::VideoAsset;
use vidflow_core::{AppError, Config};

use crate::lifecycle::AssetLifecycleManager;

#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub deadline: Duration,
    /// Multiplier applied to the interval after each poll; 1.0 keeps it fixed.
    pub backoff_factor: f64,
    pub max_interval: Duration,
}

impl WaitPolicy {
    pub fn fixed(poll_interval: Duration, deadline: Duration) -> Self {
        Self {
            poll_interval,
            deadline,
            backoff_factor: 1.0,
            max_interval: poll_interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.wait_poll_interval(),
            deadline: config.wait_deadline(),
            backoff_factor: config.wait_backoff_factor(),
            max_interval: config.wait_max_interval(),
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff_factor.is_nan() || self.backoff_factor <= 1.0 {
            return current;
        }
        let cap = self.max_interval.max(self.poll_interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .map_or(cap, |next| next.min(cap))
    }
}

#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub asset: VideoAsset,
    pub timed_out: bool,
    pub cancelled: bool,
    pub polls: u32,
}

pub struct CompletionWaiter {
    lifecycle: Arc<AssetLifecycleManager>,
}

impl CompletionWaiter {
    pub fn new(lifecycle: Arc<AssetLifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Poll the provider until the record is terminal, the deadline passes or
    /// `cancel` fires.
    ///
    /// Transient provider errors are logged and polling continues;
    /// configuration errors end the wait with an error.
    #[tracing::instrument(skip(self, policy, cancel), fields(local_id = %local_id))]
    pub async fn wait_until_ready(
        &self,
        local_id: Uuid,
        policy: &WaitPolicy,
        cancel: &CancellationToken,
    ) -> Result<WaitOutcome, AppError> {
        let mut asset = self.lifecycle.get(local_id).await?;
        let deadline_at = Instant::now() + policy.deadline;
        let mut interval = policy.poll_interval;
        let mut polls = 0u32;

        let outcome = |asset: VideoAsset, timed_out: bool, cancelled: bool, polls: u32| {
            WaitOutcome {
                asset,
                timed_out,
                cancelled,
                polls,
            }
        };

        loop {
            if asset.lifecycle_state.is_terminal() {
                tracing::debug!(local_id = %local_id, polls, "Wait finished");
                return Ok(outcome(asset, false, false, polls));
            }

            if cancel.is_cancelled() {
                return Ok(outcome(asset, false, true, polls));
            }

            polls += 1;
            match self.poll_once(&asset).await {
                Ok(updated) => asset = updated,
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        local_id = %local_id,
                        poll = polls,
                        error = %e,
                        "Poll failed, will retry"
                    );
                    asset = self.lifecycle.get(local_id).await?;
                }
            }

            if asset.lifecycle_state.is_terminal() {
                continue;
            }

            let now = Instant::now();
            if now >= deadline_at {
                break;
            }
            let sleep_for = interval.min(deadline_at - now);

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(local_id = %local_id, polls, "Wait cancelled");
                    return Ok(outcome(asset, false, true, polls));
                }
                _ = tokio::time::sleep(sleep_for) => {}
            }

            if Instant::now() >= deadline_at {
                break;
            }
            interval = policy.next_interval(interval);
        }

        tracing::info!(
            local_id = %local_id,
            polls,
            state = %asset.lifecycle_state,
            "Wait deadline reached, returning partial record"
        );
        Ok(outcome(asset, true, false, polls))
    }

    /// Fetch the latest provider view of the record and apply it.
    async fn poll_once(&self, asset: &VideoAsset) -> Result<VideoAsset, AppError> {
        let provider = self.lifecycle.provider();

        let external_asset_id = match asset.external_asset_id {
            Some(ref id) => id.clone(),
            None => {
                let Some(ref upload_id) = asset.external_upload_id else {
                    return Ok(asset.clone());
                };
                let upload = provider.get_upload(upload_id).await?;
                match upload.asset_id {
                    Some(id) => id,
                    // Nothing uploaded yet.
                    None => return Ok(asset.clone()),
                }
            }
        };

        let snapshot = provider.get_asset(&external_asset_id).await?;
        self.lifecycle
            .apply_snapshot(asset.local_id, &snapshot)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPublisher;
    use crate::lifecycle::LifecycleConfig;
    use crate::test_helpers::{preparing_asset, ready_asset, MockProviderClient};
    use vidflow_core::models::{LifecycleState, NewVideoAsset, ProviderUpload};
    use vidflow_core::PlaybackUrlBuilder;
    use vidflow_db::{InMemoryVideoAssetStore, VideoAssetStore};
    use vidflow_provider::ProviderError;

    struct Harness {
        waiter: CompletionWaiter,
        store: InMemoryVideoAssetStore,
        provider: Arc<MockProviderClient>,
    }

    fn harness() -> Harness {
        let store = InMemoryVideoAssetStore::new();
        let provider = Arc::new(MockProviderClient::new());
        let lifecycle = AssetLifecycleManager::new(
            Arc::new(store.clone()),
            provider.clone(),
            Arc::new(crate::test_helpers::FailingStorage),
            PlaybackUrlBuilder::new("image.mux.com", "stream.mux.com", 1.0, "high"),
            EventPublisher::disabled(),
            LifecycleConfig::default(),
        );
        Harness {
            waiter: CompletionWaiter::new(Arc::new(lifecycle)),
            store,
            provider,
        }
    }

    async fn seed_preparing(h: &Harness, external_asset_id: &str) -> Uuid {
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

    fn policy() -> WaitPolicy {
        WaitPolicy::fixed(Duration::from_secs(1), Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_partial_record() {
        let h = harness();
        let local_id = seed_preparing(&h, "EA1").await;
        h.provider.set_asset(preparing_asset("EA1"));

        let started = Instant::now();
        let outcome = h
            .waiter
            .wait_until_ready(local_id, &policy(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert!(!outcome.cancelled);
        assert_eq!(outcome.polls, 5);
        assert_eq!(outcome.asset.lifecycle_state, LifecycleState::Preparing);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_as_soon_as_ready() {
        let h = harness();
        let local_id = seed_preparing(&h, "EA1").await;
        h.provider
            .push_asset_result("EA1", Ok(preparing_asset("EA1")))
            .push_asset_result("EA1", Ok(ready_asset("EA1", "PB1", 42.5)));

        let outcome = h
            .waiter
            .wait_until_ready(local_id, &policy(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.timed_out);
        assert_eq!(outcome.polls, 2);
        assert_eq!(outcome.asset.lifecycle_state, LifecycleState::Ready);
        assert_eq!(outcome.asset.external_playback_id.as_deref(), Some("PB1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_keep_polling() {
        let h = harness();
        let local_id = seed_preparing(&h, "EA1").await;
        h.provider
            .push_asset_result("EA1", Err(ProviderError::Transient("503".to_string())))
            .push_asset_result("EA1", Ok(ready_asset("EA1", "PB1", 3.0)));

        let outcome = h
            .waiter
            .wait_until_ready(local_id, &policy(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.polls, 2);
        assert_eq!(outcome.asset.lifecycle_state, LifecycleState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_error_ends_wait() {
        let h = harness();
        let local_id = seed_preparing(&h, "EA1").await;
        h.provider
            .fail_all_with(ProviderError::Configuration("no token".to_string()));

        let err = h
            .waiter
            .wait_until_ready(local_id, &policy(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(h.provider.call_count("get_asset"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let h = harness();
        let local_id = seed_preparing(&h, "EA1").await;
        h.provider.set_asset(preparing_asset("EA1"));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            trigger.cancel();
        });

        let outcome = h
            .waiter
            .wait_until_ready(local_id, &policy(), &cancel)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert!(!outcome.timed_out);
        assert_eq!(outcome.polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_slot_resolves_asset_through_upload() {
        let h = harness();
        let local_id = Uuid::new_v4();
        h.store
            .insert_pending(NewVideoAsset::awaiting_upload(local_id, "direct-uploads/UP1", "UP1"))
            .await
            .unwrap();
        h.provider
            .set_upload(ProviderUpload {
                id: "UP1".to_string(),
                status: Some("asset_created".to_string()),
                url: None,
                asset_id: Some("EA5".to_string()),
            })
            .set_asset(ready_asset("EA5", "PB5", 7.0));

        let outcome = h
            .waiter
            .wait_until_ready(local_id, &policy(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.asset.lifecycle_state, LifecycleState::Ready);
        assert_eq!(outcome.asset.external_asset_id.as_deref(), Some("EA5"));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = WaitPolicy {
            poll_interval: Duration::from_secs(1),
            deadline: Duration::from_secs(30),
            backoff_factor: 2.0,
            max_interval: Duration::from_secs(5),
        };
        let mut interval = policy.poll_interval;
        let mut seen = Vec::new();
        for _ in 0..5 {
            interval = policy.next_interval(interval);
            seen.push(interval.as_secs());
        }
        assert_eq!(seen, vec![2, 4, 5, 5, 5]);
    }

    #[test]
    fn test_non_finite_backoff_does_not_panic() {
        let mut policy = WaitPolicy {
            poll_interval: Duration::from_secs(1),
            deadline: Duration::from_secs(30),
            backoff_factor: f64::NAN,
            max_interval: Duration::from_secs(5),
        };
        assert_eq!(
            policy.next_interval(Duration::from_secs(1)),
            Duration::from_secs(1)
        );

        policy.backoff_factor = f64::INFINITY;
        assert_eq!(
            policy.next_interval(Duration::from_secs(1)),
            Duration::from_secs(5)
        );
    }
}
