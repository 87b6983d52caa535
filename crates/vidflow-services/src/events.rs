//! Domain events emitted by lifecycle transitions.
//!
//! The lifecycle manager only publishes; follow-up work (caption generation,
//! poster refresh) lives in [`LifecycleEventConsumer`], which runs as its own
//! task fed by a bounded channel.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;
use vidflow_provider::ProviderClient;

use crate::thumbnail::ThumbnailChain;

pub const DEFAULT_EVENT_CAPACITY: usize = 1_024;

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    AssetReady {
        local_id: Uuid,
        external_asset_id: Option<String>,
        playback_id: Option<String>,
        audio_track_id: Option<String>,
        source_object_key: String,
    },
    AssetErrored {
        local_id: Uuid,
        reason: String,
    },
}

impl LifecycleEvent {
    pub fn local_id(&self) -> Uuid {
        match self {
            LifecycleEvent::AssetReady { local_id, .. } => *local_id,
            LifecycleEvent::AssetErrored { local_id, .. } => *local_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::AssetReady { .. } => "asset_ready",
            LifecycleEvent::AssetErrored { .. } => "asset_errored",
        }
    }
}

/// Sending half of the event channel. Never blocks a transition.
#[derive(Clone, Default)]
pub struct EventPublisher {
    sender: Option<mpsc::Sender<LifecycleEvent>>,
}

impl EventPublisher {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LifecycleEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Publisher that discards every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: LifecycleEvent) {
        let Some(ref sender) = self.sender else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    local_id = %event.local_id(),
                    event = event.name(),
                    "Lifecycle event channel full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::debug!(
                    local_id = %event.local_id(),
                    event = event.name(),
                    "Lifecycle event consumer stopped, dropping event"
                );
            }
        }
    }
}

/// Handles lifecycle events off the request path.
pub struct LifecycleEventConsumer {
    provider: Arc<dyn ProviderClient>,
    thumbnails: Option<Arc<ThumbnailChain>>,
    caption_language: Option<String>,
}

impl LifecycleEventConsumer {
    pub fn new(provider: Arc<dyn ProviderClient>, caption_language: Option<String>) -> Self {
        Self {
            provider,
            thumbnails: None,
            caption_language,
        }
    }

    /// Rerun the poster chain when an asset becomes ready.
    pub fn with_thumbnails(mut self, thumbnails: Arc<ThumbnailChain>) -> Self {
        self.thumbnails = Some(thumbnails);
        self
    }

    pub fn spawn(self, mut receiver: mpsc::Receiver<LifecycleEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                self.handle(event).await;
            }
            tracing::info!("Lifecycle event consumer stopped");
        })
    }

    pub async fn handle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::AssetReady {
                local_id,
                external_asset_id,
                audio_track_id,
                source_object_key,
                ..
            } => {
                self.request_captions(
                    local_id,
                    external_asset_id.as_deref(),
                    audio_track_id.as_deref(),
                )
                .await;

                if let Some(ref chain) = self.thumbnails {
                    if let Err(e) = chain.generate(local_id, &source_object_key).await {
                        tracing::error!(
                            local_id = %local_id,
                            error = %e,
                            "Poster refresh after ready failed"
                        );
                    }
                }
            }
            LifecycleEvent::AssetErrored { local_id, reason } => {
                tracing::warn!(local_id = %local_id, reason = %reason, "Asset processing failed");
            }
        }
    }

    async fn request_captions(
        &self,
        local_id: Uuid,
        external_asset_id: Option<&str>,
        audio_track_id: Option<&str>,
    ) {
        let Some(ref language) = self.caption_language else {
            return;
        };
        let (Some(asset_id), Some(track_id)) = (external_asset_id, audio_track_id) else {
            tracing::debug!(local_id = %local_id, "No audio track, skipping caption generation");
            return;
        };

        match self
            .provider
            .request_generated_captions(asset_id, track_id, language)
            .await
        {
            Ok(()) => tracing::info!(
                local_id = %local_id,
                external_asset_id = %asset_id,
                language = %language,
                "Caption generation requested"
            ),
            Err(e) if e.is_configuration() => tracing::error!(
                local_id = %local_id,
                error = %e,
                "Caption generation not possible: provider misconfigured"
            ),
            Err(e) => tracing::warn!(
                local_id = %local_id,
                error = %e,
                "Caption generation request failed"
            ),
        }
    }
}
