//! Application state.
//!
//! Collaborators are built once in the setup code (or by tests) and handed to
//! [`AppState::assemble`], which wires the services and starts the lifecycle
//! event consumer.

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vidflow_core::{Config, PlaybackUrlBuilder};
use vidflow_db::{OrphanedEventLog, VideoAssetStore};
use vidflow_provider::ProviderClient;
use vidflow_services::events::DEFAULT_EVENT_CAPACITY;
use vidflow_services::{
    AssetLifecycleManager, CompletionWaiter, EventPublisher, LifecycleConfig,
    LifecycleEventConsumer, ThumbnailChain, ThumbnailConfig, WaitPolicy, WebhookProcessor,
    WebhookVerifier,
};
use vidflow_storage::Storage;

/// Externally backed dependencies.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn VideoAssetStore>,
    pub orphans: Arc<dyn OrphanedEventLog>,
    pub provider: Arc<dyn ProviderClient>,
    pub storage: Arc<dyn Storage>,
    /// Present in production; in-memory setups have no pool to probe.
    pub pool: Option<PgPool>,
}

/// Tunables derived from configuration.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub urls: PlaybackUrlBuilder,
    pub lifecycle: LifecycleConfig,
    pub thumbnails: ThumbnailConfig,
    pub wait_policy: WaitPolicy,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance: Duration,
    pub webhook_sync_budget: Duration,
    pub caption_language: Option<String>,
    pub event_capacity: usize,
}

impl AppSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            urls: config.playback_urls(),
            lifecycle: LifecycleConfig::from_config(config),
            thumbnails: ThumbnailConfig::from_config(config),
            wait_policy: WaitPolicy::from_config(config),
            webhook_secret: config.provider_webhook_secret().map(String::from),
            webhook_tolerance: config.webhook_tolerance(),
            webhook_sync_budget: config.webhook_sync_budget(),
            caption_language: config.caption_language().map(String::from),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Clone)]
pub struct WebhookState {
    pub processor: Arc<WebhookProcessor>,
    /// `None` when no signing secret is configured; deliveries are then refused.
    pub verifier: Option<WebhookVerifier>,
    pub sync_budget: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<AssetLifecycleManager>,
    pub waiter: Arc<CompletionWaiter>,
    pub thumbnails: Arc<ThumbnailChain>,
    pub webhooks: WebhookState,
    pub wait_policy: WaitPolicy,
    pub pool: Option<PgPool>,
    /// Cancelled on shutdown so in-flight waits return early.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire services around `collaborators` and spawn the event consumer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn assemble(collaborators: Collaborators, settings: AppSettings) -> Arc<Self> {
        let Collaborators {
            store,
            orphans,
            provider,
            storage,
            pool,
        } = collaborators;

        let (publisher, receiver) = EventPublisher::channel(settings.event_capacity);

        let lifecycle = Arc::new(AssetLifecycleManager::new(
            store.clone(),
            provider.clone(),
            storage.clone(),
            settings.urls.clone(),
            publisher,
            settings.lifecycle,
        ));

        let thumbnails = Arc::new(ThumbnailChain::standard(
            store,
            provider.clone(),
            storage,
            settings.urls,
            settings.thumbnails,
        ));

        LifecycleEventConsumer::new(provider, settings.caption_language)
            .with_thumbnails(thumbnails.clone())
            .spawn(receiver);

        let verifier = settings
            .webhook_secret
            .map(|secret| WebhookVerifier::new(secret, settings.webhook_tolerance));
        if verifier.is_none() {
            tracing::warn!("PROVIDER_WEBHOOK_SECRET not set; webhook deliveries will be refused");
        }

        Arc::new(Self {
            waiter: Arc::new(CompletionWaiter::new(lifecycle.clone())),
            webhooks: WebhookState {
                processor: Arc::new(WebhookProcessor::new(lifecycle.clone(), orphans)),
                verifier,
                sync_budget: settings.webhook_sync_budget,
            },
            lifecycle,
            thumbnails,
            wait_policy: settings.wait_policy,
            pool,
            shutdown: CancellationToken::new(),
        })
    }
}
