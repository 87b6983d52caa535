//! Test helpers: an in-memory application behind an axum-test server.
//!
//! No database or network is needed: persistence is in memory, the provider is
//! scripted and storage is a temp directory.

use axum_test::TestServer;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vidflow_api::setup::routes::api_routes;
use vidflow_api::{AppSettings, AppState, Collaborators};
use vidflow_core::PlaybackUrlBuilder;
use vidflow_db::{InMemoryOrphanedEventLog, InMemoryVideoAssetStore, VideoAssetStore};
use vidflow_services::test_helpers::{InterferingStore, MockProviderClient};
use vidflow_services::{LifecycleConfig, ThumbnailConfig, WaitPolicy, WebhookVerifier};
use vidflow_storage::LocalStorage;

pub const WEBHOOK_SECRET: &str = "whsec_integration";

pub struct TestApp {
    pub server: TestServer,
    pub store: InMemoryVideoAssetStore,
    pub orphans: InMemoryOrphanedEventLog,
    pub provider: Arc<MockProviderClient>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn test_settings(webhook_secret: Option<&str>) -> AppSettings {
    AppSettings {
        urls: PlaybackUrlBuilder::new("image.mux.com", "stream.mux.com", 1.0, "high"),
        lifecycle: LifecycleConfig::default(),
        thumbnails: ThumbnailConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
            ffmpeg_timeout: Duration::from_secs(5),
            placeholder_width: 64,
            placeholder_height: 36,
        },
        wait_policy: WaitPolicy::fixed(Duration::from_millis(20), Duration::from_millis(300)),
        webhook_secret: webhook_secret.map(String::from),
        webhook_tolerance: Duration::from_secs(300),
        webhook_sync_budget: Duration::from_secs(2),
        caption_language: None,
        event_capacity: 64,
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(test_settings(Some(WEBHOOK_SECRET))).await
}

pub async fn setup_test_app_with(settings: AppSettings) -> TestApp {
    build_test_app(settings, |store| Arc::new(store.clone())).await
}

/// Like [`setup_test_app_with`], but every record update is delayed by `delay`.
pub async fn setup_slow_store_app(settings: AppSettings, delay: Duration) -> TestApp {
    build_test_app(settings, |store| {
        Arc::new(InterferingStore::slow(store.clone(), delay))
    })
    .await
}

async fn build_test_app(
    settings: AppSettings,
    wrap_store: impl FnOnce(&InMemoryVideoAssetStore) -> Arc<dyn VideoAssetStore>,
) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage = LocalStorage::new(temp_dir.path(), "http://localhost/media".to_string())
        .await
        .expect("Failed to create local storage");

    let store = InMemoryVideoAssetStore::new();
    let orphans = InMemoryOrphanedEventLog::new();
    let provider = Arc::new(MockProviderClient::new());

    let state = AppState::assemble(
        Collaborators {
            store: wrap_store(&store),
            orphans: Arc::new(orphans.clone()),
            provider: provider.clone(),
            storage: Arc::new(storage),
            pool: None,
        },
        settings,
    );

    let server = TestServer::new(api_routes(state)).expect("Failed to start test server");

    TestApp {
        server,
        store,
        orphans,
        provider,
        _temp_dir: temp_dir,
    }
}

/// Signature header value for `body`, signed now.
pub fn sign(body: &[u8]) -> String {
    WebhookVerifier::new(WEBHOOK_SECRET, Duration::from_secs(300))
        .sign(Utc::now().timestamp(), body)
        .expect("Failed to sign body")
}
