//! Configuration module
//!
//! Settings are read from the environment (a `.env` file is loaded by the
//! binary before this runs). Missing optional values fall back to defaults;
//! unparsable values fall back too, except the server port.

use std::env;
use std::time::Duration;

use crate::storage_backend::StorageBackend;
use crate::urls::PlaybackUrlBuilder;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const PROVIDER_TIMEOUT_SECS: u64 = 15;
const WEBHOOK_TOLERANCE_SECS: u64 = 300;
const WEBHOOK_SYNC_BUDGET_MS: u64 = 2_000;
const SOURCE_URL_TTL_SECS: u64 = 6 * 3600;
const WAIT_POLL_INTERVAL_MS: u64 = 1_000;
const WAIT_DEADLINE_SECS: u64 = 20;
const WAIT_BACKOFF_FACTOR: f64 = 1.0;
const WAIT_MAX_INTERVAL_MS: u64 = 5_000;
const FFMPEG_TIMEOUT_SECS: u64 = 60;
const PLACEHOLDER_WIDTH: u32 = 640;
const PLACEHOLDER_HEIGHT: u32 = 360;
const THUMBNAIL_TIME_SECS: f64 = 1.0;

/// Settings shared by every process in the workspace
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
}

/// Ingest pipeline configuration
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Provider
    pub provider_base_url: String,
    pub provider_token_id: Option<String>,
    pub provider_token_secret: Option<String>,
    pub provider_timeout_seconds: u64,
    pub provider_webhook_secret: Option<String>,
    pub webhook_tolerance_seconds: u64,
    pub webhook_sync_budget_ms: u64,
    // Derived URLs
    pub playback_image_host: String,
    pub playback_stream_host: String,
    pub thumbnail_time_seconds: f64,
    pub download_quality: String,
    // Storage
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub source_url_ttl_seconds: u64,
    // Synchronous wait
    pub wait_poll_interval_ms: u64,
    pub wait_deadline_seconds: u64,
    pub wait_backoff_factor: f64,
    pub wait_max_interval_ms: u64,
    // Thumbnails
    pub ffmpeg_path: String,
    pub ffmpeg_timeout_seconds: u64,
    pub placeholder_width: u32,
    pub placeholder_height: u32,
    // Captions requested after an asset becomes ready
    pub caption_language: Option<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<IngestConfig>);

impl Config {
    fn inner(&self) -> &IngestConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = IngestConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn provider_base_url(&self) -> &str {
        &self.inner().provider_base_url
    }

    /// Token id and secret, only when both are present.
    pub fn provider_credentials(&self) -> Option<(String, String)> {
        let inner = self.inner();
        match (&inner.provider_token_id, &inner.provider_token_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.clone(), secret.clone()))
            }
            _ => None,
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().provider_timeout_seconds)
    }

    pub fn provider_webhook_secret(&self) -> Option<&str> {
        self.inner()
            .provider_webhook_secret
            .as_deref()
            .filter(|s| !s.is_empty())
    }

    pub fn webhook_tolerance(&self) -> Duration {
        Duration::from_secs(self.inner().webhook_tolerance_seconds)
    }

    pub fn webhook_sync_budget(&self) -> Duration {
        Duration::from_millis(self.inner().webhook_sync_budget_ms)
    }

    pub fn playback_urls(&self) -> PlaybackUrlBuilder {
        let inner = self.inner();
        PlaybackUrlBuilder::new(
            &inner.playback_image_host,
            &inner.playback_stream_host,
            inner.thumbnail_time_seconds,
            inner.download_quality.clone(),
        )
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn source_url_ttl(&self) -> Duration {
        Duration::from_secs(self.inner().source_url_ttl_seconds)
    }

    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.inner().wait_poll_interval_ms)
    }

    pub fn wait_deadline(&self) -> Duration {
        Duration::from_secs(self.inner().wait_deadline_seconds)
    }

    pub fn wait_backoff_factor(&self) -> f64 {
        self.inner().wait_backoff_factor
    }

    pub fn wait_max_interval(&self) -> Duration {
        Duration::from_millis(self.inner().wait_max_interval_ms)
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    pub fn ffmpeg_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().ffmpeg_timeout_seconds)
    }

    pub fn placeholder_dimensions(&self) -> (u32, u32) {
        (
            self.inner().placeholder_width,
            self.inner().placeholder_height,
        )
    }

    pub fn caption_language(&self) -> Option<&str> {
        self.inner().caption_language.as_deref()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            environment,
        };

        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(raw) => Some(raw.parse::<StorageBackend>()?),
            None => None,
        };

        Ok(IngestConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            provider_base_url: env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://api.mux.com".to_string()),
            provider_token_id: env_opt("PROVIDER_TOKEN_ID"),
            provider_token_secret: env_opt("PROVIDER_TOKEN_SECRET"),
            provider_timeout_seconds: env_or("PROVIDER_TIMEOUT_SECONDS", PROVIDER_TIMEOUT_SECS),
            provider_webhook_secret: env_opt("PROVIDER_WEBHOOK_SECRET"),
            webhook_tolerance_seconds: env_or("WEBHOOK_TOLERANCE_SECONDS", WEBHOOK_TOLERANCE_SECS),
            webhook_sync_budget_ms: env_or("WEBHOOK_SYNC_BUDGET_MS", WEBHOOK_SYNC_BUDGET_MS),
            playback_image_host: env::var("PLAYBACK_IMAGE_HOST")
                .unwrap_or_else(|_| "image.mux.com".to_string()),
            playback_stream_host: env::var("PLAYBACK_STREAM_HOST")
                .unwrap_or_else(|_| "stream.mux.com".to_string()),
            thumbnail_time_seconds: env_or("THUMBNAIL_TIME_SECONDS", THUMBNAIL_TIME_SECS),
            download_quality: env::var("DOWNLOAD_QUALITY").unwrap_or_else(|_| "high".to_string()),
            storage_backend,
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION"),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            local_storage_base_url: env_opt("LOCAL_STORAGE_BASE_URL"),
            source_url_ttl_seconds: env_or("SOURCE_URL_TTL_SECONDS", SOURCE_URL_TTL_SECS),
            wait_poll_interval_ms: env_or("WAIT_POLL_INTERVAL_MS", WAIT_POLL_INTERVAL_MS),
            wait_deadline_seconds: env_or("WAIT_DEADLINE_SECONDS", WAIT_DEADLINE_SECS),
            wait_backoff_factor: env_or("WAIT_BACKOFF_FACTOR", WAIT_BACKOFF_FACTOR),
            wait_max_interval_ms: env_or("WAIT_MAX_INTERVAL_MS", WAIT_MAX_INTERVAL_MS),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffmpeg_timeout_seconds: env_or("FFMPEG_TIMEOUT_SECONDS", FFMPEG_TIMEOUT_SECS),
            placeholder_width: env_or("PLACEHOLDER_WIDTH", PLACEHOLDER_WIDTH),
            placeholder_height: env_or("PLACEHOLDER_HEIGHT", PLACEHOLDER_HEIGHT),
            caption_language: env_opt("CAPTION_LANGUAGE"),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.provider_token_id.is_some() != self.provider_token_secret.is_some() {
            return Err(anyhow::anyhow!(
                "PROVIDER_TOKEN_ID and PROVIDER_TOKEN_SECRET must be set together"
            ));
        }

        if self.wait_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("WAIT_POLL_INTERVAL_MS must be greater than 0"));
        }

        if !self.wait_backoff_factor.is_finite() || self.wait_backoff_factor < 1.0 {
            return Err(anyhow::anyhow!(
                "WAIT_BACKOFF_FACTOR must be a finite number of at least 1.0"
            ));
        }

        if self.placeholder_width == 0 || self.placeholder_height == 0 {
            return Err(anyhow::anyhow!("Placeholder dimensions must be non-zero"));
        }

        match self.storage_backend {
            Some(StorageBackend::S3) if self.s3_bucket.is_none() => Err(anyhow::anyhow!(
                "STORAGE_BACKEND=s3 requires S3_BUCKET to be set"
            )),
            Some(StorageBackend::Local) | None if self.local_storage_path.is_none() => Err(
                anyhow::anyhow!("Local storage requires LOCAL_STORAGE_PATH to be set"),
            ),
            _ => Ok(()),
        }
    }
}
