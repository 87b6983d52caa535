use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Coarse processing status of an asset.
///
/// Only ever advances `Pending -> Preparing -> {Ready | Errored}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "lifecycle_state", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Pending,
    Preparing,
    Ready,
    Errored,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Errored)
    }

    /// States from which `preparing` may still be applied.
    pub fn accepts_preparing(&self) -> bool {
        matches!(self, LifecycleState::Pending | LifecycleState::Preparing)
    }

    /// States from which `ready` may be applied. An errored record is never promoted.
    pub const READY_SOURCES: [LifecycleState; 3] = [
        LifecycleState::Pending,
        LifecycleState::Preparing,
        LifecycleState::Ready,
    ];

    /// States from which `errored` may be applied. A ready record is never downgraded.
    pub const ERRORED_SOURCES: [LifecycleState; 3] = [
        LifecycleState::Pending,
        LifecycleState::Preparing,
        LifecycleState::Errored,
    ];

    pub const PREPARING_SOURCES: [LifecycleState; 2] =
        [LifecycleState::Pending, LifecycleState::Preparing];
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            LifecycleState::Pending => write!(f, "pending"),
            LifecycleState::Preparing => write!(f, "preparing"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::Errored => write!(f, "errored"),
        }
    }
}

/// Which fallback strategy produced the stored poster image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "thumbnail_source", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailSource {
    ProviderCapture,
    LocalExtraction,
    Placeholder,
}

impl ThumbnailSource {
    /// Higher wins when two strategies have produced a poster for the same asset.
    pub fn authority(&self) -> u8 {
        match self {
            ThumbnailSource::ProviderCapture => 3,
            ThumbnailSource::LocalExtraction => 2,
            ThumbnailSource::Placeholder => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbnailSource::ProviderCapture => "provider_capture",
            ThumbnailSource::LocalExtraction => "local_extraction",
            ThumbnailSource::Placeholder => "placeholder",
        }
    }
}

impl Display for ThumbnailSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThumbnailSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider_capture" => Ok(ThumbnailSource::ProviderCapture),
            "local_extraction" => Ok(ThumbnailSource::LocalExtraction),
            "placeholder" => Ok(ThumbnailSource::Placeholder),
            _ => Err(anyhow::anyhow!("Invalid thumbnail source: {}", s)),
        }
    }
}

/// Public URLs derived from a playback id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DerivedUrls {
    pub thumbnail_url: String,
    pub stream_url: String,
    pub download_url: String,
}

/// Local record tracking one provider asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct VideoAsset {
    pub local_id: Uuid,
    pub external_asset_id: Option<String>,
    pub external_playback_id: Option<String>,
    pub external_upload_id: Option<String>,
    pub lifecycle_state: LifecycleState,
    pub derived_urls: Option<DerivedUrls>,
    pub duration_seconds: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub source_object_key: String,
    pub title: Option<String>,
    pub error_reason: Option<String>,
    pub poster_url: Option<String>,
    pub poster_strategy: Option<ThumbnailSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new local record.
#[derive(Debug, Clone)]
pub struct NewVideoAsset {
    pub local_id: Uuid,
    pub source_object_key: String,
    pub title: Option<String>,
    pub external_asset_id: Option<String>,
    pub external_upload_id: Option<String>,
    pub lifecycle_state: LifecycleState,
}

impl NewVideoAsset {
    /// Record for an asset the provider has already accepted.
    pub fn preparing(
        local_id: Uuid,
        source_object_key: impl Into<String>,
        external_asset_id: impl Into<String>,
    ) -> Self {
        Self {
            local_id,
            source_object_key: source_object_key.into(),
            title: None,
            external_asset_id: Some(external_asset_id.into()),
            external_upload_id: None,
            lifecycle_state: LifecycleState::Preparing,
        }
    }

    /// Record for a direct-upload slot whose asset does not exist yet.
    pub fn awaiting_upload(
        local_id: Uuid,
        source_object_key: impl Into<String>,
        external_upload_id: impl Into<String>,
    ) -> Self {
        Self {
            local_id,
            source_object_key: source_object_key.into(),
            title: None,
            external_asset_id: None,
            external_upload_id: Some(external_upload_id.into()),
            lifecycle_state: LifecycleState::Pending,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }
}

/// Partial update. `None` leaves a column untouched; columns are never cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoAssetUpdate {
    pub external_asset_id: Option<String>,
    pub external_playback_id: Option<String>,
    pub lifecycle_state: Option<LifecycleState>,
    pub derived_urls: Option<DerivedUrls>,
    pub duration_seconds: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub error_reason: Option<String>,
    pub poster_url: Option<String>,
    pub poster_strategy: Option<ThumbnailSource>,
    pub ready_at: Option<DateTime<Utc>>,
    /// Apply only while the row is in one of these states. Empty means unconditional.
    pub require_state_in: Vec<LifecycleState>,
}

impl VideoAssetUpdate {
    /// True when the update carries no column changes.
    pub fn is_empty(&self) -> bool {
        self.external_asset_id.is_none()
            && self.external_playback_id.is_none()
            && self.lifecycle_state.is_none()
            && self.derived_urls.is_none()
            && self.duration_seconds.is_none()
            && self.aspect_ratio.is_none()
            && self.error_reason.is_none()
            && self.poster_url.is_none()
            && self.poster_strategy.is_none()
            && self.ready_at.is_none()
    }

    pub fn guarded_by(mut self, states: &[LifecycleState]) -> Self {
        self.require_state_in = states.to_vec();
        self
    }

    /// Whether a row currently in `state` satisfies the guard.
    pub fn permits(&self, state: LifecycleState) -> bool {
        self.require_state_in.is_empty() || self.require_state_in.contains(&state)
    }

    /// Apply this update to an in-memory record.
    pub fn apply_to(&self, asset: &mut VideoAsset, now: DateTime<Utc>) {
        if let Some(ref v) = self.external_asset_id {
            asset.external_asset_id = Some(v.clone());
        }
        if let Some(ref v) = self.external_playback_id {
            asset.external_playback_id = Some(v.clone());
        }
        if let Some(v) = self.lifecycle_state {
            asset.lifecycle_state = v;
        }
        if let Some(ref v) = self.derived_urls {
            asset.derived_urls = Some(v.clone());
        }
        if let Some(v) = self.duration_seconds {
            asset.duration_seconds = Some(v);
        }
        if let Some(ref v) = self.aspect_ratio {
            asset.aspect_ratio = Some(v.clone());
        }
        if let Some(ref v) = self.error_reason {
            asset.error_reason = Some(v.clone());
        }
        if let Some(ref v) = self.poster_url {
            asset.poster_url = Some(v.clone());
        }
        if let Some(v) = self.poster_strategy {
            asset.poster_strategy = Some(v);
        }
        if let Some(v) = self.ready_at {
            asset.ready_at = Some(v);
        }
        asset.updated_at = now;
    }
}

impl VideoAsset {
    /// Build a fresh record from an insert payload.
    pub fn from_new(new: NewVideoAsset, now: DateTime<Utc>) -> Self {
        Self {
            local_id: new.local_id,
            external_asset_id: new.external_asset_id,
            external_playback_id: None,
            external_upload_id: new.external_upload_id,
            lifecycle_state: new.lifecycle_state,
            derived_urls: None,
            duration_seconds: None,
            aspect_ratio: None,
            source_object_key: new.source_object_key,
            title: new.title,
            error_reason: None,
            poster_url: None,
            poster_strategy: None,
            created_at: now,
            updated_at: now,
            ready_at: None,
        }
    }
}
