//! Inbound provider webhook events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::provider::{PlaybackId, ProviderAsset, ProviderAssetStatus, ProviderTrack};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    AssetCreated,
    UploadAssetCreated,
    AssetReady,
    AssetErrored,
    AssetUpdated,
    Unrecognized(String),
}

impl WebhookEventType {
    /// Parse a provider event name. The `video.` namespace prefix is optional.
    pub fn parse(raw: &str) -> Self {
        let name = raw.strip_prefix("video.").unwrap_or(raw);
        match name {
            "asset.created" => WebhookEventType::AssetCreated,
            "upload.asset_created" => WebhookEventType::UploadAssetCreated,
            "asset.ready" => WebhookEventType::AssetReady,
            "asset.errored" => WebhookEventType::AssetErrored,
            "asset.updated" => WebhookEventType::AssetUpdated,
            _ => WebhookEventType::Unrecognized(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::AssetCreated => "asset.created",
            WebhookEventType::UploadAssetCreated => "upload.asset_created",
            WebhookEventType::AssetReady => "asset.ready",
            WebhookEventType::AssetErrored => "asset.errored",
            WebhookEventType::AssetUpdated => "asset.updated",
            WebhookEventType::Unrecognized(raw) => raw,
        }
    }

    /// `upload.*` events carry the upload id as their object id.
    pub fn is_upload_event(&self) -> bool {
        matches!(self, WebhookEventType::UploadAssetCreated)
    }
}

impl Display for WebhookEventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Raw wire shape of a webhook body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub event_type: String,
    pub object: WebhookObject,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookObject {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebhookData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub passthrough: Option<String>,
    #[serde(default)]
    pub status: Option<ProviderAssetStatus>,
    #[serde(default)]
    pub playback_ids: Vec<PlaybackId>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub errors: Option<JsonValue>,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub tracks: Vec<ProviderTrack>,
    /// Upload events nest the passthrough inside the settings for the asset to be created.
    #[serde(default)]
    pub new_asset_settings: Option<NewAssetSettings>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewAssetSettings {
    #[serde(default)]
    pub passthrough: Option<String>,
}

/// A verified, parsed webhook event. Processing must be safe to repeat.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: WebhookEventType,
    pub object_id: String,
    pub external_asset_id: Option<String>,
    pub external_upload_id: Option<String>,
    /// Raw passthrough token as sent by the provider.
    pub passthrough: Option<String>,
    pub snapshot: ProviderAsset,
    pub payload: JsonValue,
    pub received_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Parse a raw body into an event.
    pub fn from_slice(body: &[u8], received_at: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        let payload: JsonValue = serde_json::from_slice(body)?;
        let parsed: WebhookPayload = serde_json::from_value(payload.clone())?;
        Ok(Self::from_payload(parsed, payload, received_at))
    }

    pub fn from_payload(
        parsed: WebhookPayload,
        payload: JsonValue,
        received_at: DateTime<Utc>,
    ) -> Self {
        let event_type = WebhookEventType::parse(&parsed.event_type);
        let data = parsed.data;
        let object_id = parsed.object.id;

        let (external_asset_id, external_upload_id) = if event_type.is_upload_event() {
            (data.asset_id.clone(), Some(object_id.clone()))
        } else {
            (Some(object_id.clone()), data.upload_id.clone())
        };

        let passthrough = data
            .passthrough
            .clone()
            .or_else(|| data.new_asset_settings.and_then(|s| s.passthrough))
            .filter(|p| !p.trim().is_empty());

        let snapshot = ProviderAsset {
            id: external_asset_id.clone().unwrap_or_default(),
            status: data.status.unwrap_or_default(),
            playback_ids: data.playback_ids,
            duration: data.duration,
            aspect_ratio: data.aspect_ratio,
            upload_id: external_upload_id.clone(),
            passthrough: passthrough.clone(),
            tracks: data.tracks,
            errors: data.errors,
        };

        Self {
            event_type,
            object_id,
            external_asset_id,
            external_upload_id,
            passthrough,
            snapshot,
            payload,
            received_at,
        }
    }

    /// Passthrough token interpreted as a local id, when it is one.
    pub fn passthrough_local_id(&self) -> Option<Uuid> {
        self.passthrough
            .as_deref()
            .and_then(|p| Uuid::parse_str(p.trim()).ok())
    }
}

/// A verified event that could not be joined to any local record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanedEvent {
    pub id: Uuid,
    pub event_type: String,
    pub object_id: String,
    pub payload: JsonValue,
    pub received_at: DateTime<Utc>,
}

impl From<&WebhookEvent> for OrphanedEvent {
    fn from(event: &WebhookEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event.event_type.to_string(),
            object_id: event.object_id.clone(),
            payload: event.payload.clone(),
            received_at: event.received_at,
        }
    }
}
