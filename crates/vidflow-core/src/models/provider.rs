//! Provider-side views of assets and upload slots.
//!
//! These are the shapes returned by the provider's REST API and embedded in
//! webhook payloads. Unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// Status reported by the provider for an asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderAssetStatus {
    Preparing,
    Ready,
    Errored,
    #[serde(other)]
    Unknown,
}

impl Default for ProviderAssetStatus {
    fn default() -> Self {
        ProviderAssetStatus::Unknown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPolicy {
    Public,
    Signed,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        PlaybackPolicy::Public
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackId {
    pub id: String,
    #[serde(default)]
    pub policy: Option<PlaybackPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderTrack {
    pub id: String,
    #[serde(rename = "type", default)]
    pub track_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Snapshot of a remote asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProviderAsset {
    pub id: String,
    #[serde(default)]
    pub status: ProviderAssetStatus,
    #[serde(default)]
    pub playback_ids: Vec<PlaybackId>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub passthrough: Option<String>,
    #[serde(default)]
    pub tracks: Vec<ProviderTrack>,
    /// Either `{type, messages: [..]}` or a bare list, depending on the event.
    #[serde(default)]
    pub errors: Option<JsonValue>,
}

impl ProviderAsset {
    /// Playback id used to derive public URLs. Public ids are preferred.
    pub fn primary_playback_id(&self) -> Option<&str> {
        self.playback_ids
            .iter()
            .find(|p| matches!(p.policy, None | Some(PlaybackPolicy::Public)))
            .or_else(|| self.playback_ids.first())
            .map(|p| p.id.as_str())
    }

    /// First audio track, needed to request generated captions.
    pub fn audio_track_id(&self) -> Option<&str> {
        self.tracks
            .iter()
            .find(|t| t.track_type.as_deref() == Some("audio"))
            .map(|t| t.id.as_str())
    }

    /// Human readable reason assembled from the provider's error payload.
    pub fn error_reason(&self) -> String {
        self.errors
            .as_ref()
            .map(flatten_error_messages)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "provider reported the asset as errored".to_string())
    }
}

fn flatten_error_messages(value: &JsonValue) -> String {
    let mut parts = Vec::new();
    collect_messages(value, &mut parts);
    parts.join("; ")
}

fn collect_messages(value: &JsonValue, out: &mut Vec<String>) {
    match value {
        JsonValue::String(s) => out.push(s.clone()),
        JsonValue::Array(items) => items.iter().for_each(|v| collect_messages(v, out)),
        JsonValue::Object(map) => {
            if let Some(messages) = map.get("messages") {
                collect_messages(messages, out);
            } else if let Some(message) = map.get("message") {
                collect_messages(message, out);
            } else if let Some(kind) = map.get("type") {
                collect_messages(kind, out);
            }
        }
        _ => {}
    }
}

/// Snapshot of a remote direct-upload slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProviderUpload {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
}

/// Caller-tunable asset settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AssetOptions {
    #[serde(default)]
    pub playback_policy: PlaybackPolicy,
    /// e.g. "1080p"; provider default when absent
    #[serde(default)]
    pub max_resolution_tier: Option<String>,
    /// Language code for generated captions; none requested when absent
    #[serde(default)]
    pub caption_language: Option<String>,
    #[serde(default)]
    pub normalize_audio: bool,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            playback_policy: PlaybackPolicy::Public,
            max_resolution_tier: Some("1080p".to_string()),
            caption_language: None,
            normalize_audio: false,
        }
    }
}
