//! Request bodies sent to the provider.

use serde::Serialize;
use vidflow_core::models::{AssetOptions, PlaybackPolicy};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedSubtitles {
    pub language_code: String,
    pub name: String,
}

impl GeneratedSubtitles {
    pub fn for_language(language_code: &str) -> Self {
        Self {
            language_code: language_code.to_string(),
            name: format!("{} (generated)", language_code),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InputSettings {
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generated_subtitles: Vec<GeneratedSubtitles>,
}

/// `POST /video/v1/assets`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateAssetRequest {
    pub input: Vec<InputSettings>,
    pub playback_policy: Vec<PlaybackPolicy>,
    /// Local record id, echoed back on every webhook for this asset.
    pub passthrough: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_resolution_tier: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub normalize_audio: bool,
}

impl CreateAssetRequest {
    pub fn new(source_url: String, passthrough: String, options: &AssetOptions) -> Self {
        let generated_subtitles = options
            .caption_language
            .as_deref()
            .map(|lang| vec![GeneratedSubtitles::for_language(lang)])
            .unwrap_or_default();

        Self {
            input: vec![InputSettings {
                url: source_url,
                generated_subtitles,
            }],
            playback_policy: vec![options.playback_policy.clone()],
            passthrough,
            max_resolution_tier: options.max_resolution_tier.clone(),
            normalize_audio: options.normalize_audio,
        }
    }
}

/// Asset settings applied once a direct upload completes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewAssetSettings {
    pub playback_policy: Vec<PlaybackPolicy>,
    pub passthrough: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_resolution_tier: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub normalize_audio: bool,
}

/// `POST /video/v1/uploads`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateUploadRequest {
    pub cors_origin: String,
    pub new_asset_settings: NewAssetSettings,
}

impl CreateUploadRequest {
    pub fn new(passthrough: String, cors_origin: String, options: &AssetOptions) -> Self {
        Self {
            cors_origin,
            new_asset_settings: NewAssetSettings {
                playback_policy: vec![options.playback_policy.clone()],
                passthrough,
                max_resolution_tier: options.max_resolution_tier.clone(),
                normalize_audio: options.normalize_audio,
            },
        }
    }
}
