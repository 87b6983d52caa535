//! OpenAPI documentation, served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use vidflow_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vidflow API",
        version = "0.1.0",
        description = "Video ingest API (v0). Hands uploaded files to the streaming provider, tracks each asset until it is ready and serves the resulting playback URLs and posters."
    ),
    paths(
        handlers::videos::create_video,
        handlers::videos::create_upload_slot,
        handlers::videos::get_video,
        handlers::videos::delete_remote_asset,
        handlers::videos::generate_thumbnail,
        handlers::webhooks::receive_provider_webhook,
        handlers::health::health_check,
    ),
    components(schemas(
        error::ErrorResponse,
        models::VideoAsset,
        models::LifecycleState,
        models::DerivedUrls,
        models::ThumbnailSource,
        models::AssetOptions,
        models::PlaybackPolicy,
        handlers::videos::CreateVideoRequest,
        handlers::videos::CreateVideoResponse,
        handlers::videos::CreateUploadSlotRequest,
        handlers::videos::UploadSlotResponse,
        handlers::videos::ThumbnailResponse,
        handlers::videos::StrategyFailureResponse,
        handlers::webhooks::WebhookAck,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "videos", description = "Video asset lifecycle"),
        (name = "webhooks", description = "Provider event delivery"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
