use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;
use vidflow_core::models::{AssetOptions, ThumbnailSource, VideoAsset};
use vidflow_services::ThumbnailOutcome;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateVideoRequest {
    /// Storage key of the already uploaded source file
    #[validate(length(min = 1, max = 1024))]
    pub object_key: String,
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub local_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(max = 512))]
    pub title: Option<String>,
    /// Block until the provider finishes or the wait deadline passes
    #[serde(default)]
    pub wait: bool,
    #[serde(default)]
    pub options: AssetOptions,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateVideoResponse {
    pub video: VideoAsset,
    /// True when `wait` was requested and the deadline passed first
    pub timed_out: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUploadSlotRequest {
    #[serde(default)]
    pub local_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(max = 512))]
    pub title: Option<String>,
    #[serde(default)]
    pub options: AssetOptions,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadSlotResponse {
    pub video: VideoAsset,
    /// Provider URL the client uploads the file to
    pub upload_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StrategyFailureResponse {
    pub strategy: ThumbnailSource,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThumbnailResponse {
    pub url: String,
    pub strategy_used: ThumbnailSource,
    pub failures: Vec<StrategyFailureResponse>,
    pub persisted: bool,
}

impl From<ThumbnailOutcome> for ThumbnailResponse {
    fn from(outcome: ThumbnailOutcome) -> Self {
        Self {
            url: outcome.url,
            strategy_used: outcome.strategy_used,
            failures: outcome
                .failures
                .into_iter()
                .map(|f| StrategyFailureResponse {
                    strategy: f.strategy,
                    error: f.error,
                })
                .collect(),
            persisted: outcome.persisted,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v0/videos",
    tag = "videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Remote asset created", body = CreateVideoResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Concurrent creation for the same remote asset", body = ErrorResponse),
        (status = 422, description = "Provider rejected the request", body = ErrorResponse),
        (status = 503, description = "Provider unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(object_key = %request.object_key, wait = request.wait))]
pub async fn create_video(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateVideoRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let local_id = request.local_id.unwrap_or_else(Uuid::new_v4);

    let video = state
        .lifecycle
        .create_from_object_key(&request.object_key, local_id, request.title, &request.options)
        .await?;

    // A remote asset already owned by another record resolves to that record.
    let local_id = video.local_id;
    state
        .thumbnails
        .spawn_background(local_id, video.source_object_key.clone());

    if !request.wait || video.lifecycle_state.is_terminal() {
        return Ok((
            StatusCode::CREATED,
            Json(CreateVideoResponse {
                video,
                timed_out: false,
            }),
        ));
    }

    let outcome = state
        .waiter
        .wait_until_ready(local_id, &state.wait_policy, &state.shutdown.child_token())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateVideoResponse {
            video: outcome.asset,
            timed_out: outcome.timed_out,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v0/videos/uploads",
    tag = "videos",
    request_body = CreateUploadSlotRequest,
    responses(
        (status = 201, description = "Upload slot created", body = UploadSlotResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 503, description = "Provider unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request))]
pub async fn create_upload_slot(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateUploadSlotRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let local_id = request.local_id.unwrap_or_else(Uuid::new_v4);

    let (video, upload_url) = state
        .lifecycle
        .create_upload_slot(local_id, request.title, &request.options)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadSlotResponse { video, upload_url }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v0/videos/{id}",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Local video id")),
    responses(
        (status = 200, description = "Video found", body = VideoAsset),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(local_id = %id))]
pub async fn get_video(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<VideoAsset>, HttpAppError> {
    Ok(Json(state.lifecycle.get(id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v0/videos/{id}/remote",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Local video id")),
    responses(
        (status = 200, description = "Remote asset deleted; local record kept", body = VideoAsset),
        (status = 400, description = "Video has no remote asset", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(local_id = %id))]
pub async fn delete_remote_asset(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<VideoAsset>, HttpAppError> {
    Ok(Json(state.lifecycle.invalidate_remote(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v0/videos/{id}/thumbnail",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Local video id")),
    responses(
        (status = 200, description = "Poster generated", body = ThumbnailResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 500, description = "Every strategy failed or configuration is missing", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(local_id = %id))]
pub async fn generate_thumbnail(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ThumbnailResponse>, HttpAppError> {
    let video = state.lifecycle.get(id).await?;
    let outcome = state
        .thumbnails
        .generate(id, &video.source_object_key)
        .await?;
    Ok(Json(outcome.into()))
}
