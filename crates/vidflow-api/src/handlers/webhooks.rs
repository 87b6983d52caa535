//! Provider webhook receiver.
//!
//! The signature is checked against the raw body before anything is parsed.
//! Processing runs in its own task; the handler waits for it only up to the
//! configured budget and acknowledges past that while the task carries on.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use vidflow_core::models::{LifecycleState, WebhookEvent};
use vidflow_core::AppError;
use vidflow_services::webhook::SIGNATURE_HEADER;
use vidflow_services::ProcessOutcome;

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// `applied`, `stale`, `orphaned`, `ignored` or `accepted` (still processing)
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle_state: Option<LifecycleState>,
}

impl WebhookAck {
    fn status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            local_id: None,
            lifecycle_state: None,
        }
    }
}

impl From<ProcessOutcome> for WebhookAck {
    fn from(outcome: ProcessOutcome) -> Self {
        match outcome {
            ProcessOutcome::Applied { local_id, state } => Self {
                status: "applied".to_string(),
                local_id: Some(local_id),
                lifecycle_state: Some(state),
            },
            ProcessOutcome::Stale { local_id } => Self {
                local_id: Some(local_id),
                ..Self::status("stale")
            },
            ProcessOutcome::Orphaned => Self::status("orphaned"),
            ProcessOutcome::Ignored { .. } => Self::status("ignored"),
        }
    }
}

#[utoipa::path(
    post,
    path = "/webhooks/provider",
    tag = "webhooks",
    request_body(content = String, description = "Raw provider event JSON", content_type = "application/json"),
    params(("provider-signature" = String, Header, description = "t=<unix_ts>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
        (status = 401, description = "Missing or invalid signature", body = ErrorResponse),
        (status = 500, description = "Webhook secret not configured or processing failed", body = ErrorResponse)
    )
)]
pub async fn receive_provider_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, HttpAppError> {
    let webhooks = &state.webhooks;

    let verifier = webhooks.verifier.as_ref().ok_or_else(|| {
        AppError::Configuration("PROVIDER_WEBHOOK_SECRET is not configured".to_string())
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::InvalidSignature(format!("Missing {} header", SIGNATURE_HEADER)))?;
    verifier.verify(signature, &body)?;

    let event = WebhookEvent::from_slice(&body, Utc::now())
        .map_err(|e| AppError::InvalidInput(format!("Malformed webhook payload: {}", e)))?;

    tracing::info!(
        event_type = %event.event_type,
        object_id = %event.object_id,
        "Webhook received"
    );

    let processor = webhooks.processor.clone();
    let task = tokio::spawn(async move { processor.process(&event).await });

    match tokio::time::timeout(webhooks.sync_budget, task).await {
        Ok(Ok(Ok(outcome))) => Ok(Json(outcome.into())),
        Ok(Ok(Err(e))) => Err(e.into()),
        Ok(Err(join_error)) => Err(AppError::Internal(format!(
            "Webhook processing task failed: {}",
            join_error
        ))
        .into()),
        Err(_) => {
            tracing::warn!(
                budget_ms = webhooks.sync_budget.as_millis() as u64,
                "Webhook processing exceeded budget, continuing in background"
            );
            Ok(Json(WebhookAck::status("accepted")))
        }
    }
}
