//! Mapping from `AppError` to HTTP responses.
//!
//! Handlers return `Result<_, HttpAppError>` and use `?` on service results;
//! status, code and log level all come from [`ErrorMetadata`].

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::OnceLock;
use utoipa::ToSchema;
use validator::Validate;
use vidflow_core::{AppError, ErrorMetadata, LogLevel};

/// Body of every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable code such as `PROVIDER_UNAVAILABLE`
    pub code: String,
    /// Retrying the same request may succeed
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// Internal detail, omitted in production and for sensitive errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    fn describe(error: &AppError, expose_details: bool) -> Self {
        Self {
            error: error.client_message(),
            code: error.error_code().to_string(),
            recoverable: error.is_recoverable(),
            suggested_action: error.suggested_action().map(String::from),
            details: (expose_details && !error.is_sensitive())
                .then(|| format!("{}: {}", error.error_type(), error.detailed_message())),
        }
    }
}

#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(rejection.body_text()))
    }
}

/// `Json<T>` followed by `validator` rules; both failures answer 400.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state).await?;
        body.validate().map_err(AppError::from)?;
        Ok(ValidatedJson(body))
    }
}

/// Details are shown outside production only. Read once per process.
fn expose_details() -> bool {
    static EXPOSE: OnceLock<bool> = OnceLock::new();
    *EXPOSE.get_or_init(|| {
        !matches!(
            std::env::var("ENVIRONMENT")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "production" | "prod"
        )
    })
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let error = &self.0;
        let code = error.error_code();

        match error.log_level() {
            LogLevel::Debug => tracing::debug!(code, error = %error, "Request failed"),
            LogLevel::Warn => tracing::warn!(code, error = %error, "Request failed"),
            LogLevel::Error => tracing::error!(code, error = %error, "Request failed"),
        }

        let status = StatusCode::from_u16(error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::describe(error, expose_details()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_error_metadata() {
        let cases = [
            (AppError::InvalidSignature("bad".to_string()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("gone".to_string()), StatusCode::NOT_FOUND),
            (AppError::ProviderTransient("503".to_string()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::ProviderValidation("bad url".to_string()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::Configuration("no token".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpAppError(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_sensitive_details_never_exposed() {
        let err = AppError::Configuration("PROVIDER_TOKEN_SECRET missing".to_string());
        let body = ErrorResponse::describe(&err, true);
        assert_eq!(body.code, "CONFIGURATION_ERROR");
        assert!(body.details.is_none());
        assert!(!body.error.contains("PROVIDER_TOKEN_SECRET"));
    }
}
