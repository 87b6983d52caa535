//! [`AppError`] is the single failure type of the ingest pipeline.
//!
//! How each variant reaches a client (status, code, retry hint, log level)
//! is described by [`ErrorMetadata`], so the HTTP layer never matches on
//! variants. `Database` wraps `sqlx::Error` only with the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Caller mistakes
    Debug,
    /// Retryable or expected-but-notable (stale, duplicate, provider hiccups)
    Warn,
    Error,
}

/// How an error is presented to API clients and operators.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Stable, machine-readable code, e.g. `PROVIDER_UNAVAILABLE`.
    fn error_code(&self) -> &'static str;

    /// The same request may succeed if retried unchanged.
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    /// Message safe to show a client.
    fn client_message(&self) -> String;

    /// Internal detail must never reach a client.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    /// Missing credentials or settings. Never retried, never hidden behind a fallback.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider rejected the request itself; the input must change before a retry.
    #[error("Provider rejected request: {0}")]
    ProviderValidation(String),

    /// Timeout, rate limit or 5xx from the provider.
    #[error("Provider unavailable: {0}")]
    ProviderTransient(String),

    /// Uniqueness violation on `external_asset_id`.
    #[error("Duplicate asset for external id {external_asset_id}")]
    DuplicateAsset { external_asset_id: String },

    /// An event tried to downgrade a terminal lifecycle state.
    #[error("Stale event: {0}")]
    StaleEvent(String),

    #[error("All thumbnail strategies failed: {0}")]
    AllStrategiesFailed(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Presentation of one variant.
struct Profile {
    status: u16,
    code: &'static str,
    recoverable: bool,
    action: Option<&'static str>,
    sensitive: bool,
    level: LogLevel,
}

impl Profile {
    const fn new(status: u16, code: &'static str, level: LogLevel) -> Self {
        Self {
            status,
            code,
            recoverable: false,
            action: None,
            sensitive: false,
            level,
        }
    }

    const fn retryable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    const fn hidden(mut self) -> Self {
        self.sensitive = true;
        self
    }

    const fn hint(mut self, action: &'static str) -> Self {
        self.action = Some(action);
        self
    }
}

const RETRY_SHORTLY: &str = "Retry after a short delay";

impl AppError {
    fn profile(&self) -> Profile {
        use LogLevel::{Debug, Error, Warn};

        match self {
            AppError::Database(_) => Profile::new(500, "DATABASE_ERROR", Error)
                .retryable()
                .hidden()
                .hint(RETRY_SHORTLY),
            AppError::Configuration(_) => Profile::new(500, "CONFIGURATION_ERROR", Error)
                .hidden()
                .hint("Contact the operator; the service is missing required settings"),
            AppError::ProviderValidation(_) => {
                Profile::new(422, "PROVIDER_VALIDATION_ERROR", Warn)
                    .hint("Fix the request input before retrying")
            }
            AppError::ProviderTransient(_) => Profile::new(503, "PROVIDER_UNAVAILABLE", Warn)
                .retryable()
                .hint("Retry with exponential backoff"),
            AppError::DuplicateAsset { .. } => Profile::new(409, "DUPLICATE_ASSET", Warn)
                .retryable()
                .hint("Retry; the asset is already being tracked"),
            // Acknowledged: the provider must not redeliver.
            AppError::StaleEvent(_) => Profile::new(200, "STALE_EVENT", Warn),
            AppError::AllStrategiesFailed(_) => {
                Profile::new(500, "THUMBNAIL_FAILED", Error).hidden()
            }
            AppError::InvalidSignature(_) => Profile::new(401, "INVALID_SIGNATURE", Warn)
                .hint("Check the webhook signing secret"),
            AppError::InvalidInput(_) => Profile::new(400, "INVALID_INPUT", Debug),
            AppError::NotFound(_) => Profile::new(404, "NOT_FOUND", Debug),
            AppError::Storage(_) => Profile::new(500, "STORAGE_ERROR", Error)
                .retryable()
                .hidden()
                .hint(RETRY_SHORTLY),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                Profile::new(500, "INTERNAL_ERROR", Error)
                    .retryable()
                    .hidden()
                    .hint(RETRY_SHORTLY)
            }
        }
    }
}

impl AppError {
    /// Variant name, used in error details and logs.
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Configuration(_) => "Configuration",
            AppError::ProviderValidation(_) => "ProviderValidation",
            AppError::ProviderTransient(_) => "ProviderTransient",
            AppError::DuplicateAsset { .. } => "DuplicateAsset",
            AppError::StaleEvent(_) => "StaleEvent",
            AppError::AllStrategiesFailed(_) => "AllStrategiesFailed",
            AppError::InvalidSignature(_) => "InvalidSignature",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Storage(_) => "Storage",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// True for errors that must stop any fallback path immediately.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AppError::Configuration(_))
    }

    /// Display text followed by up to five `Caused by:` lines.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        self.profile().status
    }

    fn error_code(&self) -> &'static str {
        self.profile().code
    }

    fn is_recoverable(&self) -> bool {
        self.profile().recoverable
    }

    fn suggested_action(&self) -> Option<&'static str> {
        self.profile().action
    }

    fn is_sensitive(&self) -> bool {
        self.profile().sensitive
    }

    fn log_level(&self) -> LogLevel {
        self.profile().level
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Configuration(_) => "Service is not configured".to_string(),
            AppError::ProviderValidation(ref msg) => msg.clone(),
            AppError::ProviderTransient(_) => {
                "Video provider is temporarily unavailable".to_string()
            }
            AppError::DuplicateAsset { external_asset_id } => {
                format!("Asset {} is already tracked", external_asset_id)
            }
            AppError::StaleEvent(ref msg) => msg.clone(),
            AppError::AllStrategiesFailed(_) => "Failed to produce a thumbnail".to_string(),
            AppError::InvalidSignature(_) => "Invalid webhook signature".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_configuration_is_fatal() {
        let err = AppError::Configuration("PROVIDER_TOKEN_ID is not set".to_string());
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(!err.is_recoverable());
        assert!(err.is_configuration());
        // Internal detail must not leak to clients
        assert!(!err.client_message().contains("PROVIDER_TOKEN_ID"));
    }

    #[test]
    fn test_provider_errors_have_distinct_retry_policy() {
        let validation = AppError::ProviderValidation("input url unreachable".to_string());
        let transient = AppError::ProviderTransient("503 Service Unavailable".to_string());
        assert!(!validation.is_recoverable());
        assert!(transient.is_recoverable());
        assert_ne!(validation.http_status_code(), transient.http_status_code());
    }

    #[test]
    fn test_duplicate_asset_message() {
        let err = AppError::DuplicateAsset {
            external_asset_id: "EA2".to_string(),
        };
        assert_eq!(err.http_status_code(), 409);
        assert!(err.client_message().contains("EA2"));
        assert_eq!(err.error_type(), "DuplicateAsset");
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("root cause").context("while polling"));
        let details = err.detailed_message();
        assert!(details.starts_with("Internal error with source"));
        assert!(details.contains("Caused by: while polling"));
    }
}
