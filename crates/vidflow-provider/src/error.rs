use thiserror::Error;
use vidflow_core::AppError;

/// Failure of a provider call, classified by what the caller can do about it.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Credentials missing or rejected. Retrying will not help.
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    /// The provider rejected the request itself (400/422).
    #[error("Provider rejected request: {0}")]
    Validation(String),

    /// Timeouts, connection failures, 429 and 5xx.
    #[error("Provider temporarily unavailable: {0}")]
    Transient(String),

    #[error("Provider resource not found: {0}")]
    NotFound(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ProviderError::Configuration(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body.trim())
        };
        match status {
            400 | 422 => ProviderError::Validation(detail),
            401 | 403 => ProviderError::Configuration(detail),
            404 => ProviderError::NotFound(detail),
            _ => ProviderError::Transient(detail),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ProviderError::Validation(format!("Unexpected provider response: {}", err));
        }
        if let Some(status) = err.status() {
            return ProviderError::from_status(status.as_u16(), &err.to_string());
        }
        ProviderError::Transient(err.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Configuration(msg) => AppError::Configuration(msg),
            ProviderError::Validation(msg) => AppError::ProviderValidation(msg),
            ProviderError::Transient(msg) => AppError::ProviderTransient(msg),
            ProviderError::NotFound(msg) => AppError::NotFound(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(400, "bad input"),
            ProviderError::Validation(_)
        ));
        assert!(matches!(
            ProviderError::from_status(422, ""),
            ProviderError::Validation(_)
        ));
        assert!(ProviderError::from_status(401, "").is_configuration());
        assert!(ProviderError::from_status(403, "").is_configuration());
        assert!(matches!(
            ProviderError::from_status(404, ""),
            ProviderError::NotFound(_)
        ));
        assert!(ProviderError::from_status(429, "").is_retryable());
        assert!(ProviderError::from_status(503, "").is_retryable());
    }

    #[test]
    fn test_conversion_keeps_category() {
        let app: AppError = ProviderError::Configuration("no token".to_string()).into();
        assert!(app.is_configuration());

        let app: AppError = ProviderError::Transient("timeout".to_string()).into();
        assert!(matches!(app, AppError::ProviderTransient(_)));

        let app: AppError = ProviderError::Validation("bad".to_string()).into();
        assert!(matches!(app, AppError::ProviderValidation(_)));
    }
}
