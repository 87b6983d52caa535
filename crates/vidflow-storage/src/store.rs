//! The `Storage` trait and its error type.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use vidflow_core::{AppError, StorageBackend};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object {0} not found")]
    NotFound(String),

    #[error("invalid storage key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("{operation} {key} failed: {message}")]
    Operation {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("storage misconfigured: {0}")]
    Config(String),
}

impl StorageError {
    pub(crate) fn op(operation: &'static str, key: &str, err: impl std::fmt::Display) -> Self {
        StorageError::Operation {
            operation,
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Chunks of an object, in order.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object {} not found", key)),
            StorageError::InvalidKey { .. } => AppError::InvalidInput(err.to_string()),
            StorageError::Config(msg) => AppError::Configuration(msg),
            StorageError::Operation { .. } => AppError::Storage(err.to_string()),
        }
    }
}

/// Object storage holding uploaded source videos and generated posters.
#[async_trait]
pub trait Storage: Send + Sync {
    /// URL the provider can fetch `key` from, valid for at least `ttl`.
    async fn source_url(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    async fn read(&self, key: &str) -> StorageResult<ByteStream>;

    /// Store `data` under `key` and return its public URL.
    async fn write(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<String>;

    fn backend(&self) -> StorageBackend;
}
