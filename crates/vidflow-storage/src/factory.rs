#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::{S3Settings, S3Storage};
use crate::{Storage, StorageError, StorageResult};
use std::sync::Arc;
use vidflow_core::{Config, StorageBackend};

/// Build the backend named by `STORAGE_BACKEND` (local when unset).
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend().unwrap_or(StorageBackend::Local) {
        StorageBackend::Local => local(config).await,
        StorageBackend::S3 => s3(config),
    }
}

fn required(value: Option<&str>, name: &str) -> StorageResult<String> {
    value
        .map(String::from)
        .ok_or_else(|| StorageError::Config(format!("{} is not set", name)))
}

#[cfg(feature = "storage-local")]
async fn local(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let root = required(config.local_storage_path(), "LOCAL_STORAGE_PATH")?;
    let public_base = config
        .local_storage_base_url()
        .map(String::from)
        .unwrap_or_else(|| format!("http://localhost:{}/media", config.server_port()));

    Ok(Arc::new(LocalStorage::new(root, public_base).await?))
}

#[cfg(not(feature = "storage-local"))]
async fn local(_config: &Config) -> StorageResult<Arc<dyn Storage>> {
    Err(StorageError::Config(
        "built without the storage-local feature".to_string(),
    ))
}

#[cfg(feature = "storage-s3")]
fn s3(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let settings = S3Settings {
        bucket: required(config.s3_bucket(), "S3_BUCKET")?,
        region: required(config.s3_region(), "S3_REGION")?,
        endpoint: config.s3_endpoint().map(String::from),
    };
    Ok(Arc::new(S3Storage::connect(&settings)?))
}

#[cfg(not(feature = "storage-s3"))]
fn s3(_config: &Config) -> StorageResult<Arc<dyn Storage>> {
    Err(StorageError::Config(
        "built without the storage-s3 feature".to_string(),
    ))
}
