use crate::keys::validate_key;
use crate::store::{ByteStream, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio_util::io::ReaderStream;
use vidflow_core::StorageBackend;

/// Filesystem-backed storage for development.
///
/// Objects are served by the API under `public_base`, and source URLs are
/// those same public URLs, so the provider has to be able to reach this host.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_base: String,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>, public_base: String) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Config(format!("cannot create {}: {}", root.display(), e))
        })?;

        Ok(Self {
            root,
            public_base: public_base.trim_end_matches('/').to_string(),
        })
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn source_url(&self, key: &str, _ttl: Duration) -> StorageResult<String> {
        validate_key(key)?;
        Ok(self.public_url(key))
    }

    async fn read(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.path_for(key)?;
        let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::op("read", key, e),
        })?;

        let key = key.to_string();
        let stream = ReaderStream::new(file).map_err(move |e| StorageError::op("read", &key, e));
        Ok(Box::pin(stream))
    }

    #[tracing::instrument(skip(self, data), fields(backend = "local", size_bytes = data.len()))]
    async fn write(&self, key: &str, data: Bytes, _content_type: &str) -> StorageResult<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::op("write", key, e))?;
        }
        fs::write(&path, &data)
            .await
            .map_err(|e| StorageError::op("write", key, e))?;

        tracing::debug!(path = %path.display(), "Object written");
        Ok(self.public_url(key))
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
