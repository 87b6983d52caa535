use crate::keys::validate_key;
use crate::store::{ByteStream, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
};
use std::time::Duration;
use vidflow_core::StorageBackend;

/// Connection settings for an S3 bucket or an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint such as MinIO (`http://localhost:9000`); objects are
    /// then addressed path-style.
    pub endpoint: Option<String>,
}

impl S3Settings {
    fn public_base(&self) -> String {
        match self.endpoint {
            Some(ref endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

/// S3 storage through `object_store`. Credentials come from the usual AWS
/// environment variables.
#[derive(Debug, Clone)]
pub struct S3Storage {
    store: AmazonS3,
    public_base: String,
}

impl S3Storage {
    pub fn connect(settings: &S3Settings) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region);

        if let Some(ref endpoint) = settings.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(format!("S3 bucket {}: {}", settings.bucket, e)))?;

        Ok(Self {
            store,
            public_base: settings.public_base(),
        })
    }

    fn location(key: &str) -> StorageResult<Path> {
        validate_key(key)?;
        Ok(Path::from(key))
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn source_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        let location = Self::location(key)?;
        let url = self
            .store
            .signed_url(Method::GET, &location, ttl)
            .await
            .map_err(|e| StorageError::op("sign", key, e))?;
        Ok(url.to_string())
    }

    async fn read(&self, key: &str) -> StorageResult<ByteStream> {
        let location = Self::location(key)?;
        let object = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::op("read", key, other),
        })?;

        let key = key.to_string();
        let stream = object
            .into_stream()
            .map_err(move |e| StorageError::op("read", &key, e));
        Ok(Box::pin(stream))
    }

    #[tracing::instrument(skip(self, data), fields(backend = "s3", size_bytes = data.len()))]
    async fn write(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<String> {
        let location = Self::location(key)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "S3 write failed");
                StorageError::op("write", key, e)
            })?;

        Ok(format!("{}/{}", self.public_base, key))
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_base_per_endpoint_style() {
        let aws = S3Settings {
            bucket: "media".to_string(),
            region: "eu-west-1".to_string(),
            endpoint: None,
        };
        assert_eq!(aws.public_base(), "https://media.s3.eu-west-1.amazonaws.com");

        let minio = S3Settings {
            endpoint: Some("http://localhost:9000/".to_string()),
            ..aws
        };
        assert_eq!(minio.public_base(), "http://localhost:9000/media");
    }
}
