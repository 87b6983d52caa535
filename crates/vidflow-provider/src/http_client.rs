use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;
use vidflow_core::models::{ProviderAsset, ProviderUpload};
use vidflow_core::Config;

use crate::client::ProviderClient;
use crate::error::ProviderError;
use crate::types::{CreateAssetRequest, CreateUploadRequest};

/// Every provider response wraps its payload in `{"data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// REST client for the provider's video API.
///
/// Constructed even without credentials so the service can start; each call
/// then fails with [`ProviderError::Configuration`].
pub struct HttpProviderClient {
    http_client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl Debug for HttpProviderClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HttpProviderClient")
            .field("base_url", &self.base_url)
            .field("has_credentials", &self.credentials.is_some())
            .finish()
    }
}

impl HttpProviderClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let client = Self::new(
            config.provider_base_url(),
            config.provider_credentials(),
            config.provider_timeout(),
        )?;
        if client.credentials.is_none() {
            tracing::warn!("Provider credentials are not configured; provider calls will fail");
        }
        Ok(client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/video/v1/{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        let (token_id, token_secret) = self.credentials.as_ref().ok_or_else(|| {
            ProviderError::Configuration(
                "PROVIDER_TOKEN_ID and PROVIDER_TOKEN_SECRET are not set".to_string(),
            )
        })?;
        Ok(builder.basic_auth(token_id, Some(token_secret)))
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> Result<Response, ProviderError> {
        let start = std::time::Instant::now();
        let response = self.authorized(builder)?.send().await.map_err(|e| {
            tracing::warn!(
                error = %e,
                operation = %operation,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Provider request failed"
            );
            ProviderError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let err = ProviderError::from_status(status.as_u16(), &error_text);
            tracing::warn!(
                status = status.as_u16(),
                operation = %operation,
                error = %err,
                "Provider returned an error status"
            );
            return Err(err);
        }

        tracing::debug!(
            operation = %operation,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Provider request completed"
        );
        Ok(response)
    }

    async fn data<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        operation: &str,
    ) -> Result<T, ProviderError> {
        let builder = self.http_client.post(self.url(path)).json(body);
        let response = self.send(builder, operation).await?;
        Self::data(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        operation: &str,
    ) -> Result<T, ProviderError> {
        let builder = self.http_client.get(self.url(path));
        let response = self.send(builder, operation).await?;
        Self::data(response).await
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    #[tracing::instrument(skip(self, request), fields(passthrough = %request.passthrough))]
    async fn create_asset(
        &self,
        request: &CreateAssetRequest,
    ) -> Result<ProviderAsset, ProviderError> {
        let asset: ProviderAsset = self.post_json("assets", request, "create_asset").await?;
        tracing::info!(external_asset_id = %asset.id, "Provider asset created");
        Ok(asset)
    }

    #[tracing::instrument(skip(self))]
    async fn get_asset(&self, asset_id: &str) -> Result<ProviderAsset, ProviderError> {
        self.get_json(&format!("assets/{}", asset_id), "get_asset")
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_asset(&self, asset_id: &str) -> Result<(), ProviderError> {
        let builder = self
            .http_client
            .delete(self.url(&format!("assets/{}", asset_id)));
        self.send(builder, "delete_asset").await?;
        tracing::info!(external_asset_id = %asset_id, "Provider asset deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self, request))]
    async fn create_upload(
        &self,
        request: &CreateUploadRequest,
    ) -> Result<ProviderUpload, ProviderError> {
        self.post_json("uploads", request, "create_upload").await
    }

    #[tracing::instrument(skip(self))]
    async fn get_upload(&self, upload_id: &str) -> Result<ProviderUpload, ProviderError> {
        self.get_json(&format!("uploads/{}", upload_id), "get_upload")
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn request_generated_captions(
        &self,
        asset_id: &str,
        track_id: &str,
        language: &str,
    ) -> Result<(), ProviderError> {
        let body = json!({
            "generated_subtitles": [{
                "language_code": language,
                "name": format!("{} (generated)", language),
            }]
        });
        let builder = self
            .http_client
            .post(self.url(&format!(
                "assets/{}/tracks/{}/generate-subtitles",
                asset_id, track_id
            )))
            .json(&body);
        self.send(builder, "generate_subtitles").await?;
        Ok(())
    }
}
