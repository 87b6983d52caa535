//! Client for the external encoding/streaming provider.
//!
//! Services depend on the [`ProviderClient`] trait; the binary builds a single
//! [`HttpProviderClient`] and shares it as `Arc<dyn ProviderClient>`.

pub mod client;
pub mod error;
pub mod http_client;
pub mod types;

pub use client::ProviderClient;
pub use error::ProviderError;
pub use http_client::HttpProviderClient;
pub use types::{CreateAssetRequest, CreateUploadRequest, GeneratedSubtitles, InputSettings};
