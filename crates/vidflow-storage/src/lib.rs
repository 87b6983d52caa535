//! Vidflow Storage Library
//!
//! Object storage for uploaded source videos and generated poster images,
//! with S3 (via `object_store`) and local filesystem backends.
//!
//! Source keys are whatever the uploader chose (`videos/abc.mp4`); posters
//! live under [`poster_key`].

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod store;

pub use factory::create_storage;
pub use keys::{poster_key, validate_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Settings, S3Storage};
pub use store::{ByteStream, Storage, StorageError, StorageResult};
