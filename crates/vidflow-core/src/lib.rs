//! Vidflow Core Library
//!
//! Domain models, error types, configuration and derived playback URLs shared
//! by every vidflow crate.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_backend;
pub mod urls;

pub use config::{BaseConfig, Config, IngestConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_backend::StorageBackend;
pub use urls::PlaybackUrlBuilder;
