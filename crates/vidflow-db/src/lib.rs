//! Persistence for video asset records.
//!
//! Services depend on the [`VideoAssetStore`] and [`OrphanedEventLog`] traits;
//! PostgreSQL repositories implement them for production and in-memory
//! stores implement them for tests and local runs.

pub mod db;

pub use db::memory::{InMemoryOrphanedEventLog, InMemoryVideoAssetStore};
pub use db::orphaned_event::{OrphanedEventLog, OrphanedEventRepository};
pub use db::schema::{verify_schema, REQUIRED_SCHEMA};
pub use db::video_asset::{VideoAssetRepository, VideoAssetStore};
