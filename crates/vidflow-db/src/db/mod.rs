//! Database repositories
//
// Store traits and the PostgreSQL implementations
pub mod orphaned_event;
pub mod video_asset;
//
// In-memory implementations
pub mod memory;
//
// Startup schema check
pub mod schema;
