//! Storage key rules and the key layout for generated posters.

use uuid::Uuid;
use vidflow_core::models::ThumbnailSource;

use crate::store::{StorageError, StorageResult};

/// Keys are relative, non-empty and never step upwards.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let reason = if key.trim().is_empty() {
        "empty"
    } else if key.starts_with('/') || key.starts_with('\\') {
        "absolute"
    } else if key.split(['/', '\\']).any(|segment| segment == "..") {
        "parent segment"
    } else {
        return Ok(());
    };

    Err(StorageError::InvalidKey {
        key: key.to_string(),
        reason,
    })
}

/// `thumbnails/{local_id}/{strategy}.{ext}`; one object per strategy so a
/// weaker result never overwrites a stronger one's file.
pub fn poster_key(local_id: Uuid, source: ThumbnailSource, extension: &str) -> String {
    format!("thumbnails/{}/{}.{}", local_id, source, extension)
}
