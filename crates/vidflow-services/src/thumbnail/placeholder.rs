use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::sync::Arc;
use vidflow_core::models::ThumbnailSource;
use vidflow_core::AppError;
use vidflow_storage::{poster_key, Storage};

use super::{ThumbnailStrategy, ThumbnailTarget};

const STRIPES: u32 = 6;

/// Generated poster with colours derived from the record's id and title.
///
/// Falls back to an inline `data:` URL when storage rejects the upload, so
/// this strategy only fails if PNG encoding itself fails.
pub struct PlaceholderStrategy {
    storage: Arc<dyn Storage>,
    width: u32,
    height: u32,
}

impl PlaceholderStrategy {
    pub fn new(storage: Arc<dyn Storage>, width: u32, height: u32) -> Self {
        Self {
            storage,
            width: width.max(1),
            height: height.max(1),
        }
    }

    fn render(&self, target: &ThumbnailTarget) -> Result<Vec<u8>, AppError> {
        let mut hasher = Sha256::new();
        hasher.update(target.local_id.as_bytes());
        if let Some(ref title) = target.title {
            hasher.update(title.as_bytes());
        }
        let digest = hasher.finalize();

        let palette: Vec<Rgb<u8>> = digest
            .chunks_exact(3)
            .take(STRIPES as usize)
            .map(|c| Rgb([c[0], c[1], c[2]]))
            .collect();

        let stripe_width = (self.width / STRIPES).max(1);
        let img = RgbImage::from_fn(self.width, self.height, |x, _| {
            let index = ((x / stripe_width) as usize).min(palette.len() - 1);
            palette[index]
        });

        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| AppError::Internal(format!("Failed to encode placeholder: {}", e)))?;
        Ok(buf.into_inner())
    }
}

#[async_trait]
impl ThumbnailStrategy for PlaceholderStrategy {
    fn source(&self) -> ThumbnailSource {
        ThumbnailSource::Placeholder
    }

    async fn attempt(&self, target: &ThumbnailTarget) -> Result<String, AppError> {
        let png = Bytes::from(self.render(target)?);
        let key = poster_key(target.local_id, ThumbnailSource::Placeholder, "png");

        match self.storage.write(&key, png.clone(), "image/png").await {
            Ok(url) => Ok(url),
            Err(e) => {
                tracing::warn!(
                    local_id = %target.local_id,
                    error = %e,
                    "Placeholder upload failed, inlining image"
                );
                Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
            }
        }
    }
}
