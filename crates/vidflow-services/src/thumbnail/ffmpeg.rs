use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use vidflow_core::models::ThumbnailSource;
use vidflow_core::AppError;
use vidflow_storage::{poster_key, Storage};

use super::{ThumbnailStrategy, ThumbnailTarget};

const FRAME_WIDTH: u32 = 640;
/// Seek offsets tried in order; clips shorter than the first have no frame there.
const SEEK_OFFSETS: [&str; 2] = ["1.000", "0.000"];

/// Single frame pulled from the source object with a local ffmpeg binary.
pub struct FfmpegFrameStrategy {
    storage: Arc<dyn Storage>,
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegFrameStrategy {
    pub fn new(storage: Arc<dyn Storage>, ffmpeg_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            storage,
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    async fn download_source(&self, key: &str, dest: &Path) -> Result<(), AppError> {
        let mut stream = self.storage.read(key).await?;
        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            AppError::Internal(format!("Failed to create temp file: {}", e))
        })?;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to write temp file: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to flush temp file: {}", e)))?;
        Ok(())
    }

    async fn extract_frame(&self, input: &Path, output: &Path, seek: &str) -> Result<(), AppError> {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(frame_args(input, output, seek))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                AppError::Internal(format!(
                    "ffmpeg timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AppError::Internal(format!("Failed to run ffmpeg: {}", e)))?;

        if !run.status.success() {
            let stderr = String::from_utf8_lossy(&run.stderr);
            return Err(AppError::Internal(format!(
                "ffmpeg exited with {}: {}",
                run.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn frame_args(input: &Path, output: &Path, seek: &str) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        seek.to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        format!("scale={}:-2", FRAME_WIDTH),
        "-q:v".to_string(),
        "5".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

#[async_trait]
impl ThumbnailStrategy for FfmpegFrameStrategy {
    fn source(&self) -> ThumbnailSource {
        ThumbnailSource::LocalExtraction
    }

    async fn attempt(&self, target: &ThumbnailTarget) -> Result<String, AppError> {
        let temp_dir = TempDir::new()
            .map_err(|e| AppError::Internal(format!("Failed to create temp dir: {}", e)))?;
        let input = temp_dir.path().join("source");
        let output = temp_dir.path().join("frame.jpg");

        self.download_source(&target.source_object_key, &input).await?;

        let mut frame = None;
        let mut last_error = None;
        for seek in SEEK_OFFSETS {
            if let Err(e) = self.extract_frame(&input, &output, seek).await {
                tracing::debug!(local_id = %target.local_id, seek, error = %e, "ffmpeg failed at offset");
                last_error = Some(e);
                continue;
            }
            match tokio::fs::read(&output).await {
                Ok(bytes) if !bytes.is_empty() => {
                    frame = Some(bytes);
                    break;
                }
                _ => {
                    tracing::debug!(local_id = %target.local_id, seek, "No frame at offset");
                }
            }
        }

        let frame = frame.ok_or_else(|| {
            last_error.unwrap_or_else(|| AppError::Internal("ffmpeg produced no frame".to_string()))
        })?;

        let key = poster_key(target.local_id, ThumbnailSource::LocalExtraction, "jpg");
        let url = self
            .storage
            .write(&key, Bytes::from(frame), "image/jpeg")
            .await?;
        Ok(url)
    }
}
