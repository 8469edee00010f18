//! On-device thumbnail extraction for local video files.
//!
//! Frames are decoded by an `ffmpeg` subprocess and read back as PNG.

use crate::{Error, Result};
use image::{DynamicImage, ImageFormat};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Timestamp of the extracted frame (one frame at 60 fps).
pub const FRAME_TIMESTAMP_SECS: f64 = 1.0 / 60.0;

pub struct FrameExtractor {
    ffmpeg_path: String,
}

impl FrameExtractor {
    pub fn new(ffmpeg_path: String) -> Self {
        Self { ffmpeg_path }
    }

    /// Decode one frame near the start of `video`.
    ///
    /// Failures are logged and yield `None`.
    pub async fn extract_first_frame(&self, video: &Path) -> Option<DynamicImage> {
        match self.try_extract(video).await {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Failed to extract frame from {}: {}", video.display(), e);
                None
            }
        }
    }

    async fn try_extract(&self, video: &Path) -> Result<DynamicImage> {
        tokio::fs::metadata(video).await?;

        let args = [
            "-ss".to_string(),
            format!("{:.4}", FRAME_TIMESTAMP_SECS),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "png".to_string(),
            "-".to_string(),
        ];

        debug!("Running {} {}", self.ffmpeg_path, args.join(" "));
        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Decode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        decode_png(output.stdout).await
    }

    /// Write a frame to `path` as PNG.
    pub async fn save_png(frame: DynamicImage, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            frame.save_with_format(path, ImageFormat::Png)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Invariant(format!("Frame save task join error: {}", e)))?
    }
}

async fn decode_png(bytes: Vec<u8>) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::Decode("ffmpeg produced no frame".to_string()));
    }

    tokio::task::spawn_blocking(move || {
        image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .map_err(|e| Error::Decode(format!("Invalid frame data: {}", e)))
    })
    .await
    .map_err(|e| Error::Invariant(format!("Frame decode task join error: {}", e)))?
}
