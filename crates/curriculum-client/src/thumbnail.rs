use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::debug;

use crate::{ClientError, Result};

/// A secondary file computed from the primary before any upload starts.
#[derive(Debug, Clone)]
pub struct DerivedAsset {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Produces the derived thumbnail and duration metadata for video content.
#[async_trait]
pub trait ThumbnailDeriver: Send + Sync {
    /// Grab one frame at `offset` into `source`.
    async fn derive(&self, source: &Path, offset: Duration) -> Result<DerivedAsset>;

    /// Length of `source` in seconds, if it can be determined.
    async fn probe_duration(&self, source: &Path) -> Result<Option<f64>>;
}

/// Thumbnail name for a primary file: `lecture.mp4` → `lecture-thumbnail.jpg`.
pub fn thumbnail_name(primary: &str) -> String {
    let stem = Path::new(primary)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("asset");
    format!("{stem}-thumbnail.jpg")
}

// ─── ffmpeg ───────────────────────────────────────────────────────────────

/// Shells out to `ffmpeg` / `ffprobe`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegDeriver {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
}

impl FfmpegDeriver {
    /// `None` means look the binary up on `PATH` at call time.
    pub fn new(ffmpeg: Option<PathBuf>, ffprobe: Option<PathBuf>) -> Self {
        Self { ffmpeg, ffprobe }
    }

    fn resolve(configured: &Option<PathBuf>, name: &str) -> Result<PathBuf> {
        match configured {
            Some(path) => Ok(path.clone()),
            None => which::which(name)
                .map_err(|e| ClientError::Thumbnail(format!("{name} not found on PATH: {e}"))),
        }
    }
}

#[async_trait]
impl ThumbnailDeriver for FfmpegDeriver {
    async fn derive(&self, source: &Path, offset: Duration) -> Result<DerivedAsset> {
        let ffmpeg = Self::resolve(&self.ffmpeg, "ffmpeg")?;
        let out = tempfile::Builder::new()
            .prefix("curriculum-thumb-")
            .suffix(".jpg")
            .tempfile()?;

        debug!(source = %source.display(), offset_secs = offset.as_secs_f64(), "extracting frame");
        let output = Command::new(&ffmpeg)
            .arg("-ss")
            .arg(format!("{:.3}", offset.as_secs_f64()))
            .arg("-i")
            .arg(source)
            .args(["-frames:v", "1", "-q:v", "2", "-y"])
            .arg(out.path())
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClientError::Thumbnail(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.lines().last().unwrap_or("").trim()
            )));
        }

        let bytes = tokio::fs::read(out.path()).await?;
        if bytes.is_empty() {
            // Offset past the end of a short clip yields no frame.
            return Err(ClientError::Thumbnail(format!(
                "no frame at {:.3}s in {}",
                offset.as_secs_f64(),
                source.display()
            )));
        }

        Ok(DerivedAsset {
            bytes: Bytes::from(bytes),
            content_type: "image/jpeg".to_string(),
        })
    }

    async fn probe_duration(&self, source: &Path) -> Result<Option<f64>> {
        let ffprobe = Self::resolve(&self.ffprobe, "ffprobe")?;
        let output = Command::new(&ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(source)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Ok(None);
        }
        Ok(parse_duration(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_name_from_primary() {
        assert_eq!(thumbnail_name("intro.mp4"), "intro-thumbnail.jpg");
        assert_eq!(thumbnail_name("week 1.final.mov"), "week 1.final-thumbnail.jpg");
        assert_eq!(thumbnail_name(""), "asset-thumbnail.jpg");
    }

    #[test]
    fn ffprobe_output_parsing() {
        assert_eq!(parse_duration("12.480000\n"), Some(12.48));
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[tokio::test]
    async fn missing_configured_binary_is_an_error() {
        let deriver = FfmpegDeriver::new(Some("/nonexistent/ffmpeg".into()), None);
        let err = deriver
            .derive(Path::new("/tmp/x.mp4"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
