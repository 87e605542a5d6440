//! Frame and clip decoding.
//!
//! Still frames are decoded in-process with the `image` crate. Clips are
//! split into JPEG frames by the FFmpeg CLI inside a temporary directory.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Raw image bytes as uploaded, with the client's optional timestamp.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub timestamp: Option<f64>,
}

impl EncodedFrame {
    pub fn new(bytes: Vec<u8>, timestamp: Option<f64>) -> Self {
        Self { bytes, timestamp }
    }
}

/// A frame that decoded successfully.
///
/// The encoded bytes are kept so remote detectors can forward them without
/// re-encoding.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub image: DynamicImage,
    pub encoded: Vec<u8>,
    pub timestamp: Option<f64>,
}

/// Decode one JPEG/PNG frame.
///
/// CPU bound; call from `spawn_blocking` inside async code.
pub fn decode_frame(frame: EncodedFrame) -> PipelineResult<DecodedFrame> {
    if frame.bytes.is_empty() {
        return Err(PipelineError::decode_failed("empty frame"));
    }

    let image = image::load_from_memory(&frame.bytes)
        .map_err(|e| PipelineError::decode_failed(e.to_string()))?;

    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PipelineError::decode_failed(format!(
            "degenerate frame {}x{}",
            width, height
        )));
    }

    Ok(DecodedFrame {
        width,
        height,
        image,
        encoded: frame.bytes,
        timestamp: frame.timestamp,
    })
}

/// Splits an encoded video clip into ordered still frames.
#[async_trait]
pub trait ClipDecoder: Send + Sync {
    /// Decode `clip` into frames in presentation order. `fps` is the
    /// client's frame-rate hint, used to stamp the frames.
    async fn decode_clip(&self, clip: &[u8], fps: Option<f64>) -> PipelineResult<Vec<EncodedFrame>>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Clip decoder backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegClipDecoder {
    timeout: Duration,
}

impl Default for FfmpegClipDecoder {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl FfmpegClipDecoder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Arguments extracting every frame of `input` as JPEGs into `out_dir`.
    fn build_args(input: &Path, out_dir: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vsync".to_string(),
            "0".to_string(),
            "-q:v".to_string(),
            "3".to_string(),
            out_dir.join("frame_%06d.jpg").to_string_lossy().to_string(),
        ]
    }

    async fn collect_frames(out_dir: &Path, fps: Option<f64>) -> PipelineResult<Vec<EncodedFrame>> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jpg") {
                paths.push(path);
            }
        }
        // frame_%06d names sort in presentation order.
        paths.sort();

        let fps = fps.filter(|f| f.is_finite() && *f > 0.0);
        let mut frames = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            let bytes = tokio::fs::read(path).await?;
            frames.push(EncodedFrame::new(bytes, fps.map(|f| index as f64 / f)));
        }
        Ok(frames)
    }
}

#[async_trait]
impl ClipDecoder for FfmpegClipDecoder {
    async fn decode_clip(&self, clip: &[u8], fps: Option<f64>) -> PipelineResult<Vec<EncodedFrame>> {
        if clip.is_empty() {
            return Err(PipelineError::decode_failed("empty clip"));
        }
        which::which("ffmpeg")
            .map_err(|_| PipelineError::decode_failed("ffmpeg not found in PATH"))?;

        let temp_dir = tempfile::tempdir()?;
        let input = temp_dir.path().join("clip.bin");
        tokio::fs::write(&input, clip).await?;

        let args = Self::build_args(&input, temp_dir.path());
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| PipelineError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::decode_failed(format!(
                "ffmpeg exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let frames = Self::collect_frames(temp_dir.path(), fps).await?;
        if frames.is_empty() {
            return Err(PipelineError::decode_failed("clip contained no frames"));
        }

        debug!(frames = frames.len(), "Clip decoded");
        Ok(frames)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
