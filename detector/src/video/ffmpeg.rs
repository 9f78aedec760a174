use anyhow::{Context, Result as AnyResult, anyhow, bail};
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{FrameSource, VideoMetadata};
use crate::error::{DetectorError, Result};

const SHOW_ENTRIES: &str =
    "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,duration:format=duration";

/// Video file read through the `ffprobe` / `ffmpeg` command line tools.
pub struct FfmpegVideo {
    path: PathBuf,
    metadata: VideoMetadata,
}

impl FfmpegVideo {
    /// Read metadata for the first video stream of `path`. Anything ffprobe
    /// cannot read is an `InvalidVideo`.
    pub fn open(path: &Path) -> Result<Self> {
        let output = Command::new("ffprobe")
            .args(["-v", "error"])
            .args(["-select_streams", "v:0"])
            .args(["-show_entries", SHOW_ENTRIES])
            .args(["-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                log::error!("ffprobe not available: {}", e);
                DetectorError::InvalidVideo(format!("could not run ffprobe: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("ffprobe failed on {}: {}", path.display(), stderr.trim());
            return Err(DetectorError::InvalidVideo(
                "could not open video file".to_string(),
            ));
        }

        let metadata = parse_stream_report(&String::from_utf8_lossy(&output.stdout))
            .map_err(DetectorError::InvalidVideo)?;

        log::info!(
            "Opened video {}: {} frames @ {:.2} fps, {}x{}",
            path.display(),
            metadata.total_frames,
            metadata.fps,
            metadata.width,
            metadata.height
        );

        Ok(Self {
            path: path.to_path_buf(),
            metadata,
        })
    }
}

impl FrameSource for FfmpegVideo {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_frame(&mut self, index: u64) -> AnyResult<DynamicImage> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);

        if self.metadata.fps > 0.0 {
            // Input-side seek jumps to the nearest keyframe instead of
            // decoding everything before the target
            let timestamp = index as f64 / self.metadata.fps;
            cmd.args(["-ss", &format!("{:.6}", timestamp)]).arg("-i").arg(&self.path);
        } else {
            cmd.arg("-i")
                .arg(&self.path)
                .args(["-vf", &format!("select=eq(n\\,{})", index)]);
        }

        let output = cmd
            .args(["-an", "-sn"])
            .args(["-frames:v", "1"])
            .args(["-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .context("failed to spawn ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffmpeg failed at frame {}: {}", index, stderr.trim());
        }
        if output.stdout.is_empty() {
            return Err(anyhow!("no frame at index {}", index));
        }

        let img = image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)?;
        Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
    }
}

#[derive(Debug, Deserialize)]
struct StreamReport {
    #[serde(default)]
    streams: Vec<StreamEntry>,
    format: Option<FormatEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FormatEntry {
    duration: Option<String>,
}

/// Turn ffprobe JSON into stream metadata. The frame count comes from the
/// container's `nb_frames` when present, otherwise it is estimated from
/// duration and frame rate. An undeterminable count is reported as zero.
fn parse_stream_report(json: &str) -> std::result::Result<VideoMetadata, String> {
    let report: StreamReport =
        serde_json::from_str(json).map_err(|e| format!("unreadable stream report: {}", e))?;

    let stream = report
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(0.0);

    let counted = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<i64>().ok())
        .filter(|n| *n > 0);

    let duration = stream
        .duration
        .as_deref()
        .or(report.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let total_frames = match (counted, duration) {
        (Some(n), _) => n as u64,
        (None, Some(d)) if fps > 0.0 => (d * fps).round() as u64,
        _ => 0,
    };

    Ok(VideoMetadata {
        total_frames,
        fps,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
    })
}

/// Parse an ffmpeg rational such as `30000/1001`.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}
