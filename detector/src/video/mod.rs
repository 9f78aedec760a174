//! Keyframe sampling
//!
//! Picks a bounded, evenly spaced set of frames out of a video of any length.
//! Each sampled frame is decoded by seeking straight to its index and is
//! re-encoded as JPEG for forensic display.

use anyhow::Result as AnyResult;
use image::{DynamicImage, ImageFormat, ImageResult};
use serde::Serialize;
use std::io::Cursor;

use crate::error::{DetectorError, Result};

mod ffmpeg;

pub use ffmpeg::FfmpegVideo;

/// Number of frames sampled per video unless configured otherwise
pub const DEFAULT_SAMPLE_COUNT: usize = 5;

/// Stream properties read before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub total_frames: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// A decodable video stream.
pub trait FrameSource {
    fn metadata(&self) -> &VideoMetadata;

    /// Seek to `index` and decode exactly that frame.
    fn decode_frame(&mut self, index: u64) -> AnyResult<DynamicImage>;
}

/// A decoded frame plus its JPEG re-encoding.
pub struct SampledFrame {
    pub index: u64,
    pub image: DynamicImage,
    pub reencoded: Vec<u8>,
}

impl SampledFrame {
    pub fn new(index: u64, image: DynamicImage) -> ImageResult<Self> {
        let reencoded = encode_jpeg(&image)?;
        Ok(Self {
            index,
            image,
            reencoded,
        })
    }
}

fn encode_jpeg(image: &DynamicImage) -> ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

/// Frame indices visited for a video of `total_frames`:
/// `0, step, 2*step, ...` below `total_frames` with
/// `step = max(1, total_frames / target_count)`.
pub fn sample_indices(total_frames: u64, target_count: usize) -> impl Iterator<Item = u64> {
    let target = target_count.max(1) as u64;
    let step = (total_frames / target).max(1);
    (0..total_frames).step_by(step as usize)
}

/// Decode up to `target_count` evenly spaced frames in ascending order.
///
/// Stops at the first frame that fails to seek or decode and keeps what was
/// decoded so far. A stream that reports no frames is `InvalidVideo`; one
/// that yields no decodable frame is `NoFramesExtracted`.
pub fn sample<S>(source: &mut S, target_count: usize) -> Result<Vec<SampledFrame>>
where
    S: FrameSource + ?Sized,
{
    let total_frames = source.metadata().total_frames;
    if total_frames == 0 {
        return Err(DetectorError::InvalidVideo(
            "video reports no frames".to_string(),
        ));
    }

    let target = target_count.max(1);
    let mut frames = Vec::with_capacity(target);

    for index in sample_indices(total_frames, target) {
        let image = match source.decode_frame(index) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Stopping sampling at frame {}: {:#}", index, e);
                break;
            }
        };

        match SampledFrame::new(index, image) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                log::warn!("Stopping sampling, frame {} failed to encode: {}", index, e);
                break;
            }
        }

        if frames.len() >= target {
            break;
        }
    }

    if frames.is_empty() {
        return Err(DetectorError::NoFramesExtracted);
    }

    log::info!(
        "Sampled {} of {} frames (target {})",
        frames.len(),
        total_frames,
        target
    );
    Ok(frames)
}
