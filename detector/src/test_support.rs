//! Deterministic backends and frame sources for unit tests

use anyhow::{Result, anyhow};
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::{BackendInfo, ScoringBackend, WeightsState};
use crate::error::ScoringError;
use crate::prediction::Distribution;
use crate::video::{FrameSource, VideoMetadata};

fn info() -> BackendInfo {
    BackendInfo {
        model_name: "fixed".to_string(),
        model_type: "test".to_string(),
        architecture: "none".to_string(),
        device: "cpu".to_string(),
        weights: WeightsState::Pretrained,
    }
}

/// Returns the same distribution for every image and counts calls.
pub struct FixedBackend {
    dist: Distribution,
    info: BackendInfo,
    pub calls: AtomicUsize,
}

impl FixedBackend {
    pub fn new(real: f32, fake: f32) -> Self {
        Self {
            dist: Distribution::new(real, fake),
            info: info(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScoringBackend for FixedBackend {
    fn predict(&self, _image: &DynamicImage) -> Result<Distribution, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.dist)
    }

    fn info(&self) -> &BackendInfo {
        &self.info
    }
}

/// Reads the fake score from the red channel of the top-left pixel, fails
/// when that channel is zero.
pub struct PixelBackend {
    info: BackendInfo,
}

impl PixelBackend {
    pub fn new() -> Self {
        Self { info: info() }
    }
}

impl ScoringBackend for PixelBackend {
    fn predict(&self, image: &DynamicImage) -> Result<Distribution, ScoringError> {
        let pixel = image.to_rgb8().get_pixel(0, 0).0;
        if pixel[0] == 0 {
            return Err(ScoringError::Preprocess("black frame".to_string()));
        }
        let fake = pixel[0] as f32 / 255.0;
        Ok(Distribution::new(1.0 - fake, fake))
    }

    fn info(&self) -> &BackendInfo {
        &self.info
    }
}

pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

/// In-memory video whose frame `i` is a solid image with red channel `i`.
/// Decoding fails at any index in `fail_at`.
pub struct SyntheticVideo {
    metadata: VideoMetadata,
    pub fail_at: Vec<u64>,
    pub decoded: Vec<u64>,
}

impl SyntheticVideo {
    pub fn new(total_frames: u64, fps: f64) -> Self {
        Self {
            metadata: VideoMetadata {
                total_frames,
                fps,
                width: 16,
                height: 8,
            },
            fail_at: Vec::new(),
            decoded: Vec::new(),
        }
    }
}

impl FrameSource for SyntheticVideo {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_frame(&mut self, index: u64) -> Result<DynamicImage> {
        if self.fail_at.contains(&index) || index >= self.metadata.total_frames {
            return Err(anyhow!("cannot seek to frame {}", index));
        }
        self.decoded.push(index);
        Ok(solid(
            self.metadata.width,
            self.metadata.height,
            [(index % 256) as u8, 10, 10],
        ))
    }
}
