//! Scoring backends: one decoded image in, a real/fake distribution out.

use anyhow::Result;
use candle_core::{Device, Tensor};
use image::DynamicImage;
use serde::Serialize;
use std::path::Path;

use crate::config::{ModelConfig, ModelKind};
use crate::error::ScoringError;
use crate::prediction::Distribution;

pub mod checkpoint;
mod custom;
mod labels;
mod preprocess;
mod pretrained;

pub use custom::{CustomBackend, CustomCnn};
pub use labels::LabelMap;
pub use preprocess::Preprocessing;
pub use pretrained::PretrainedBackend;

/// Capability shared by every model variant.
///
/// Implementations are read-only after construction so one instance can
/// serve concurrent requests without locking.
pub trait ScoringBackend: Send + Sync {
    /// Score one RGB image of any size. The backend resizes and normalizes
    /// internally; callers never pre-resize.
    fn predict(&self, image: &DynamicImage) -> Result<Distribution, ScoringError>;

    /// Static description for health reporting.
    fn info(&self) -> &BackendInfo;
}

/// Where the weights came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightsState {
    /// Published weights from a model hub or a local export of one
    Pretrained,
    /// Loaded from a local checkpoint
    Trained,
    /// Checkpoint missing, randomly initialized. Predictions are meaningless.
    Untrained,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub model_name: String,
    pub model_type: String,
    pub architecture: String,
    pub device: String,
    pub weights: WeightsState,
}

/// Construct the backend variant selected by `config`.
pub fn load_backend(config: &ModelConfig) -> Result<Box<dyn ScoringBackend>> {
    let device = select_device();

    let backend: Box<dyn ScoringBackend> = match config.model_type {
        ModelKind::HuggingFace => Box::new(PretrainedBackend::load(&config.model_path, device)?),
        ModelKind::Custom => Box::new(CustomBackend::load(
            Path::new(&config.model_path),
            config.custom_model_type,
            device,
        )?),
    };
    Ok(backend)
}

/// Compute device for inference, picked by cargo feature.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    let device = Device::new_metal(0).unwrap_or(Device::Cpu);
    #[cfg(all(feature = "cuda", not(feature = "metal")))]
    let device = Device::cuda_if_available(0).unwrap_or(Device::Cpu);
    #[cfg(not(any(feature = "metal", feature = "cuda")))]
    let device = Device::Cpu;

    device
}

pub fn device_label(device: &Device) -> String {
    if device.is_cuda() {
        "cuda".to_string()
    } else if device.is_metal() {
        "metal".to_string()
    } else {
        "cpu".to_string()
    }
}

/// Softmax a `(1, classes)` logits tensor and read the real/fake pair.
pub(crate) fn logits_to_distribution(
    logits: &Tensor,
    labels: LabelMap,
) -> Result<Distribution, ScoringError> {
    let probs = candle_nn::ops::softmax(logits, 1)?;
    let probs: Vec<f32> = probs.flatten_all()?.to_vec1()?;
    labels.distribution(&probs)
}
