use anyhow::{Context, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{BatchNorm, Conv2d, Conv2dConfig, Func, Linear, VarBuilder, VarMap};
use candle_transformers::models::resnet;
use image::DynamicImage;
use std::path::Path;

use super::checkpoint;
use super::labels::LabelMap;
use super::preprocess::Preprocessing;
use super::{BackendInfo, ScoringBackend, WeightsState, device_label, logits_to_distribution};
use crate::config::CustomArchitecture;
use crate::error::ScoringError;
use crate::prediction::Distribution;

const NUM_CLASSES: usize = 2;
const POOLED_SIZE: usize = 7;

/// One `conv -> batchnorm -> relu -> maxpool` stage. Parameter names follow
/// the `features` Sequential of the training script, so `features.0` is the
/// first conv and `features.1` its batchnorm.
struct ConvBlock {
    conv: Conv2d,
    bn: BatchNorm,
}

impl ConvBlock {
    fn new(
        in_channels: usize,
        out_channels: usize,
        index: usize,
        vb: &VarBuilder,
    ) -> candle_core::Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv = candle_nn::conv2d(in_channels, out_channels, 3, cfg, vb.pp(index.to_string()))?;
        let bn = candle_nn::batch_norm(out_channels, 1e-5, vb.pp((index + 1).to_string()))?;
        Ok(Self { conv, bn })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        xs.apply(&self.conv)?
            .apply_t(&self.bn, false)?
            .relu()?
            .max_pool2d(2)
    }
}

/// Four conv blocks (64/128/256/512 channels) followed by an adaptive
/// average pool to 7x7 and a three-layer classifier.
pub struct CustomCnn {
    blocks: Vec<ConvBlock>,
    fc1: Linear,
    fc2: Linear,
    fc3: Linear,
}

impl CustomCnn {
    pub fn new(num_classes: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let features = vb.pp("features");
        let blocks = vec![
            ConvBlock::new(3, 64, 0, &features)?,
            ConvBlock::new(64, 128, 4, &features)?,
            ConvBlock::new(128, 256, 8, &features)?,
            ConvBlock::new(256, 512, 12, &features)?,
        ];

        // classifier.0 pools, .1 flattens, ReLU/Dropout pairs sit at 3-4 and 6-7
        let classifier = vb.pp("classifier");
        let fc1 = candle_nn::linear(512 * POOLED_SIZE * POOLED_SIZE, 4096, classifier.pp("2"))?;
        let fc2 = candle_nn::linear(4096, 1024, classifier.pp("5"))?;
        let fc3 = candle_nn::linear(1024, num_classes, classifier.pp("8"))?;

        Ok(Self {
            blocks,
            fc1,
            fc2,
            fc3,
        })
    }
}

impl Module for CustomCnn {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut xs = xs.clone();
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }
        adaptive_avg_pool2d(&xs, POOLED_SIZE)?
            .flatten_from(1)?
            .apply(&self.fc1)?
            .relu()?
            .apply(&self.fc2)?
            .relu()?
            .apply(&self.fc3)
    }
}

/// Adaptive average pooling for inputs whose spatial size is a multiple of
/// the output size, which holds for the fixed 224x224 input.
fn adaptive_avg_pool2d(xs: &Tensor, out: usize) -> candle_core::Result<Tensor> {
    let (_, _, h, w) = xs.dims4()?;
    if h % out != 0 || w % out != 0 {
        candle_core::bail!("cannot adaptively pool {}x{} to {}x{}", h, w, out, out);
    }
    if h == out && w == out {
        return Ok(xs.clone());
    }
    xs.avg_pool2d((h / out, w / out))
}

enum Network {
    Cnn(CustomCnn),
    Resnet(Func<'static>),
}

impl Module for Network {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Network::Cnn(model) => model.forward(xs),
            Network::Resnet(model) => model.forward(xs),
        }
    }
}

/// Class order recorded in the checkpoint, or index 0 = real when it has
/// none or the names are not recognised.
fn resolve_labels(classes: Option<&[String]>, path: &Path) -> LabelMap {
    match classes {
        Some(classes) => LabelMap::from_class_names(classes).unwrap_or_else(|| {
            log::warn!(
                "{}: unrecognised classes {:?}, assuming index 0 = real",
                path.display(),
                classes
            );
            LabelMap::REAL_FIRST
        }),
        None => {
            log::info!("{}: no class list, assuming index 0 = real", path.display());
            LabelMap::REAL_FIRST
        }
    }
}

/// Backend for locally trained checkpoints.
pub struct CustomBackend {
    network: Network,
    labels: LabelMap,
    preprocessing: Preprocessing,
    device: Device,
    info: BackendInfo,
}

impl CustomBackend {
    /// Build the configured architecture and load weights from `path`.
    ///
    /// A missing checkpoint is not fatal: the network keeps its random
    /// initialization and the backend reports [`WeightsState::Untrained`].
    pub fn load(path: &Path, architecture: CustomArchitecture, device: Device) -> Result<Self> {
        log::info!(
            "Loading custom {} model from {} on {:?}",
            architecture,
            path.display(),
            device
        );

        // Kept alive until the network has pulled its initial values
        let varmap = VarMap::new();

        let (vb, weights, labels) = if path.exists() {
            let checkpoint = checkpoint::load(path, &device)?;
            let labels = resolve_labels(checkpoint.classes.as_deref(), path);
            (
                VarBuilder::from_tensors(checkpoint.tensors, DType::F32, &device),
                WeightsState::Trained,
                labels,
            )
        } else {
            log::warn!(
                "Model file {} not found, serving untrained weights",
                path.display()
            );
            (
                VarBuilder::from_varmap(&varmap, DType::F32, &device),
                WeightsState::Untrained,
                LabelMap::REAL_FIRST,
            )
        };

        let network = match architecture {
            CustomArchitecture::CustomCnn => Network::Cnn(
                CustomCnn::new(NUM_CLASSES, vb).context("checkpoint does not match custom_cnn")?,
            ),
            CustomArchitecture::Resnet => Network::Resnet(
                resnet::resnet50(NUM_CLASSES, vb).context("checkpoint does not match resnet50")?,
            ),
        };

        let info = BackendInfo {
            model_name: path.display().to_string(),
            model_type: "custom_trained".to_string(),
            architecture: architecture.to_string(),
            device: device_label(&device),
            weights,
        };
        log::info!(
            "Custom model ready ({:?} weights, fake={}, real={})",
            info.weights,
            labels.fake,
            labels.real
        );

        Ok(Self {
            network,
            labels,
            preprocessing: Preprocessing::IMAGENET,
            device,
            info,
        })
    }
}

impl ScoringBackend for CustomBackend {
    fn predict(&self, image: &DynamicImage) -> Result<Distribution, ScoringError> {
        let input = self.preprocessing.to_tensor(image, &self.device)?;
        let logits = self.network.forward(&input)?;
        logits_to_distribution(&logits, self.labels)
    }

    fn info(&self) -> &BackendInfo {
        &self.info
    }
}
