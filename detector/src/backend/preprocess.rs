use anyhow::Result;
use candle_core::{Device, Tensor};
use image::DynamicImage;
use image::imageops::FilterType;
use serde::Deserialize;

use crate::error::ScoringError;

const DEFAULT_IMAGE_SIZE: usize = 224;

/// Resize + normalize parameters for a model's input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessing {
    pub width: usize,
    pub height: usize,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Preprocessing {
    /// ViT image processor defaults
    pub const VIT: Preprocessing = Preprocessing {
        width: DEFAULT_IMAGE_SIZE,
        height: DEFAULT_IMAGE_SIZE,
        mean: [0.5, 0.5, 0.5],
        std: [0.5, 0.5, 0.5],
    };

    /// torchvision ImageNet normalization used by the custom training scripts
    pub const IMAGENET: Preprocessing = Preprocessing {
        width: DEFAULT_IMAGE_SIZE,
        height: DEFAULT_IMAGE_SIZE,
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };

    /// Parse a Hugging Face `preprocessor_config.json`, keeping ViT defaults
    /// for anything it leaves out.
    pub fn from_hf_config(json: &str) -> Result<Self> {
        let raw: HfPreprocessorConfig = serde_json::from_str(json)?;
        let mut pre = Self::VIT;

        if let Some(mean) = raw.image_mean.as_deref().and_then(as_rgb) {
            pre.mean = mean;
        }
        if let Some(std) = raw.image_std.as_deref().and_then(as_rgb) {
            pre.std = std;
        }
        match raw.size {
            Some(HfSize::Square(side)) | Some(HfSize::ShortestEdge { shortest_edge: side }) => {
                pre.width = side;
                pre.height = side;
            }
            Some(HfSize::Dims { height, width }) => {
                pre.width = width;
                pre.height = height;
            }
            None => {}
        }

        if pre.width == 0 || pre.height == 0 || pre.std.contains(&0.0) {
            anyhow::bail!("invalid preprocessor config: {:?}", pre);
        }
        Ok(pre)
    }

    /// Resize to the model input size and build a normalized `(1, 3, H, W)` tensor.
    pub fn to_tensor(&self, image: &DynamicImage, device: &Device) -> Result<Tensor, ScoringError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ScoringError::Preprocess("image has no pixels".to_string()));
        }

        let rgb = image
            .resize_exact(self.width as u32, self.height as u32, FilterType::Triangle)
            .to_rgb8();

        let plane = self.width * self.height;
        let mut data = vec![0f32; 3 * plane];

        // CHW layout
        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                data[c * plane + i] = (value - self.mean[c]) / self.std[c];
            }
        }

        let tensor = Tensor::from_vec(data, (1, 3, self.height, self.width), device)?;
        Ok(tensor)
    }
}

#[derive(Debug, Deserialize)]
struct HfPreprocessorConfig {
    image_mean: Option<Vec<f32>>,
    image_std: Option<Vec<f32>>,
    size: Option<HfSize>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HfSize {
    Square(usize),
    Dims { height: usize, width: usize },
    ShortestEdge { shortest_edge: usize },
}

fn as_rgb(values: &[f32]) -> Option<[f32; 3]> {
    match values {
        [r, g, b] => Some([*r, *g, *b]),
        [v] => Some([*v; 3]),
        _ => None,
    }
}
