use anyhow::{Context, Result};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use hf_hub::{Repo, RepoType, api::sync::Api};
use image::DynamicImage;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::labels::LabelMap;
use super::preprocess::Preprocessing;
use super::{BackendInfo, ScoringBackend, WeightsState, device_label, logits_to_distribution};
use crate::error::ScoringError;
use crate::prediction::Distribution;

pub const DEFAULT_MODEL_REPO: &str = "prithivMLmods/Deep-Fake-Detector-v2-Model";

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const PREPROCESSOR_FILE: &str = "preprocessor_config.json";

/// Label metadata carried in the model's `config.json`
#[derive(Debug, Default, Deserialize)]
struct LabelConfig {
    #[serde(default)]
    id2label: Option<HashMap<String, String>>,
}

/// Where the pretrained model files live.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ModelSource {
    Local(PathBuf),
    Hub(String),
}

impl ModelSource {
    /// An existing directory is used as a local export, an `owner/name`
    /// string as a hub repo id. Anything else (such as a checkpoint file
    /// path) falls back to the default repo.
    fn resolve(model_path: &str) -> Self {
        let path = Path::new(model_path);
        if path.is_dir() {
            return ModelSource::Local(path.to_path_buf());
        }
        if looks_like_repo_id(model_path) && !path.exists() {
            return ModelSource::Hub(model_path.to_string());
        }
        ModelSource::Hub(DEFAULT_MODEL_REPO.to_string())
    }

    fn fetch(&self) -> Result<ModelFiles> {
        match self {
            ModelSource::Local(dir) => {
                let preprocessor = dir.join(PREPROCESSOR_FILE);
                Ok(ModelFiles {
                    config: dir.join(CONFIG_FILE),
                    weights: dir.join(WEIGHTS_FILE),
                    preprocessor: preprocessor.exists().then_some(preprocessor),
                })
            }
            ModelSource::Hub(id) => {
                let api = Api::new()?;
                let repo = api.repo(Repo::new(id.clone(), RepoType::Model));

                let config = repo.get(CONFIG_FILE)?;
                let weights = repo.get(WEIGHTS_FILE)?;
                let preprocessor = match repo.get(PREPROCESSOR_FILE) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        log::debug!("{} has no {}: {}", id, PREPROCESSOR_FILE, e);
                        None
                    }
                };

                Ok(ModelFiles {
                    config,
                    weights,
                    preprocessor,
                })
            }
        }
    }

    fn name(&self) -> String {
        match self {
            ModelSource::Local(dir) => dir.display().to_string(),
            ModelSource::Hub(id) => id.clone(),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Local(dir) => write!(f, "local model {}", dir.display()),
            ModelSource::Hub(id) => write!(f, "hub model {}", id),
        }
    }
}

struct ModelFiles {
    config: PathBuf,
    weights: PathBuf,
    preprocessor: Option<PathBuf>,
}

fn looks_like_repo_id(s: &str) -> bool {
    let mut parts = s.split('/');
    let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let valid = |part: &str| {
        !part.is_empty()
            && !part.starts_with('.')
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    let has_weight_ext = [".pth", ".pt", ".safetensors", ".bin", ".ckpt"]
        .iter()
        .any(|ext| name.ends_with(ext));

    valid(owner) && valid(name) && !has_weight_ext
}

/// Resolve the class indices, consulting `id2label` before the fixed
/// convention.
fn resolve_labels(label_config: &LabelConfig, source: &ModelSource) -> LabelMap {
    match label_config.id2label.as_ref() {
        Some(table) => LabelMap::from_id2label(table).unwrap_or_else(|| {
            log::warn!(
                "{}: unrecognised labels {:?}, assuming index 0 = fake",
                source,
                table
            );
            LabelMap::FAKE_FIRST
        }),
        None => {
            log::info!("{}: no id2label, assuming index 0 = fake", source);
            LabelMap::FAKE_FIRST
        }
    }
}

/// ViT image classifier published on the Hugging Face hub.
pub struct PretrainedBackend {
    model: vit::Model,
    labels: LabelMap,
    preprocessing: Preprocessing,
    device: Device,
    info: BackendInfo,
}

impl PretrainedBackend {
    pub fn load(model_path: &str, device: Device) -> Result<Self> {
        let source = ModelSource::resolve(model_path);
        log::info!("Loading {} on {:?}", source, device);

        let files = source.fetch()?;

        let config_json = std::fs::read_to_string(&files.config)
            .with_context(|| format!("failed to read {}", files.config.display()))?;
        let vit_config: vit::Config = serde_json::from_str(&config_json)
            .with_context(|| format!("{} is not a ViT config", files.config.display()))?;
        let label_config: LabelConfig = serde_json::from_str(&config_json)?;

        let labels = resolve_labels(&label_config, &source);
        let num_labels = label_config
            .id2label
            .as_ref()
            .map(|table| table.len())
            .unwrap_or(2)
            .max(labels.num_classes());

        let preprocessing = match &files.preprocessor {
            Some(path) => Preprocessing::from_hf_config(&std::fs::read_to_string(path)?)
                .with_context(|| format!("failed to parse {}", path.display()))?,
            None => Preprocessing::VIT,
        };

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.weights], DType::F32, &device)?
        };
        let model = vit::Model::new(&vit_config, num_labels, vb)?;

        let info = BackendInfo {
            model_name: source.name(),
            model_type: "huggingface".to_string(),
            architecture: "vit".to_string(),
            device: device_label(&device),
            weights: WeightsState::Pretrained,
        };

        log::info!(
            "Pretrained model loaded ({} classes, fake={}, real={})",
            num_labels,
            labels.fake,
            labels.real
        );

        Ok(Self {
            model,
            labels,
            preprocessing,
            device,
            info,
        })
    }
}

impl ScoringBackend for PretrainedBackend {
    fn predict(&self, image: &DynamicImage) -> Result<Distribution, ScoringError> {
        let input = self.preprocessing.to_tensor(image, &self.device)?;
        let logits = self.model.forward(&input)?;
        logits_to_distribution(&logits, self.labels)
    }

    fn info(&self) -> &BackendInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_ids_are_recognised() {
        assert!(looks_like_repo_id("prithivMLmods/Deep-Fake-Detector-v2-Model"));
        assert!(looks_like_repo_id("google/vit-base-patch16-224"));
        assert!(!looks_like_repo_id("models/deepfake_detector.pth"));
        assert!(!looks_like_repo_id("/abs/path/model"));
        assert!(!looks_like_repo_id("a/b/c"));
        assert!(!looks_like_repo_id("single"));
    }

    #[test]
    fn checkpoint_path_resolves_to_default_repo() {
        assert_eq!(
            ModelSource::resolve("models/deepfake_detector.pth"),
            ModelSource::Hub(DEFAULT_MODEL_REPO.to_string())
        );
        assert_eq!(
            ModelSource::resolve("someone/face-forensics-vit"),
            ModelSource::Hub("someone/face-forensics-vit".to_string())
        );
    }

    #[test]
    fn existing_directory_is_local() {
        let dir = tempfile::tempdir().unwrap();
        let source = ModelSource::resolve(dir.path().to_str().unwrap());
        assert_eq!(source, ModelSource::Local(dir.path().to_path_buf()));

        let files = source.fetch().unwrap();
        assert_eq!(files.config, dir.path().join("config.json"));
        assert!(files.preprocessor.is_none());
    }

    #[test]
    fn labels_come_from_config_when_present() {
        let source = ModelSource::Hub(DEFAULT_MODEL_REPO.to_string());

        let config: LabelConfig =
            serde_json::from_str(r#"{"id2label": {"0": "Realism", "1": "Deepfake"}}"#).unwrap();
        assert_eq!(resolve_labels(&config, &source), LabelMap { fake: 1, real: 0 });

        let config: LabelConfig = serde_json::from_str(r#"{"hidden_size": 768}"#).unwrap();
        assert_eq!(resolve_labels(&config, &source), LabelMap::FAKE_FIRST);

        let config: LabelConfig =
            serde_json::from_str(r#"{"id2label": {"0": "LABEL_0", "1": "LABEL_1"}}"#).unwrap();
        assert_eq!(resolve_labels(&config, &source), LabelMap::FAKE_FIRST);
    }
}
