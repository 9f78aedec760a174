//! Model selection configuration

use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MODEL_PATH: &str = "models/deepfake_detector.pth";

/// Which scoring backend variant to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    /// Pretrained image classifier from the Hugging Face hub (or a local export of one)
    #[default]
    HuggingFace,
    /// Locally trained checkpoint
    Custom,
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hf" => Ok(ModelKind::HuggingFace),
            "custom" => Ok(ModelKind::Custom),
            other => Err(format!("unknown model type: {}", other)),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::HuggingFace => write!(f, "huggingface"),
            ModelKind::Custom => write!(f, "custom"),
        }
    }
}

/// Architecture of a custom checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomArchitecture {
    #[default]
    CustomCnn,
    Resnet,
}

impl FromStr for CustomArchitecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "custom_cnn" | "cnn" => Ok(CustomArchitecture::CustomCnn),
            "resnet" | "resnet50" => Ok(CustomArchitecture::Resnet),
            other => Err(format!("unknown custom model type: {}", other)),
        }
    }
}

impl fmt::Display for CustomArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomArchitecture::CustomCnn => write!(f, "custom_cnn"),
            CustomArchitecture::Resnet => write!(f, "resnet"),
        }
    }
}

/// Everything needed to build a scoring backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Checkpoint file, local model directory, or hub repo id
    pub model_path: String,
    pub model_type: ModelKind,
    pub custom_model_type: CustomArchitecture,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            model_type: ModelKind::default(),
            custom_model_type: CustomArchitecture::default(),
        }
    }
}

impl ModelConfig {
    /// Load from `MODEL_PATH`, `MODEL_TYPE` and `CUSTOM_MODEL_TYPE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unknown enum values fall back to
    /// the defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_path = lookup("MODEL_PATH")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string());

        let model_type = parse_or_default::<ModelKind>(lookup("MODEL_TYPE"), "MODEL_TYPE");
        let custom_model_type = parse_or_default::<CustomArchitecture>(
            lookup("CUSTOM_MODEL_TYPE"),
            "CUSTOM_MODEL_TYPE",
        );

        Self {
            model_path,
            model_type,
            custom_model_type,
        }
    }
}

fn parse_or_default<T>(raw: Option<String>, key: &str) -> T
where
    T: FromStr<Err = String> + Default + fmt::Display,
{
    match raw {
        Some(value) => value.parse().unwrap_or_else(|e| {
            let fallback = T::default();
            log::warn!("{}: {} (using {})", key, e, fallback);
            fallback
        }),
        None => T::default(),
    }
}
