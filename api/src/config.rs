//! Service configuration read from the environment

use detector::ModelConfig;
use detector::video::DEFAULT_SAMPLE_COUNT;

use crate::constants::{DEFAULT_MAX_UPLOAD_MB, DEFAULT_PORT};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub model: ModelConfig,
    /// Keyframes sampled per uploaded video
    pub video_sample_count: usize,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            model: ModelConfig::default(),
            video_sample_count: DEFAULT_SAMPLE_COUNT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_or(&lookup, "PORT", defaults.port);
        let video_sample_count =
            parse_or(&lookup, "VIDEO_SAMPLE_COUNT", defaults.video_sample_count).max(1);
        let max_upload_mb = parse_or(&lookup, "MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB);

        Self {
            port,
            model: ModelConfig::from_lookup(&lookup),
            video_sample_count,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}
