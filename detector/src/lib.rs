//! Deepfake detection core.
//!
//! A [`ScoringBackend`] turns one RGB image into a real/fake distribution.
//! The [`BackendSelector`] builds exactly one backend per process on first
//! use. Single images go through [`analyzer::analyze`]; videos are sampled
//! into a few keyframes, scored frame by frame and reduced to one verdict by
//! [`pipeline::analyze_video`].

pub mod aggregate;
pub mod analyzer;
pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prediction;
pub mod selector;
pub mod video;

#[cfg(test)]
mod test_support;

pub use aggregate::{Resolution, VideoAnalysisResult};
pub use backend::{BackendInfo, ScoringBackend, WeightsState};
pub use config::{CustomArchitecture, ModelConfig, ModelKind};
pub use error::{DetectorError, ScoringError};
pub use prediction::{Distribution, PredictionRecord};
pub use selector::{BackendSelector, BackendStatus};
