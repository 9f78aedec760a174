//! Error types for the detection pipeline

use thiserror::Error;

/// Stream-level and initialization failures. These abort a request.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The video could not be opened, or reported no frames.
    #[error("invalid video: {0}")]
    InvalidVideo(String),

    /// The video opened but not a single sampled frame decoded.
    #[error("could not extract any frames from video")]
    NoFramesExtracted,

    /// The scoring backend failed to load.
    #[error("backend initialization failed: {0}")]
    BackendInit(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectorError {
    /// Stable name of the error kind, used in structured responses.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectorError::InvalidVideo(_) => "InvalidVideo",
            DetectorError::NoFramesExtracted => "NoFramesExtracted",
            DetectorError::BackendInit(_) => "BackendInitFailure",
            DetectorError::Io(_) => "Io",
        }
    }
}

/// Failure while scoring a single image. Never aborts a request on its own:
/// the frame analyzer turns it into a degraded prediction record.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("preprocessing failed: {0}")]
    Preprocess(String),

    #[error("model output has {got} classes, label map needs index {needed}")]
    OutputShape { got: usize, needed: usize },
}

pub type Result<T, E = DetectorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_for_stream_errors() {
        let invalid = DetectorError::InvalidVideo("reports 0 frames".into());
        let empty = DetectorError::NoFramesExtracted;
        assert_eq!(invalid.kind(), "InvalidVideo");
        assert_eq!(empty.kind(), "NoFramesExtracted");
        assert_ne!(invalid.kind(), empty.kind());
    }
}
