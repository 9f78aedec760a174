//! Video-level verdict from per-frame records

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::error::{DetectorError, Result};
use crate::prediction::{Distribution, PredictionRecord};
use crate::video::{SampledFrame, VideoMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoAnalysisResult {
    pub frames_analyzed: usize,
    pub confidence: f32,
    pub distribution: Distribution,
    pub is_fake: bool,
    pub duration_seconds: f64,
    pub fps: f64,
    pub resolution: Resolution,
    /// Sampled frames as `data:image/jpeg;base64,...` URIs, in sampling order
    pub frames: Vec<String>,
}

/// Reduce positionally matching `predictions` and `frames` into one verdict.
///
/// Confidence and both scores are plain arithmetic means. Degraded records
/// count with zero scores. The video is fake only when the mean fake score is
/// strictly greater than the mean real score.
pub fn aggregate(
    predictions: &[PredictionRecord],
    frames: &[SampledFrame],
    metadata: &VideoMetadata,
) -> Result<VideoAnalysisResult> {
    debug_assert_eq!(predictions.len(), frames.len());
    if predictions.is_empty() {
        return Err(DetectorError::NoFramesExtracted);
    }

    let (mut confidence, mut real, mut fake) = (0f64, 0f64, 0f64);
    for record in predictions {
        confidence += record.confidence as f64;
        real += record.real_score as f64;
        fake += record.fake_score as f64;
    }

    let n = predictions.len() as f64;
    let distribution = Distribution::new((real / n) as f32, (fake / n) as f32);

    let degraded = predictions.iter().filter(|r| r.is_degraded()).count();
    if degraded > 0 {
        log::warn!("{} of {} frames degraded", degraded, predictions.len());
    }

    Ok(VideoAnalysisResult {
        frames_analyzed: predictions.len(),
        confidence: (confidence / n) as f32,
        distribution,
        is_fake: distribution.fake > distribution.real,
        duration_seconds: metadata.duration_seconds(),
        fps: metadata.fps,
        resolution: Resolution {
            width: metadata.width,
            height: metadata.height,
        },
        frames: frames.iter().map(|f| to_data_uri(&f.reencoded)).collect(),
    })
}

pub fn to_data_uri(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}
