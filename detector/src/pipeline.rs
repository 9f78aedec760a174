//! End-to-end video analysis: sample, score each frame, aggregate

use std::io::Write;
use std::time::Instant;

use crate::aggregate::{self, VideoAnalysisResult};
use crate::analyzer;
use crate::backend::ScoringBackend;
use crate::error::Result;
use crate::prediction::PredictionRecord;
use crate::video::{self, FfmpegVideo, FrameSource};

/// Analyze an already opened video. Frames are scored one at a time in
/// ascending index order.
pub fn analyze_video<S>(
    source: &mut S,
    backend: &dyn ScoringBackend,
    target_count: usize,
) -> Result<VideoAnalysisResult>
where
    S: FrameSource + ?Sized,
{
    let started = Instant::now();
    let metadata = *source.metadata();
    let frames = video::sample(source, target_count)?;

    let predictions: Vec<PredictionRecord> = frames
        .iter()
        .map(|frame| analyzer::analyze(&frame.image, backend))
        .collect();

    let result = aggregate::aggregate(&predictions, &frames, &metadata)?;
    log::info!(
        "Video verdict: fake={} confidence={:.3} over {} frames in {:.2?}",
        result.is_fake,
        result.confidence,
        result.frames_analyzed,
        started.elapsed()
    );
    Ok(result)
}

/// Analyze an uploaded video held in memory.
///
/// The bytes are spooled to a temporary file for ffmpeg. The file is removed
/// when this function returns, whether it succeeded or not.
pub fn analyze_video_bytes(
    bytes: &[u8],
    backend: &dyn ScoringBackend,
    target_count: usize,
) -> Result<VideoAnalysisResult> {
    let mut upload = tempfile::Builder::new().prefix("upload-").tempfile()?;
    upload.write_all(bytes)?;
    upload.flush()?;

    log::debug!(
        "Spooled {} byte upload to {}",
        bytes.len(),
        upload.path().display()
    );

    let mut source = FfmpegVideo::open(upload.path())?;
    analyze_video(&mut source, backend, target_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectorError;
    use crate::test_support::{FixedBackend, PixelBackend, SyntheticVideo};
    use std::sync::atomic::Ordering;

    #[test]
    fn scores_each_sampled_frame_once() {
        let backend = FixedBackend::new(0.2, 0.8);
        let mut video = SyntheticVideo::new(30, 30.0);

        let result = analyze_video(&mut video, &backend, 5).unwrap();

        assert_eq!(result.frames_analyzed, 5);
        assert_eq!(result.frames.len(), 5);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
        assert!(result.is_fake);
        assert_eq!(result.duration_seconds, 1.0);
    }

    #[test]
    fn failing_frame_is_degraded_not_fatal() {
        // Frame 0 has a zero red channel, so the pixel backend fails on it
        let mut video = SyntheticVideo::new(30, 30.0);
        let result = analyze_video(&mut video, &PixelBackend::new(), 5).unwrap();

        assert_eq!(result.frames_analyzed, 5);
        // Red channel is 6, 12, 18, 24 on the four healthy frames
        let expected_fake = (6.0 + 12.0 + 18.0 + 24.0) / 255.0 / 5.0;
        assert!((result.distribution.fake - expected_fake).abs() < 1e-5);
        assert!(!result.is_fake);
    }

    #[test]
    fn stream_errors_propagate() {
        let backend = FixedBackend::new(0.5, 0.5);

        let mut empty = SyntheticVideo::new(0, 30.0);
        let err = analyze_video(&mut empty, &backend, 5).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidVideo(_)));

        let mut broken = SyntheticVideo::new(30, 30.0);
        broken.fail_at = vec![0];
        let err = analyze_video(&mut broken, &backend, 5).unwrap_err();
        assert!(matches!(err, DetectorError::NoFramesExtracted));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn garbage_upload_is_invalid_video() {
        let backend = FixedBackend::new(0.5, 0.5);
        let err = analyze_video_bytes(b"not a video at all", &backend, 5).unwrap_err();
        // Either ffprobe rejects the file or it is not installed; both are
        // reported as an unreadable video
        assert!(matches!(err, DetectorError::InvalidVideo(_)));
    }
}
