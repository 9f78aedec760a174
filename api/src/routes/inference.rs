//! Deepfake analysis endpoints (/inference/*)

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    routing::post,
};
use detector::{Distribution, PredictionRecord, Resolution, ScoringBackend, analyzer, pipeline};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;
use crate::constants::MODEL_VERSION;
use crate::error::{AppError, LogErr};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/inference/analyze-frame", post(analyze_frame))
        .route("/inference/analyze-video", post(analyze_video))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResponse {
    /// Caller's tag echoed back, `0` when none was sent
    frame_number: Value,
    confidence: f32,
    distribution: Distribution,
    #[serde(rename = "is_fake")]
    is_fake: bool,
    /// Milliseconds
    processing_time: f64,
    model_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    #[serde(rename = "type")]
    kind: &'static str,
    frames_analyzed: usize,
    confidence: f32,
    distribution: Distribution,
    #[serde(rename = "is_fake")]
    is_fake: bool,
    model_version: &'static str,
    /// Seconds
    duration: f64,
    fps: f64,
    resolution: Resolution,
    frames: Vec<String>,
    processing_time: f64,
}

/// Collected multipart upload
#[derive(Default)]
struct Upload {
    file: Option<Bytes>,
    frame_number: Option<String>,
}

/// Body-limit rejections keep their 413; anything else is a malformed upload.
fn multipart_error(context: &str, e: MultipartError) -> AppError {
    let message = e.body_text();
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        log::warn!("{}: {}", context, message);
        AppError::PayloadTooLarge(message)
    } else {
        log::debug!("{}: {}", context, message);
        AppError::NoInputProvided(message)
    }
}

/// Read the file field named `file_field` plus the optional `frameNumber`
/// text field. Unknown fields are ignored.
async fn read_upload(multipart: &mut Multipart, file_field: &str) -> Result<Upload, AppError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Multipart field error", e))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(n) if n == file_field => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read upload", e))?;
                upload.file = Some(bytes);
            }
            Some("frameNumber") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Failed to read frameNumber", e))?;
                upload.frame_number = Some(text);
            }
            _ => {}
        }
    }

    Ok(upload)
}

/// Run `work` with the shared backend on the blocking pool. The first call in
/// the process also loads the backend there.
async fn with_backend<T, F>(state: &Arc<AppState>, work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ScoringBackend) -> Result<T, AppError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let backend = state.selector.get_or_init(&state.config.model)?;
        work(backend.as_ref())
    })
    .await
    .log_500("Inference task failed")?
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// POST /inference/analyze-frame - Score one uploaded image
/// Accepts multipart form data with:
/// - "image": the encoded image
/// - "frameNumber": optional caller tag, echoed back
async fn analyze_frame(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<FrameResponse>, AppError> {
    let started = Instant::now();
    let upload = read_upload(&mut multipart, "image").await?;

    let bytes = upload
        .file
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::NoInputProvided("No image provided".to_string()))?;

    let record: PredictionRecord = with_backend(&state, move |backend| {
        let image = analyzer::load_image_from_bytes(&bytes)
            .log_map("Image decode failed", AppError::InvalidImage)?;
        Ok(analyzer::analyze(&image, backend))
    })
    .await?;

    let frame_number = upload
        .frame_number
        .map(Value::String)
        .unwrap_or_else(|| Value::from(0));

    log::info!(
        "Frame {} analyzed: fake={} confidence={:.3}",
        frame_number,
        record.is_fake,
        record.confidence
    );

    Ok(Json(FrameResponse {
        frame_number,
        confidence: record.confidence,
        distribution: record.distribution(),
        is_fake: record.is_fake,
        processing_time: elapsed_ms(started),
        model_version: MODEL_VERSION,
        error: record.error,
    }))
}

/// POST /inference/analyze-video - Sample keyframes and return one verdict
/// Accepts multipart form data with a single "video" field.
async fn analyze_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<VideoResponse>, AppError> {
    let started = Instant::now();
    let upload = read_upload(&mut multipart, "video").await?;

    let bytes = upload
        .file
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::NoInputProvided("No video provided".to_string()))?;

    let sample_count = state.config.video_sample_count;
    let result = with_backend(&state, move |backend| {
        Ok(pipeline::analyze_video_bytes(&bytes, backend, sample_count)?)
    })
    .await?;

    Ok(Json(VideoResponse {
        kind: "video",
        frames_analyzed: result.frames_analyzed,
        confidence: result.confidence,
        distribution: result.distribution,
        is_fake: result.is_fake,
        model_version: MODEL_VERSION,
        duration: result.duration_seconds,
        fps: result.fps,
        resolution: result.resolution,
        frames: result.frames,
        processing_time: elapsed_ms(started),
    }))
}
