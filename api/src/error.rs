//! Error responses for route handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use detector::DetectorError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NoInputProvided(String),

    #[error("upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("could not decode image: {0}")]
    InvalidImage(String),

    #[error("{0}")]
    InvalidVideo(String),

    #[error("could not extract any frames from video")]
    NoFramesExtracted,

    #[error("model unavailable: {0}")]
    BackendInitFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NoInputProvided(_) => "NoInputProvided",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::InvalidImage(_) => "InvalidImage",
            AppError::InvalidVideo(_) => "InvalidVideo",
            AppError::NoFramesExtracted => "NoFramesExtracted",
            AppError::BackendInitFailure(_) => "BackendInitFailure",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoInputProvided(_)
            | AppError::InvalidImage(_)
            | AppError::InvalidVideo(_)
            | AppError::NoFramesExtracted => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::BackendInitFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DetectorError> for AppError {
    fn from(e: DetectorError) -> Self {
        match e {
            DetectorError::InvalidVideo(msg) => AppError::InvalidVideo(msg),
            DetectorError::NoFramesExtracted => AppError::NoFramesExtracted,
            DetectorError::BackendInit(msg) => AppError::BackendInitFailure(msg),
            DetectorError::Io(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{} ({}): {}", status, self.kind(), self);
        } else {
            log::warn!("{} ({}): {}", status, self.kind(), self);
        }

        let body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}

/// Extension trait for logging foreign errors and converting them to `AppError`
pub trait LogErr<T> {
    /// Log error with context and return `AppError::Internal`
    fn log_500(self, context: &str) -> Result<T, AppError>;

    /// Log error with context and map it with `f`
    fn log_map(self, context: &str, f: impl FnOnce(String) -> AppError) -> Result<T, AppError>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, AppError> {
        self.map_err(|e| {
            log::error!("{}: {}", context, e);
            AppError::Internal(format!("{}: {}", context, e))
        })
    }

    fn log_map(self, context: &str, f: impl FnOnce(String) -> AppError) -> Result<T, AppError> {
        self.map_err(|e| {
            log::debug!("{}: {}", context, e);
            f(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_errors_keep_their_kind() {
        let cases = [
            (DetectorError::InvalidVideo("x".into()), "InvalidVideo", 400),
            (DetectorError::NoFramesExtracted, "NoFramesExtracted", 400),
            (DetectorError::BackendInit("x".into()), "BackendInitFailure", 503),
        ];
        for (err, kind, status) in cases {
            let app: AppError = err.into();
            assert_eq!(app.kind(), kind);
            assert_eq!(app.status().as_u16(), status);
        }
    }

    #[test]
    fn oversized_upload_maps_to_413() {
        let err = AppError::PayloadTooLarge("length limit exceeded".into());
        assert_eq!(err.kind(), "PayloadTooLarge");
        assert_eq!(err.status().as_u16(), 413);
    }

    #[test]
    fn log_map_wraps_message() {
        let res: Result<(), &str> = Err("bad boundary");
        let err = res
            .log_map("multipart", AppError::NoInputProvided)
            .unwrap_err();
        assert!(matches!(err, AppError::NoInputProvided(ref m) if m == "bad boundary"));
    }
}
