//! Request builders and a stub backend for route tests

use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    response::Response,
};
use detector::{
    BackendInfo, BackendSelector, Distribution, ScoringBackend, ScoringError, WeightsState,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;

use crate::AppState;
use crate::config::Config;

const BOUNDARY: &str = "----detector-test-boundary";

pub struct StubBackend {
    dist: Distribution,
    info: BackendInfo,
}

impl StubBackend {
    pub fn new(real: f32, fake: f32) -> Self {
        Self {
            dist: Distribution::new(real, fake),
            info: BackendInfo {
                model_name: "stub".to_string(),
                model_type: "huggingface".to_string(),
                architecture: "vit".to_string(),
                device: "cpu".to_string(),
                weights: WeightsState::Pretrained,
            },
        }
    }

    pub fn untrained() -> Self {
        let mut stub = Self::new(0.5, 0.5);
        stub.info.model_type = "custom_trained".to_string();
        stub.info.weights = WeightsState::Untrained;
        stub
    }
}

impl ScoringBackend for StubBackend {
    fn predict(&self, _image: &DynamicImage) -> Result<Distribution, ScoringError> {
        Ok(self.dist)
    }

    fn info(&self) -> &BackendInfo {
        &self.info
    }
}

pub fn state_with(selector: BackendSelector) -> Arc<AppState> {
    Arc::new(AppState {
        config: Config::default(),
        selector,
        device: "cpu".to_string(),
    })
}

pub fn red_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 0, 0])));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

/// POST `uri` with a multipart body of `(name, filename, content)` parts.
pub fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, Vec<u8>)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
