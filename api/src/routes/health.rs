//! Liveness and model status (/health)

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Utc};
use detector::{BackendStatus, WeightsState};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::constants::{MODEL_VERSION, SERVICE_NAME};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    model_loaded: bool,
    device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weights: Option<WeightsState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: DateTime<Utc>,
    version: &'static str,
}

/// GET /health - Report whether the backend is loaded, without loading it
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let mut response = HealthResponse {
        status: "not_loaded",
        service: SERVICE_NAME,
        model_loaded: false,
        device: state.device.clone(),
        model_type: None,
        weights: None,
        error: None,
        timestamp: Utc::now(),
        version: MODEL_VERSION,
    };

    let code = match state.selector.status() {
        BackendStatus::NotLoaded => StatusCode::OK,
        BackendStatus::Ready(info) => {
            response.status = "ready";
            response.model_loaded = true;
            response.device = info.device;
            response.model_type = Some(info.model_type);
            response.weights = Some(info.weights);
            StatusCode::OK
        }
        BackendStatus::Failed(message) => {
            response.status = "unhealthy";
            response.error = Some(message);
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (code, Json(response))
}
