mod config;
mod constants;
mod error;
mod logging;
mod routes;
#[cfg(test)]
mod test_support;

use detector::BackendSelector;
use detector::backend::{device_label, select_device};
use std::sync::Arc;

use config::Config;

pub struct AppState {
    pub config: Config,
    /// Lazily built scoring backend shared by every request
    pub selector: BackendSelector,
    /// Device label reported by /health before the backend exists
    pub device: String,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init();

    let config = Config::from_env();
    log::info!(
        "Starting {} with model_type={} path={} (custom architecture {})",
        constants::SERVICE_NAME,
        config.model.model_type,
        config.model.model_path,
        config.model.custom_model_type
    );

    let state = Arc::new(AppState {
        device: device_label(&select_device()),
        selector: BackendSelector::new(),
        config,
    });

    // Warm the backend off the runtime so the first request does not pay for
    // the load. A failure here is retried by the next request.
    let warm = Arc::clone(&state);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = warm.selector.get_or_init(&warm.config.model) {
            log::warn!("Backend warm-up failed: {}", e);
        }
    });

    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));

    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.expect("Server failed");
}
