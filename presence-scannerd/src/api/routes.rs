use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tokio::sync::watch;
use crate::scanner::ScannerHandle;
use shared::types::DeviceSummary;

#[derive(Clone)]
pub struct AppState {
    pub scanner: ScannerHandle,
    pub hash_rx: watch::Receiver<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/devices", get(get_devices))
        .route("/v1/devices/hash", get(get_hash))
        .route("/v1/devices/clear", post(clear_devices))
        .route("/v1/devices/reset-timeouts", post(reset_timeouts))
        .route("/v1/devices/:identity", get(get_device))
        .route("/v1/scan/start", post(start_scan))
        .route("/v1/scan/stop", post(stop_scan))
        .with_state(state)
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    tracing::error!("Scanner request failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceSummary>>, StatusCode> {
    state.scanner.devices().await.map(Json).map_err(internal_error)
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.hash_rx.borrow().clone()
}

async fn get_device(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<DeviceSummary>, StatusCode> {
    state
        .scanner
        .devices()
        .await
        .map_err(internal_error)?
        .into_iter()
        .find(|device| device.identity.as_str() == identity)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn start_scan(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.scanner.start().await.map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_scan(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.scanner.stop().await.map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_devices(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.scanner.clear_all_devices().await.map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_timeouts(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.scanner.reset_all_timeouts().await.map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}
