use axum::{extract::State, Json};

use crate::camera::{CameraStatus, RecordingRetries};
use crate::web::auth::AppState;

#[utoipa::path(
    get,
    path = "/api/camera/status",
    responses(
        (status = 200, description = "Camera activation and actuator state", body = CameraStatus)
    ),
    tag = "camera"
)]
pub async fn status(State(state): State<AppState>) -> Json<CameraStatus> {
    Json(state.camera.status())
}

#[utoipa::path(
    get,
    path = "/api/camera/retries",
    responses(
        (status = 200, description = "Start/stop recording retry counters", body = RecordingRetries)
    ),
    tag = "camera"
)]
pub async fn retries(State(state): State<AppState>) -> Json<RecordingRetries> {
    Json(state.camera.retries())
}
