use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Permission;
use crate::source::{FileMode, ModeSource, TrackingMode};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser, ModeHandle};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModeBody {
    pub mode: TrackingMode,
}

#[utoipa::path(
    get,
    path = "/api/mode",
    responses(
        (status = 200, description = "Current tracking mode", body = ModeBody),
        (status = 500, description = "Mode unavailable", body = ErrorResponse)
    ),
    tag = "mode"
)]
pub async fn get_mode(State(state): State<AppState>) -> ApiResult<Json<ModeBody>> {
    let mode = match state.mode {
        ModeHandle::Shared(shared) => shared.get(),
        ModeHandle::File(path) => {
            tokio::task::spawn_blocking(move || FileMode::new(path, 0).current())
                .await?
                .map_err(|e| ApiError::Internal(e.to_string()))?
        }
    };
    Ok(Json(ModeBody { mode }))
}

#[utoipa::path(
    post,
    path = "/api/mode",
    request_body = ModeBody,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Mode updated", body = ModeBody),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 500, description = "Mode file not writable", body = ErrorResponse)
    ),
    tag = "mode"
)]
pub async fn set_mode(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ModeBody>,
) -> ApiResult<Json<ModeBody>> {
    require_permission(&user, Permission::SetMode)?;
    log::info!("{} set tracking mode to {}", user.name, request.mode);

    match state.mode {
        ModeHandle::Shared(shared) => shared.set(request.mode),
        ModeHandle::File(path) => {
            let line = format!("{}\n", request.mode);
            tokio::task::spawn_blocking(move || std::fs::write(path, line)).await??;
        }
    }
    Ok(Json(request))
}
