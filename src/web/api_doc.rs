use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::mode::ModeBody;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::camera::status,
        super::api::camera::retries,
        super::api::mode::get_mode,
        super::api::mode::set_mode,
    ),
    components(
        schemas(
            ModeBody,
            ErrorResponse,
            crate::source::TrackingMode,
            crate::camera::CameraStatus,
            crate::camera::ActivationState,
            crate::camera::RecordingRetries,
            crate::camera::RetryStats,
            crate::tracking::ActuatorState,
            crate::tracking::AimSolution,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Drone Tracker API",
        description = "Camera status and tracking mode control",
        version = "0.1.0"
    ),
    tags(
        (name = "camera", description = "Recording and actuator state"),
        (name = "mode", description = "Tracking mode")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
