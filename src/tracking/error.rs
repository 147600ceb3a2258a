use thiserror::Error;

use crate::camera::ActuatorError;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("invalid sample: {field} = {value}")]
    InvalidSample { field: &'static str, value: f64 },
    #[error("actuator error: {0}")]
    Actuator(#[from] ActuatorError),
}
