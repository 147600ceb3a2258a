use thiserror::Error;

use super::actuator::ActuatorError;
use crate::tracking::TrackingError;

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("tracking error: {0}")]
    Tracking(#[from] TrackingError),
    #[error("actuator error: {0}")]
    Actuator(#[from] ActuatorError),
    #[error("{0} aborted")]
    Aborted(&'static str),
}
