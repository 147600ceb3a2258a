mod activation;
mod actuator;
mod error;
mod retry;
mod shell;

pub use activation::{
    ActivationSettings, ActivationState, ActivationStateMachine, CameraStatus, Deactivation,
    DeactivationHandle,
};
pub use actuator::{ActuatorDriver, ActuatorError, NullActuator};
pub use error::ActivationError;
pub use retry::{RecordingRetries, RetryStats};
pub use shell::{ShellActuator, ShellCommands};
