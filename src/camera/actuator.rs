use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::tracking::MoveCommand;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("absolute move failed: {0}")]
    Move(String),
    #[error("start recording failed (code {code}): {message}")]
    StartRecording { code: i32, message: String },
    #[error("stop recording failed: {0}")]
    StopRecording(String),
    #[error("failed to run actuator command: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Operations the pan/tilt/zoom camera must provide.
///
/// Calls are synchronous; timeouts are the driver's business. Any of them
/// may be called again after a failure.
pub trait ActuatorDriver: Send {
    fn absolute_move(&mut self, command: &MoveCommand) -> Result<(), ActuatorError>;

    /// Returns the identifier of the new recording.
    fn start_recording(
        &mut self,
        disk_name: &str,
        profile: Option<&str>,
    ) -> Result<String, ActuatorError>;

    fn stop_recording(&mut self, recording_id: &str) -> Result<(), ActuatorError>;
}

#[derive(Debug, Default)]
struct NullCalls {
    moves: Vec<MoveCommand>,
    started: Vec<String>,
    stopped: Vec<String>,
    start_failures: u32,
    stop_failures: u32,
    fail_moves: bool,
}

/// In-memory driver that never touches hardware. Clones share the same
/// call log so a caller can inspect what a boxed copy was asked to do.
#[derive(Debug, Clone, Default)]
pub struct NullActuator {
    calls: Arc<Mutex<NullCalls>>,
}

impl NullActuator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    /// The next `count` start-recording calls fail.
    pub fn fail_next_starts(&self, count: u32) {
        self.calls.lock().unwrap().start_failures = count;
    }

    #[cfg(test)]
    /// The next `count` stop-recording calls fail.
    pub fn fail_next_stops(&self, count: u32) {
        self.calls.lock().unwrap().stop_failures = count;
    }

    #[cfg(test)]
    pub fn fail_moves(&self, fail: bool) {
        self.calls.lock().unwrap().fail_moves = fail;
    }

    pub fn moves(&self) -> Vec<MoveCommand> {
        self.calls.lock().unwrap().moves.clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.calls.lock().unwrap().started.clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.calls.lock().unwrap().stopped.clone()
    }
}

impl ActuatorDriver for NullActuator {
    fn absolute_move(&mut self, command: &MoveCommand) -> Result<(), ActuatorError> {
        let mut calls = self.calls.lock().unwrap();
        if calls.fail_moves {
            return Err(ActuatorError::Move("null actuator configured to fail".into()));
        }
        log::debug!("null move to {:?}", command);
        calls.moves.push(*command);
        Ok(())
    }

    fn start_recording(
        &mut self,
        disk_name: &str,
        _profile: Option<&str>,
    ) -> Result<String, ActuatorError> {
        let mut calls = self.calls.lock().unwrap();
        if calls.start_failures > 0 {
            calls.start_failures -= 1;
            return Err(ActuatorError::StartRecording {
                code: 1,
                message: "null actuator configured to fail".into(),
            });
        }
        let id = format!("null-{}-{}", disk_name, uuid::Uuid::new_v4());
        log::info!("started recording {}", id);
        calls.started.push(id.clone());
        Ok(id)
    }

    fn stop_recording(&mut self, recording_id: &str) -> Result<(), ActuatorError> {
        let mut calls = self.calls.lock().unwrap();
        if calls.stop_failures > 0 {
            calls.stop_failures -= 1;
            return Err(ActuatorError::StopRecording(
                "null actuator configured to fail".into(),
            ));
        }
        log::info!("stopped recording {}", recording_id);
        calls.stopped.push(recording_id.to_string());
        Ok(())
    }
}
