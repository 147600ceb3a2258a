use std::process::{Command as StdCommand, Output, Stdio};

use serde::Deserialize;

use super::actuator::{ActuatorDriver, ActuatorError};
use crate::tracking::MoveCommand;

/// Command templates for a camera driven through external programs.
///
/// Placeholders: `{pan}`, `{tilt}`, `{zoom}` for moves, `{disk}` and
/// `{profile}` for starting a recording, `{recording_id}` for stopping one.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ShellCommands {
    pub move_cmd: String,
    pub start_recording_cmd: String,
    pub stop_recording_cmd: String,
}

/// Drives the camera by running `sh -c` commands. Starting a recording
/// must print the recording identifier on stdout.
pub struct ShellActuator {
    commands: ShellCommands,
}

impl ShellActuator {
    pub fn new(commands: ShellCommands) -> Self {
        Self { commands }
    }
}

fn run(cmd: &str) -> Result<Output, ActuatorError> {
    log::debug!("running actuator command: {}", cmd);
    let output = StdCommand::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .output()?;
    Ok(output)
}

/// Single-quotes a value for `sh`, so text from config or from the device
/// is never interpreted by the shell.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exit status {}", output.status)
    } else {
        stderr
    }
}

impl ActuatorDriver for ShellActuator {
    fn absolute_move(&mut self, command: &MoveCommand) -> Result<(), ActuatorError> {
        let cmd = self
            .commands
            .move_cmd
            .replace("{pan}", &format!("{:.2}", command.pan_deg))
            .replace("{tilt}", &format!("{:.2}", command.tilt_deg))
            .replace("{zoom}", &command.zoom_step.to_string());
        let output = run(&cmd)?;
        if !output.status.success() {
            return Err(ActuatorError::Move(failure_message(&output)));
        }
        Ok(())
    }

    fn start_recording(
        &mut self,
        disk_name: &str,
        profile: Option<&str>,
    ) -> Result<String, ActuatorError> {
        let cmd = self
            .commands
            .start_recording_cmd
            .replace("{disk}", &quote(disk_name))
            .replace("{profile}", &quote(profile.unwrap_or("")));
        let output = run(&cmd)?;
        if !output.status.success() {
            return Err(ActuatorError::StartRecording {
                code: output.status.code().unwrap_or(-1),
                message: failure_message(&output),
            });
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(ActuatorError::StartRecording {
                code: 0,
                message: "no recording id on stdout".into(),
            });
        }
        Ok(id)
    }

    fn stop_recording(&mut self, recording_id: &str) -> Result<(), ActuatorError> {
        let cmd = self
            .commands
            .stop_recording_cmd
            .replace("{recording_id}", &quote(recording_id));
        let output = run(&cmd)?;
        if !output.status.success() {
            return Err(ActuatorError::StopRecording(failure_message(&output)));
        }
        Ok(())
    }
}
