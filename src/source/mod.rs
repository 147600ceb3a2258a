//! Collaborators that feed the control loop: where the target is, and
//! whether it should be tracked at all.

mod mode;
mod telemetry;

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::tracking::TargetSample;

pub use mode::{FileMode, SharedMode};
pub use telemetry::{JsonLinesSource, VerticalConvention};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrackingMode {
    #[default]
    Off,
    On,
    Auto,
}

impl FromStr for TrackingMode {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(TrackingMode::Off),
            "on" => Ok(TrackingMode::On),
            "auto" => Ok(TrackingMode::Auto),
            other => Err(SourceError::Malformed(format!("invalid mode: {}", other))),
        }
    }
}

/// Latest target position.
pub trait PositionSource {
    /// The most recent sample since the last poll, `None` if nothing new
    /// arrived, or `SourceError::Unavailable` once the source is gone.
    fn poll(&mut self) -> Result<Option<TargetSample>, SourceError>;
}

/// Desired tracking mode.
pub trait ModeSource {
    fn current(&mut self) -> Result<TrackingMode, SourceError>;

    /// Blocks until the mode differs from the last one seen, or `timeout`
    /// passes. Returns the new mode if it changed.
    fn wait_for_change(&mut self, timeout: Duration) -> Result<Option<TrackingMode>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!("on".parse::<TrackingMode>().unwrap(), TrackingMode::On);
        assert_eq!(" AUTO\n".parse::<TrackingMode>().unwrap(), TrackingMode::Auto);
        assert_eq!("off".parse::<TrackingMode>().unwrap(), TrackingMode::Off);
        assert!("standby".parse::<TrackingMode>().is_err());
        assert_eq!(TrackingMode::Auto.to_string(), "auto");
    }
}
