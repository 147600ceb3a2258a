use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::camera::{
    ActivationSettings, ActuatorDriver, NullActuator, ShellActuator, ShellCommands,
};
use crate::source::{TrackingMode, VerticalConvention};
use crate::tracking::{LeadPredictor, MotionSettings, ObserverSite, TrackingEngine, ZoomModel};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub observer: ObserverConfig,
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub activation: ActivationConfig,
    #[serde(default)]
    pub actuator: ActuatorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub mode: ModeConfig,
    pub web: Option<WebConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObserverConfig {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default)]
    pub altitude_m: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetSize {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceConfig {
    /// Screen width the target fills at `distance_m`.
    pub screen_width: f64,
    pub distance_m: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub lead_time_s: f64,
    pub target_size_m: TargetSize,
    pub reference: ReferenceConfig,
    pub max_zoom: f64,
    #[serde(default = "default_zoom_error")]
    pub zoom_error: f64,
    #[serde(default = "default_min_pan_tilt_step")]
    pub min_pan_tilt_step_deg: f64,
    #[serde(default = "default_min_zoom_step")]
    pub min_zoom_step: i32,
    #[serde(default)]
    pub pan_offset_deg: f64,
}

fn default_zoom_error() -> f64 {
    1.0
}

fn default_min_pan_tilt_step() -> f64 {
    1.0
}

fn default_min_zoom_step() -> i32 {
    5
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParkConfig {
    pub pan_deg: Option<f64>,
    pub tilt_deg: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivationConfig {
    #[serde(default)]
    pub park: ParkConfig,
    #[serde(
        default = "default_deactivation_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub deactivation_delay: Duration,
    #[serde(default = "default_disk_name")]
    pub disk_name: String,
    pub profile: Option<String>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub retry_interval: Duration,
    /// In auto mode, track only above this height relative to the observer.
    #[serde(default)]
    pub auto_min_relative_altitude_m: f64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            park: ParkConfig::default(),
            deactivation_delay: default_deactivation_delay(),
            disk_name: default_disk_name(),
            profile: None,
            retry_interval: Duration::ZERO,
            auto_min_relative_altitude_m: 0.0,
        }
    }
}

fn default_deactivation_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_disk_name() -> String {
    "SD_DISK".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActuatorConfig {
    #[default]
    Null,
    Shell(ShellCommands),
}

impl ActuatorConfig {
    pub fn build(&self) -> Box<dyn ActuatorDriver> {
        match self {
            ActuatorConfig::Null => Box::new(NullActuator::new()),
            ActuatorConfig::Shell(commands) => Box::new(ShellActuator::new(commands.clone())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// File to read JSON lines from, `-` for stdin.
    #[serde(default = "default_telemetry_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub vertical_velocity: VerticalConvention,
    #[serde(
        default = "default_sample_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub sample_timeout: Duration,
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            path: default_telemetry_path(),
            vertical_velocity: VerticalConvention::default(),
            sample_timeout: default_sample_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_telemetry_path() -> PathBuf {
    PathBuf::from("-")
}

fn default_sample_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeConfig {
    #[serde(default)]
    pub initial: TrackingMode,
    /// Read the mode from this file instead of keeping it in memory.
    pub file: Option<PathBuf>,
    #[serde(default = "default_mode_poll_hz")]
    pub poll_hz: u32,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            initial: TrackingMode::default(),
            file: None,
            poll_hz: default_mode_poll_hz(),
        }
    }
}

fn default_mode_poll_hz() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SetMode,
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let o = &self.observer;
        if !o.latitude_deg.is_finite() || !(-90.0..=90.0).contains(&o.latitude_deg) {
            return Err(invalid("observer.latitude_deg", "must be within [-90, 90]"));
        }
        if !o.longitude_deg.is_finite() || !(-180.0..=180.0).contains(&o.longitude_deg) {
            return Err(invalid("observer.longitude_deg", "must be within [-180, 180]"));
        }
        if !o.altitude_m.is_finite() {
            return Err(invalid("observer.altitude_m", "must be finite"));
        }

        let t = &self.tracking;
        if !(t.lead_time_s.is_finite() && t.lead_time_s >= 0.0) {
            return Err(invalid("tracking.lead_time_s", "must be >= 0"));
        }
        let size = &t.target_size_m;
        for (field, value) in [
            ("tracking.target_size_m.x", size.x),
            ("tracking.target_size_m.y", size.y),
            ("tracking.target_size_m.z", size.z),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, "must be >= 0"));
            }
        }
        if size.x.max(size.y).max(size.z) <= 0.0 {
            return Err(invalid("tracking.target_size_m", "largest dimension must be > 0"));
        }
        if !(t.reference.screen_width.is_finite() && t.reference.screen_width > 0.0) {
            return Err(invalid("tracking.reference.screen_width", "must be > 0"));
        }
        if !(t.reference.distance_m.is_finite() && t.reference.distance_m > 0.0) {
            return Err(invalid("tracking.reference.distance_m", "must be > 0"));
        }
        if !(t.max_zoom.is_finite() && t.max_zoom > 1.0) {
            return Err(invalid("tracking.max_zoom", "must be > 1"));
        }
        if !(t.zoom_error.is_finite() && t.zoom_error > 0.0) {
            return Err(invalid("tracking.zoom_error", "must be > 0"));
        }
        if !(t.min_pan_tilt_step_deg.is_finite() && t.min_pan_tilt_step_deg >= 0.0) {
            return Err(invalid("tracking.min_pan_tilt_step_deg", "must be >= 0"));
        }
        if t.min_zoom_step < 0 {
            return Err(invalid("tracking.min_zoom_step", "must be >= 0"));
        }
        if !t.pan_offset_deg.is_finite() {
            return Err(invalid("tracking.pan_offset_deg", "must be finite"));
        }

        let park = &self.activation.park;
        if park.pan_deg.is_some_and(|p| !p.is_finite()) {
            return Err(invalid("activation.park.pan_deg", "must be finite"));
        }
        if park.tilt_deg.is_some_and(|t| !(-90.0..=90.0).contains(&t)) {
            return Err(invalid("activation.park.tilt_deg", "must be within [-90, 90]"));
        }
        if self.activation.disk_name.trim().is_empty() {
            return Err(invalid("activation.disk_name", "must not be empty"));
        }

        if let ActuatorConfig::Shell(commands) = &self.actuator {
            for (field, cmd) in [
                ("actuator.move_cmd", &commands.move_cmd),
                ("actuator.start_recording_cmd", &commands.start_recording_cmd),
                ("actuator.stop_recording_cmd", &commands.stop_recording_cmd),
            ] {
                if cmd.trim().is_empty() {
                    return Err(invalid(field, "must not be empty"));
                }
            }
        }

        if self.telemetry.poll_interval.is_zero() {
            return Err(invalid("telemetry.poll_interval", "must be > 0"));
        }

        Ok(())
    }

    pub fn observer_site(&self) -> ObserverSite {
        ObserverSite::new(
            self.observer.latitude_deg,
            self.observer.longitude_deg,
            self.observer.altitude_m,
        )
    }

    pub fn tracking_engine(&self) -> TrackingEngine {
        let t = &self.tracking;
        TrackingEngine::new(
            LeadPredictor::new(self.observer_site(), t.lead_time_s),
            ZoomModel {
                target_size_m: [t.target_size_m.x, t.target_size_m.y, t.target_size_m.z],
                reference_width: t.reference.screen_width,
                reference_distance_m: t.reference.distance_m,
                max_zoom: t.max_zoom,
                zoom_error: t.zoom_error,
            },
            MotionSettings {
                min_pan_tilt_step_deg: t.min_pan_tilt_step_deg,
                min_zoom_step: t.min_zoom_step,
                pan_offset_deg: t.pan_offset_deg,
            },
        )
    }

    pub fn activation_settings(&self) -> ActivationSettings {
        let a = &self.activation;
        ActivationSettings {
            disk_name: a.disk_name.clone(),
            profile: a.profile.clone(),
            park_pan_deg: a.park.pan_deg,
            park_tilt_deg: a.park.tilt_deg,
            retry_interval: a.retry_interval,
        }
    }
}
