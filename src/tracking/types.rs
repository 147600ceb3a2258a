use serde::Serialize;

use super::error::TrackingError;

/// Fixed camera location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverSite {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

impl ObserverSite {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    pub fn lat_lon(&self) -> (f64, f64) {
        (self.latitude_deg, self.longitude_deg)
    }
}

/// Target velocity in the local east/north/up frame, m/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, utoipa::ToSchema)]
pub struct Velocity {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

/// One telemetry fix of the tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, utoipa::ToSchema)]
pub struct TargetSample {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
    pub velocity: Velocity,
}

impl TargetSample {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64, velocity: Velocity) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
            velocity,
        }
    }

    #[cfg(test)]
    pub fn stationary(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self::new(latitude_deg, longitude_deg, altitude_m, Velocity::default())
    }

    pub fn lat_lon(&self) -> (f64, f64) {
        (self.latitude_deg, self.longitude_deg)
    }

    /// Rejects non-finite values and coordinates outside the geodetic range.
    pub fn validate(&self) -> Result<(), TrackingError> {
        let fields = [
            ("latitude", self.latitude_deg),
            ("longitude", self.longitude_deg),
            ("altitude", self.altitude_m),
            ("velocity.east", self.velocity.east),
            ("velocity.north", self.velocity.north),
            ("velocity.up", self.velocity.up),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(TrackingError::InvalidSample { field, value });
            }
        }
        if !(-90.0..=90.0).contains(&self.latitude_deg) {
            return Err(TrackingError::InvalidSample {
                field: "latitude",
                value: self.latitude_deg,
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude_deg) {
            return Err(TrackingError::InvalidSample {
                field: "longitude",
                value: self.longitude_deg,
            });
        }
        Ok(())
    }
}

/// Where the camera should point for one sample. Always replaced as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, utoipa::ToSchema)]
pub struct AimSolution {
    pub pan_deg: f64,
    pub tilt_deg: f64,
    pub horizontal_distance_m: f64,
    pub vertical_distance_m: f64,
    pub distance_m: f64,
    pub zoom_step: i32,
}

/// Last pan/tilt/zoom actually sent to the actuator, in the aim frame
/// (mounting offset not applied).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ActuatorState {
    pub pan_deg: f64,
    pub tilt_deg: f64,
    pub zoom_step: i32,
}

impl From<&AimSolution> for ActuatorState {
    fn from(aim: &AimSolution) -> Self {
        Self {
            pan_deg: aim.pan_deg,
            tilt_deg: aim.tilt_deg,
            zoom_step: aim.zoom_step,
        }
    }
}

/// Absolute move in camera coordinates, as handed to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, utoipa::ToSchema)]
pub struct MoveCommand {
    pub pan_deg: f64,
    pub tilt_deg: f64,
    pub zoom_step: i32,
}

/// Wraps an angle into `(-180, 180]`.
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_finite_sample() {
        let sample = TargetSample::stationary(f64::NAN, 0.0, 10.0);
        assert!(matches!(
            sample.validate(),
            Err(TrackingError::InvalidSample {
                field: "latitude",
                ..
            })
        ));

        let mut sample = TargetSample::stationary(1.0, 2.0, 10.0);
        sample.velocity.up = f64::INFINITY;
        assert!(sample.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(TargetSample::stationary(91.0, 0.0, 0.0).validate().is_err());
        assert!(TargetSample::stationary(0.0, -180.5, 0.0).validate().is_err());
        assert!(TargetSample::stationary(-90.0, 180.0, -20.0).validate().is_ok());
    }

    #[test]
    fn wraps_into_signed_half_turn() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
    }
}
