use crate::camera::{ActuatorDriver, ActuatorError};

use super::error::TrackingError;
use super::lead::LeadPredictor;
use super::types::{wrap_degrees, ActuatorState, AimSolution, MoveCommand, TargetSample};
use super::zoom::{clamp_zoom_steps, ZoomModel};

/// Minimum changes that justify moving the camera, plus the mounting offset.
#[derive(Debug, Clone, Copy)]
pub struct MotionSettings {
    pub min_pan_tilt_step_deg: f64,
    pub min_zoom_step: i32,
    pub pan_offset_deg: f64,
}

/// Turns target samples into absolute moves, skipping moves that are too
/// small to matter so the pan/tilt head is not driven by jitter.
pub struct TrackingEngine {
    lead: LeadPredictor,
    zoom: ZoomModel,
    motion: MotionSettings,
    state: ActuatorState,
    last_solution: Option<AimSolution>,
    moves_sent: u64,
}

impl TrackingEngine {
    pub fn new(lead: LeadPredictor, zoom: ZoomModel, motion: MotionSettings) -> Self {
        Self {
            lead,
            zoom,
            motion,
            state: ActuatorState::default(),
            last_solution: None,
            moves_sent: 0,
        }
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn last_solution(&self) -> Option<AimSolution> {
        self.last_solution
    }

    pub fn moves_sent(&self) -> u64 {
        self.moves_sent
    }

    /// Computes the aim for a sample without touching any state.
    pub fn solve(&self, sample: &TargetSample) -> Result<AimSolution, TrackingError> {
        sample.validate()?;

        let lead = self.lead.predict(sample, self.state.pan_deg);
        let zoom = self
            .zoom
            .estimate(lead.horizontal_distance_m, lead.vertical_distance_m);

        let solution = AimSolution {
            pan_deg: lead.pan_deg,
            tilt_deg: lead.tilt_deg,
            horizontal_distance_m: lead.horizontal_distance_m,
            vertical_distance_m: lead.vertical_distance_m,
            distance_m: zoom.distance_m,
            zoom_step: clamp_zoom_steps(zoom.steps),
        };

        log::debug!(
            "aim (pan, tilt, horiz, vert, dist, zoom) {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {}",
            solution.pan_deg,
            solution.tilt_deg,
            solution.horizontal_distance_m,
            solution.vertical_distance_m,
            solution.distance_m,
            solution.zoom_step
        );

        Ok(solution)
    }

    pub fn is_significant(&self, solution: &AimSolution) -> bool {
        let pan_delta = wrap_degrees(solution.pan_deg - self.state.pan_deg).abs();
        let tilt_delta = (solution.tilt_deg - self.state.tilt_deg).abs();
        let zoom_delta = (solution.zoom_step - self.state.zoom_step).abs();

        pan_delta > self.motion.min_pan_tilt_step_deg
            || tilt_delta > self.motion.min_pan_tilt_step_deg
            || zoom_delta > self.motion.min_zoom_step
    }

    pub fn command_for(&self, solution: &AimSolution) -> MoveCommand {
        MoveCommand {
            pan_deg: wrap_degrees(solution.pan_deg + self.motion.pan_offset_deg),
            tilt_deg: solution.tilt_deg,
            zoom_step: solution.zoom_step,
        }
    }

    /// Solves for `sample` and moves the camera if the change is significant.
    ///
    /// An invalid sample leaves the previous solution in place. A failed move
    /// leaves the actuator state untouched; the next sample supersedes it.
    pub fn update(
        &mut self,
        sample: &TargetSample,
        driver: &mut dyn ActuatorDriver,
    ) -> Result<Option<MoveCommand>, TrackingError> {
        let solution = self.solve(sample)?;
        self.last_solution = Some(solution);

        if !self.is_significant(&solution) {
            log::debug!("step is not significant enough to move the camera");
            return Ok(None);
        }

        let command = self.command_for(&solution);
        log::info!(
            "moving to (p, t, z) {:.2}, {:.2}, {}",
            command.pan_deg,
            command.tilt_deg,
            command.zoom_step
        );
        driver.absolute_move(&command)?;

        self.state = ActuatorState::from(&solution);
        self.moves_sent += 1;
        Ok(Some(command))
    }

    /// Moves to a pan/tilt given in camera coordinates, holding the zoom.
    pub fn move_to_camera_position(
        &mut self,
        pan_deg: f64,
        tilt_deg: f64,
        driver: &mut dyn ActuatorDriver,
    ) -> Result<MoveCommand, ActuatorError> {
        let command = MoveCommand {
            pan_deg: wrap_degrees(pan_deg),
            tilt_deg,
            zoom_step: self.state.zoom_step,
        };
        driver.absolute_move(&command)?;

        self.state.pan_deg = wrap_degrees(command.pan_deg - self.motion.pan_offset_deg);
        self.state.tilt_deg = tilt_deg;
        self.moves_sent += 1;
        Ok(command)
    }

    /// Pan/tilt most recently sent, in camera coordinates.
    pub fn camera_position(&self) -> (f64, f64) {
        (
            wrap_degrees(self.state.pan_deg + self.motion.pan_offset_deg),
            self.state.tilt_deg,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::NullActuator;
    use crate::tracking::types::ObserverSite;

    fn engine(offset: f64) -> TrackingEngine {
        TrackingEngine::new(
            LeadPredictor::new(ObserverSite::new(0.0, 0.0, 0.0), 0.0),
            ZoomModel {
                target_size_m: [0.5, 0.5, 0.2],
                reference_width: 1.0,
                reference_distance_m: 10.0,
                max_zoom: 30.0,
                zoom_error: 1.0,
            },
            MotionSettings {
                min_pan_tilt_step_deg: 1.0,
                min_zoom_step: 5,
                pan_offset_deg: offset,
            },
        )
    }

    fn aim(pan: f64, tilt: f64, zoom: i32) -> AimSolution {
        AimSolution {
            pan_deg: pan,
            tilt_deg: tilt,
            horizontal_distance_m: 100.0,
            vertical_distance_m: 10.0,
            distance_m: 100.5,
            zoom_step: zoom,
        }
    }

    #[test]
    fn small_changes_are_not_significant() {
        let mut e = engine(0.0);
        e.state = ActuatorState {
            pan_deg: 10.0,
            tilt_deg: 5.0,
            zoom_step: 100,
        };
        assert!(!e.is_significant(&aim(10.5, 5.5, 102)));
        assert!(e.is_significant(&aim(12.0, 5.0, 100)));
        assert!(e.is_significant(&aim(10.0, 3.5, 100)));
        assert!(e.is_significant(&aim(10.0, 5.0, 106)));
    }

    #[test]
    fn pan_difference_wraps_across_the_seam() {
        let mut e = engine(0.0);
        e.state.pan_deg = 179.8;
        assert!(!e.is_significant(&aim(-179.9, 0.0, 0)));
    }

    #[test]
    fn update_sends_move_and_records_state() {
        let mut e = engine(15.0);
        let mut driver = NullActuator::new();
        let sample = TargetSample::stationary(0.001, 0.0, 50.0);

        let command = e.update(&sample, &mut driver).unwrap().unwrap();
        assert_eq!(driver.moves().len(), 1);
        assert!((command.pan_deg - 15.0).abs() < 1e-6);
        assert!(command.tilt_deg > 0.0);

        let solution = e.last_solution().unwrap();
        assert_eq!(e.state(), ActuatorState::from(&solution));
        assert!((solution.horizontal_distance_m - 110.57).abs() < 0.1);

        // Same sample again: nothing significant changed
        assert!(e.update(&sample, &mut driver).unwrap().is_none());
        assert_eq!(driver.moves().len(), 1);
        assert_eq!(e.moves_sent(), 1);
    }

    #[test]
    fn invalid_sample_keeps_previous_solution() {
        let mut e = engine(0.0);
        let mut driver = NullActuator::new();
        e.update(&TargetSample::stationary(0.001, 0.0, 50.0), &mut driver)
            .unwrap();
        let before = e.last_solution();

        let result = e.update(&TargetSample::stationary(f64::NAN, 0.0, 50.0), &mut driver);
        assert!(matches!(result, Err(TrackingError::InvalidSample { .. })));
        assert_eq!(e.last_solution(), before);
        assert_eq!(driver.moves().len(), 1);
    }

    #[test]
    fn failed_move_does_not_update_state() {
        let mut e = engine(0.0);
        let mut driver = NullActuator::new();
        driver.fail_moves(true);

        let result = e.update(&TargetSample::stationary(0.001, 0.0, 50.0), &mut driver);
        assert!(matches!(
            result,
            Err(TrackingError::Actuator(ActuatorError::Move(_)))
        ));
        assert_eq!(e.state(), ActuatorState::default());
        assert_eq!(e.moves_sent(), 0);
    }

    #[test]
    fn camera_position_round_trips_offset() {
        let mut e = engine(20.0);
        let mut driver = NullActuator::new();
        e.move_to_camera_position(-170.0, 3.0, &mut driver).unwrap();
        assert!((e.state().pan_deg - 170.0).abs() < 1e-9);
        let (pan, tilt) = e.camera_position();
        assert!((pan + 170.0).abs() < 1e-9);
        assert_eq!(tilt, 3.0);
    }
}
