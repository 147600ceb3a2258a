use crate::geodesy::{bearing_deg, surface_distance_m};

use super::types::{ObserverSite, TargetSample};

/// Pointing angles and distances after velocity lead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeadSolution {
    pub pan_deg: f64,
    pub tilt_deg: f64,
    pub horizontal_distance_m: f64,
    pub vertical_distance_m: f64,
}

/// Extrapolates the target along its velocity by a fixed lead time so the
/// camera arrives where the target will be, not where it was.
#[derive(Debug, Clone, Copy)]
pub struct LeadPredictor {
    observer: ObserverSite,
    lead_time_s: f64,
}

impl LeadPredictor {
    pub fn new(observer: ObserverSite, lead_time_s: f64) -> Self {
        Self {
            observer,
            lead_time_s,
        }
    }

    /// `fallback_pan_deg` is returned as the pan when the leaded target is
    /// straight above or below the observer, where pan is undefined.
    pub fn predict(&self, sample: &TargetSample, fallback_pan_deg: f64) -> LeadSolution {
        let bearing = bearing_deg(self.observer.lat_lon(), sample.lat_lon()).to_radians();
        let dist_h = surface_distance_m(self.observer.lat_lon(), sample.lat_lon());
        let dist_v = sample.altitude_m - self.observer.altitude_m;
        let tilt = dist_v.atan2(dist_h);

        // Local east/up/north aim vector
        let mut x = bearing.sin() * dist_h;
        let mut y = dist_v;
        let mut z = bearing.cos() * dist_h;

        log::debug!(
            "pre-lead: pan {:.3} tilt {:.3} dist_xz {:.2} x {:.2} y {:.2} z {:.2}",
            bearing.to_degrees(),
            tilt.to_degrees(),
            dist_h,
            x,
            y,
            z
        );

        x += self.lead_time_s * sample.velocity.east;
        y += self.lead_time_s * sample.velocity.up;
        z += self.lead_time_s * sample.velocity.north;

        let dist_xz = x.hypot(z);
        let range = dist_xz.hypot(y);

        let pan_deg = if dist_xz == 0.0 {
            fallback_pan_deg
        } else {
            x.atan2(z).to_degrees()
        };
        let tilt_deg = if range == 0.0 {
            0.0
        } else {
            (y / range).clamp(-1.0, 1.0).asin().to_degrees()
        };

        log::debug!(
            "lead {}s: pan {:.3} tilt {:.3} dist_xz {:.2} x {:.2} y {:.2} z {:.2}",
            self.lead_time_s,
            pan_deg,
            tilt_deg,
            dist_xz,
            x,
            y,
            z
        );

        LeadSolution {
            pan_deg,
            tilt_deg,
            horizontal_distance_m: dist_xz,
            vertical_distance_m: y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::types::Velocity;

    fn origin() -> ObserverSite {
        ObserverSite::new(0.0, 0.0, 0.0)
    }

    #[test]
    fn due_north_level_target() {
        let sample = TargetSample::stationary(0.01, 0.0, 0.0);
        let lead = LeadPredictor::new(origin(), 0.0).predict(&sample, 0.0);
        assert!(lead.pan_deg.abs() < 1e-6, "pan = {}", lead.pan_deg);
        assert!(lead.tilt_deg.abs() < 1e-6, "tilt = {}", lead.tilt_deg);
        assert!(lead.vertical_distance_m.abs() < 1e-9);
    }

    #[test]
    fn due_east_and_west_keep_their_quadrant() {
        let predictor = LeadPredictor::new(origin(), 0.0);
        let east = predictor.predict(&TargetSample::stationary(0.0, 0.01, 0.0), 0.0);
        assert!((east.pan_deg - 90.0).abs() < 1e-6, "pan = {}", east.pan_deg);

        let west = predictor.predict(&TargetSample::stationary(0.0, -0.01, 0.0), 0.0);
        assert!((west.pan_deg + 90.0).abs() < 1e-6, "pan = {}", west.pan_deg);

        let south_west = predictor.predict(&TargetSample::stationary(-0.01, -0.01, 0.0), 0.0);
        assert!(south_west.pan_deg < -90.0 && south_west.pan_deg > -180.0);
    }

    #[test]
    fn zero_velocity_lead_matches_zero_lead_time() {
        let sample = TargetSample::stationary(0.0021, -0.0013, 42.0);
        let with_lead = LeadPredictor::new(origin(), 3.5).predict(&sample, 0.0);
        let without = LeadPredictor::new(origin(), 0.0).predict(&sample, 0.0);
        assert_eq!(with_lead, without);
    }

    #[test]
    fn lead_moves_aim_along_velocity() {
        // 100 m north, moving east at 10 m/s with a 10 s lead: aim at (100 E, 100 N)
        let north_100m = 100.0 / 110_574.0;
        let sample = TargetSample::new(
            north_100m,
            0.0,
            0.0,
            Velocity {
                east: 10.0,
                north: 0.0,
                up: 0.0,
            },
        );
        let lead = LeadPredictor::new(origin(), 10.0).predict(&sample, 0.0);
        assert!((lead.pan_deg - 45.0).abs() < 0.1, "pan = {}", lead.pan_deg);
        assert!((lead.horizontal_distance_m - 141.42).abs() < 0.5);
    }

    #[test]
    fn climbing_target_raises_tilt() {
        let sample = TargetSample::new(
            0.001,
            0.0,
            50.0,
            Velocity {
                east: 0.0,
                north: 0.0,
                up: 5.0,
            },
        );
        let still = LeadPredictor::new(origin(), 0.0).predict(&sample, 0.0);
        let led = LeadPredictor::new(origin(), 2.0).predict(&sample, 0.0);
        assert!((led.vertical_distance_m - 60.0).abs() < 1e-9);
        assert!(led.tilt_deg > still.tilt_deg);
    }

    #[test]
    fn overhead_target_keeps_fallback_pan() {
        let sample = TargetSample::stationary(0.0, 0.0, 120.0);
        let lead = LeadPredictor::new(origin(), 0.0).predict(&sample, 37.5);
        assert_eq!(lead.pan_deg, 37.5);
        assert!((lead.tilt_deg - 90.0).abs() < 1e-9);
        assert_eq!(lead.horizontal_distance_m, 0.0);
    }

    #[test]
    fn target_at_observer_is_level() {
        let sample = TargetSample::stationary(0.0, 0.0, 0.0);
        let lead = LeadPredictor::new(origin(), 0.0).predict(&sample, 12.0);
        assert_eq!(lead.pan_deg, 12.0);
        assert_eq!(lead.tilt_deg, 0.0);
    }

    #[test]
    fn extreme_altitude_is_straight_up() {
        let predictor = LeadPredictor::new(ObserverSite::new(0.0, 0.0, 0.0), 0.0);
        let lead = predictor.predict(&TargetSample::stationary(0.001, 0.0, 1e200), 0.0);
        assert!(lead.tilt_deg.is_finite());
        assert!((lead.tilt_deg - 90.0).abs() < 1e-6, "tilt = {}", lead.tilt_deg);
    }
}
