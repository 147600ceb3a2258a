/// Upper bound of the actuator's zoom step range (the lower bound is 0).
pub const ZOOM_STEP_MAX: i32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomEstimate {
    pub distance_m: f64,
    pub raw_zoom: f64,
    /// Unclamped actuator steps.
    pub steps: f64,
}

/// Linear zoom model: the zoom needed to keep the target a constant size
/// on screen grows proportionally with distance.
#[derive(Debug, Clone, Copy)]
pub struct ZoomModel {
    pub target_size_m: [f64; 3],
    pub reference_width: f64,
    pub reference_distance_m: f64,
    pub max_zoom: f64,
    pub zoom_error: f64,
}

impl ZoomModel {
    pub fn max_dimension_m(&self) -> f64 {
        self.target_size_m.iter().copied().fold(f64::MIN, f64::max)
    }

    pub fn raw_zoom(&self, distance_m: f64) -> f64 {
        distance_m * self.reference_width / (self.reference_distance_m * self.max_dimension_m())
    }

    pub fn estimate(&self, horizontal_distance_m: f64, vertical_distance_m: f64) -> ZoomEstimate {
        let distance_m = horizontal_distance_m.hypot(vertical_distance_m);
        let raw_zoom = self.raw_zoom(distance_m);
        let steps = ((raw_zoom - 1.0) / (self.max_zoom - 1.0) * f64::from(ZOOM_STEP_MAX)).round();
        ZoomEstimate {
            distance_m,
            raw_zoom,
            steps: steps / self.zoom_error,
        }
    }
}

/// Rounds and clamps a step estimate into the actuator's range.
pub fn clamp_zoom_steps(steps: f64) -> i32 {
    if steps.is_nan() {
        return 0;
    }
    steps.round().clamp(0.0, f64::from(ZOOM_STEP_MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ZoomModel {
        ZoomModel {
            target_size_m: [0.5, 0.3, 0.4],
            reference_width: 1.0,
            reference_distance_m: 10.0,
            max_zoom: 30.0,
            zoom_error: 1.0,
        }
    }

    #[test]
    fn raw_zoom_is_linear_in_distance() {
        let m = model();
        let near = m.estimate(60.0, 80.0);
        let far = m.estimate(120.0, 160.0);
        assert!((near.distance_m - 100.0).abs() < 1e-9);
        assert!((far.raw_zoom - 2.0 * near.raw_zoom).abs() < 1e-9);
    }

    #[test]
    fn uses_largest_target_dimension() {
        assert_eq!(model().max_dimension_m(), 0.5);
        // 100 m at 10 m reference for a 0.5 m target
        assert!((model().raw_zoom(100.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn normalizes_to_step_range() {
        let m = model();
        // raw zoom == max zoom maps to the top of the range
        let top = m.estimate(150.0, 0.0);
        assert!((top.raw_zoom - 30.0).abs() < 1e-9);
        assert_eq!(top.steps, 9999.0);
        // raw zoom 1 maps to the bottom
        assert_eq!(m.estimate(5.0, 0.0).steps, 0.0);
    }

    #[test]
    fn zoom_error_scales_steps_down() {
        let mut m = model();
        m.zoom_error = 2.0;
        assert_eq!(m.estimate(150.0, 0.0).steps, 4999.5);
    }

    #[test]
    fn clamped_steps_stay_in_range() {
        let m = model();
        for distance in [0.0, 0.5, 5.0, 50.0, 150.0, 1_000.0, 1e9] {
            let steps = clamp_zoom_steps(m.estimate(distance, 0.0).steps);
            assert!((0..=ZOOM_STEP_MAX).contains(&steps), "steps = {}", steps);
        }
        assert_eq!(clamp_zoom_steps(f64::NAN), 0);
        assert_eq!(clamp_zoom_steps(-12.0), 0);
        assert_eq!(clamp_zoom_steps(12_000.0), ZOOM_STEP_MAX);
    }
}
