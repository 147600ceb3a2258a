//! Great-circle bearing and ellipsoidal surface distance.
//!
//! Bearings use a spherical earth. Distances use Vincenty's inverse
//! formula on WGS-84 and fall back to a spherical haversine distance for
//! nearly antipodal points where the iteration does not converge.

// WGS-84 constants
pub const WGS84_A_M: f64 = 6_378_137.0;
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

const VINCENTY_MAX_ITERATIONS: usize = 200;
const VINCENTY_TOLERANCE: f64 = 1e-12;

/// Initial great-circle bearing from `from` to `to`, both `(lat_deg, lon_deg)`.
///
/// Returns degrees clockwise from true north in `[0, 360)`. Coincident
/// points have no defined bearing; they return `0.0`.
pub fn bearing_deg(from: (f64, f64), to: (f64, f64)) -> f64 {
    if from == to {
        return 0.0;
    }

    let lat1 = from.0.to_radians();
    let lat2 = to.0.to_radians();
    let dlon = (to.1 - from.1).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    if x == 0.0 && y == 0.0 {
        return 0.0;
    }

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Geodesic distance in meters between two `(lat_deg, lon_deg)` points,
/// ignoring altitude.
pub fn surface_distance_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    if from == to {
        return 0.0;
    }
    vincenty_inverse_m(from, to).unwrap_or_else(|| haversine_m(from, to))
}

fn vincenty_inverse_m(from: (f64, f64), to: (f64, f64)) -> Option<f64> {
    let a = WGS84_A_M;
    let f = WGS84_F;
    let b = (1.0 - f) * a;

    let l = (to.1 - from.1).to_radians();
    let u1 = ((1.0 - f) * from.0.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * to.0.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..VINCENTY_MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            return Some(0.0);
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial lines have cos_sq_alpha == 0
        let cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };
        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));

        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() < VINCENTY_TOLERANCE {
            let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
            let big_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma.powi(2))
                                * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));
            return Some(b * big_a * (sigma - delta_sigma));
        }
    }

    log::debug!(
        "vincenty did not converge between {:?} and {:?}, using haversine",
        from,
        to
    );
    None
}

fn haversine_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let lat1 = from.0.to_radians();
    let lat2 = to.0.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (to.1 - from.1).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coincident_points_are_zero_distance_and_zero_bearing() {
        let p = (47.3769, 8.5417);
        assert_eq!(surface_distance_m(p, p), 0.0);
        let bearing = bearing_deg(p, p);
        assert!(!bearing.is_nan());
        assert_eq!(bearing, 0.0);
    }

    #[test]
    fn cardinal_bearings() {
        let origin = (0.0, 0.0);
        assert!(bearing_deg(origin, (1.0, 0.0)).abs() < 1e-9);
        assert!((bearing_deg(origin, (0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing_deg(origin, (-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing_deg(origin, (0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn thousandth_degree_of_latitude_at_equator() {
        let d = surface_distance_m((0.0, 0.0), (0.001, 0.0));
        // WGS-84 meridian arc at the equator is ~110.574 m per 0.001 deg
        assert!((d - 110.574).abs() < 0.01, "distance = {}", d);
    }

    #[test]
    fn equatorial_distance_follows_semi_major_axis() {
        let d = surface_distance_m((0.0, 0.0), (0.0, 1.0));
        let expected = WGS84_A_M * 1f64.to_radians();
        assert!((d - expected).abs() < 0.01, "distance = {}", d);
    }

    #[test]
    fn known_long_baseline() {
        // Flinders Peak to Buninyong, the classic Vincenty test case
        let d = surface_distance_m(
            (-37.951_033_416_666_664, 144.424_867_888_888_9),
            (-37.652_821_138_888_89, 143.926_495_527_777_8),
        );
        assert!((d - 54_972.271).abs() < 0.05, "distance = {}", d);
    }

    #[test]
    fn nearly_antipodal_points_stay_finite() {
        let d = surface_distance_m((0.0, 0.0), (0.5, 179.7));
        assert!(d.is_finite());
        assert!(d > 19_900_000.0 && d < 20_050_000.0, "distance = {}", d);
    }
}
