// src/measurement.rs
//
// Pure geodesy between the drone and a surveyed reference point. No state,
// no I/O. All angle outputs are rounded to 3 decimal places so downstream
// comparisons across runs stay stable.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geodetic point used on either end of a measurement.
#[derive(Debug, Clone, Copy)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
}

/// Great-circle ground distance in meters (haversine).
pub fn ground_distance_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `from` to `to`, degrees clockwise from true north
/// in [0, 360).
pub fn bearing_deg(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Vertical angle from the reference point up to the drone, degrees.
/// Positive when the drone is above the reference. Approaches +/-90 as the
/// ground distance approaches zero with a height difference present.
pub fn vertical_angle_deg(drone: &GeoPoint, reference: &GeoPoint) -> f64 {
    let dh = drone.elevation_m - reference.elevation_m;
    let ground = ground_distance_m(drone, reference);
    round3(dh.atan2(ground).to_degrees())
}

/// Signed deviation of the bearing reference->drone from the runway
/// centerline heading, folded into [-90, +90] because the centerline is
/// bidirectional. 0 means the drone sits on the extended centerline.
pub fn horizontal_angle_deg(drone: &GeoPoint, reference: &GeoPoint, runway_heading_deg: f64) -> f64 {
    let bearing = bearing_deg(reference, drone);
    let mut dev = bearing - runway_heading_deg;

    // Normalize to (-180, 180]
    while dev > 180.0 {
        dev -= 360.0;
    }
    while dev <= -180.0 {
        dev += 360.0;
    }

    // Fold onto the bidirectional centerline
    if dev > 90.0 {
        dev -= 180.0;
    } else if dev < -90.0 {
        dev += 180.0;
    }

    round3(dev)
}

/// 3-D line-of-sight distance in meters.
pub fn direct_distance_m(drone: &GeoPoint, reference: &GeoPoint) -> f64 {
    let ground = ground_distance_m(drone, reference);
    let dh = drone.elevation_m - reference.elevation_m;
    (ground * ground + dh * dh).sqrt()
}

#[inline]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64, elev: f64) -> GeoPoint {
        GeoPoint {
            latitude: lat,
            longitude: lon,
            elevation_m: elev,
        }
    }

    #[test]
    fn test_ground_distance_known_pair() {
        // Sydney airport 16R PAPI area to a point ~1km north
        let a = point(-33.9461, 151.1772, 0.0);
        let b = point(-33.9371, 151.1772, 0.0);
        let d = ground_distance_m(&a, &b);
        assert!((d - 1001.0).abs() < 15.0, "got {}", d);
    }

    #[test]
    fn test_ground_distance_zero() {
        let a = point(47.3977, 8.5470, 432.0);
        assert!(ground_distance_m(&a, &a) < 1e-6);
    }

    #[test]
    fn test_vertical_angle_same_altitude() {
        let drone = point(-33.9371, 151.1772, 6.2);
        let reference = point(-33.9461, 151.1772, 6.2);
        assert_eq!(vertical_angle_deg(&drone, &reference), 0.0);
    }

    #[test]
    fn test_vertical_angle_sign() {
        let above = point(-33.9371, 151.1772, 60.0);
        let below = point(-33.9371, 151.1772, -60.0);
        let reference = point(-33.9461, 151.1772, 6.2);
        assert!(vertical_angle_deg(&above, &reference) > 0.0);
        assert!(vertical_angle_deg(&below, &reference) < 0.0);
    }

    #[test]
    fn test_vertical_angle_overhead_limit() {
        let reference = point(-33.9461, 151.1772, 0.0);
        let overhead = point(-33.9461, 151.1772, 120.0);
        let angle = vertical_angle_deg(&overhead, &reference);
        assert!((angle - 90.0).abs() < 1e-9, "got {}", angle);
    }

    #[test]
    fn test_bearing_cardinal() {
        let origin = point(0.0, 0.0, 0.0);
        let north = point(1.0, 0.0, 0.0);
        let east = point(0.0, 1.0, 0.0);
        assert!((bearing_deg(&origin, &north) - 0.0).abs() < 0.01);
        assert!((bearing_deg(&origin, &east) - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_horizontal_angle_on_centerline() {
        let reference = point(0.0, 0.0, 0.0);
        // Drone due north of the reference, runway heading 0
        let drone = point(0.01, 0.0, 30.0);
        assert_eq!(horizontal_angle_deg(&drone, &reference, 0.0), 0.0);
        // Centerline is bidirectional: drone due south is also on it
        let drone_south = point(-0.01, 0.0, 30.0);
        assert_eq!(horizontal_angle_deg(&drone_south, &reference, 0.0), 0.0);
    }

    #[test]
    fn test_horizontal_angle_antisymmetric() {
        let reference = point(0.0, 0.0, 0.0);
        let east_of_line = point(0.01, 0.002, 30.0);
        let west_of_line = point(0.01, -0.002, 30.0);
        let a = horizontal_angle_deg(&east_of_line, &reference, 0.0);
        let b = horizontal_angle_deg(&west_of_line, &reference, 0.0);
        assert!((a + b).abs() < 0.01, "expected antisymmetry, got {} and {}", a, b);
        assert!(a > 0.0);
    }

    #[test]
    fn test_horizontal_angle_folded_range() {
        let reference = point(0.0, 0.0, 0.0);
        for heading in [0.0, 45.0, 117.0, 264.5, 359.0] {
            for (dlat, dlon) in [(0.01, 0.003), (-0.01, 0.003), (0.004, -0.008)] {
                let drone = point(dlat, dlon, 30.0);
                let angle = horizontal_angle_deg(&drone, &reference, heading);
                assert!((-90.0..=90.0).contains(&angle), "angle {} out of fold", angle);
            }
        }
    }

    #[test]
    fn test_direct_distance_hypotenuse() {
        let reference = point(-33.9461, 151.1772, 0.0);
        let drone = point(-33.9371, 151.1772, 30.0);
        let ground = ground_distance_m(&drone, &reference);
        let direct = direct_distance_m(&drone, &reference);
        assert!((direct * direct - (ground * ground + 900.0)).abs() < 1.0);
        assert!(direct > ground);
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(3.14159265), 3.142);
        assert_eq!(round3(-0.0004), -0.0);
    }
}
