//! Geodesic math and deterministic randomness for the Gossim simulator.
//!
//! Three concerns live here because they are used together by the ranging
//! pipeline: great-circle distance, the per-node seeded PRNG every random
//! draw in the simulation flows through, and the FTM measurement model with
//! its 2-D least-squares trilateration solver.

mod rng;
mod trilateration;

pub use rng::Xorshift32;
pub use trilateration::{trilaterate, trilaterate_with_cap, AnchorReading, TrilaterationError};

use rand_distr::{Distribution, Normal};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Standard deviation of the FTM ranging noise in meters.
///
/// Real 802.11mc FTM is good to roughly 1-2 m line of sight.
pub const FTM_SIGMA_M: f64 = 1.0;

/// Great-circle distance between two WGS84 coordinates, in meters.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// One noisy FTM distance measurement.
///
/// Adds zero-mean gaussian noise (sigma [`FTM_SIGMA_M`]) to the true
/// distance and clamps the result at zero. The noise is drawn from the
/// caller's generator so each node's copy of a measurement is independent
/// but reproducible.
pub fn ftm_measure(true_distance_m: f64, rng: &mut Xorshift32) -> f64 {
    let noise = Normal::new(0.0, FTM_SIGMA_M)
        .expect("constant sigma is valid")
        .sample(rng);
    (true_distance_m + noise).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_latitude() {
        // One degree of latitude is ~111.19 km on the mean sphere.
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.9).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_m(45.0, 9.0, 45.0, 9.0), 0.0);
    }

    #[test]
    fn test_haversine_symmetry() {
        let a = haversine_m(48.1, 11.5, 48.2, 11.7);
        let b = haversine_m(48.2, 11.7, 48.1, 11.5);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_ftm_measure_close_to_truth() {
        let mut rng = Xorshift32::new(1234);
        for _ in 0..100 {
            let m = ftm_measure(100.0, &mut rng);
            assert!((m - 100.0).abs() < 6.0 * FTM_SIGMA_M, "got {m}");
        }
    }

    #[test]
    fn test_ftm_measure_clamped_at_zero() {
        let mut rng = Xorshift32::new(99);
        for _ in 0..1000 {
            assert!(ftm_measure(0.0, &mut rng) >= 0.0);
        }
    }

    #[test]
    fn test_ftm_measure_deterministic_per_seed() {
        let mut a = Xorshift32::new(7);
        let mut b = Xorshift32::new(7);
        for _ in 0..32 {
            assert_eq!(ftm_measure(50.0, &mut a), ftm_measure(50.0, &mut b));
        }
    }
}
