//! 2-D least-squares trilateration.
//!
//! Solves for a position from at least three (position, distance) pairs.
//! The spherical coordinates are projected onto a local tangent plane at
//! the first anchor, the squared-distance equations are linearised against
//! that anchor, and the resulting overdetermined 2-D system is solved via
//! its normal equations (Cramer's rule on the 2x2 normal matrix).

use crate::{haversine_m, EARTH_RADIUS_M};
use thiserror::Error;

/// Default cap on the RMS residual of an accepted solution, in meters.
///
/// A residual above this means the distances are mutually inconsistent
/// (heavy noise or a lying peer) and the fix is rejected.
pub const DEFAULT_RESIDUAL_CAP_M: f64 = 25.0;

/// Determinant threshold below which the normal matrix is treated as
/// singular (co-linear anchors).
const SINGULAR_EPS: f64 = 1e-6;

/// One ranging input: a surveyed position and a measured distance to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorReading {
    pub lat: f64,
    pub lng: f64,
    pub distance_m: f64,
}

/// Why a trilateration attempt produced no fix.
#[derive(Debug, Error, PartialEq)]
pub enum TrilaterationError {
    #[error("need at least 3 anchors, got {0}")]
    NotEnoughAnchors(usize),

    #[error("anchors are co-linear, normal matrix is singular")]
    Singular,

    #[error("solution residual {residual_m:.1} m exceeds cap {cap_m:.1} m")]
    ResidualTooLarge { residual_m: f64, cap_m: f64 },
}

/// Trilaterate with the default residual cap.
pub fn trilaterate(anchors: &[AnchorReading]) -> Result<(f64, f64), TrilaterationError> {
    trilaterate_with_cap(anchors, DEFAULT_RESIDUAL_CAP_M)
}

/// Trilaterate with an explicit residual cap.
///
/// Returns the estimated `(lat, lng)` or the reason no fix was produced.
pub fn trilaterate_with_cap(
    anchors: &[AnchorReading],
    residual_cap_m: f64,
) -> Result<(f64, f64), TrilaterationError> {
    if anchors.len() < 3 {
        return Err(TrilaterationError::NotEnoughAnchors(anchors.len()));
    }

    let origin = anchors[0];
    let cos_lat0 = origin.lat.to_radians().cos();

    // Local tangent-plane coordinates in meters, first anchor at the origin.
    let to_plane = |a: &AnchorReading| {
        let x = (a.lng - origin.lng).to_radians() * EARTH_RADIUS_M * cos_lat0;
        let y = (a.lat - origin.lat).to_radians() * EARTH_RADIUS_M;
        (x, y)
    };

    // Subtracting the first anchor's squared-distance equation from each of
    // the others leaves a linear system A p = b with
    //   A_i = 2 * (p_i - p_0),   b_i = d_0^2 - d_i^2 + |p_i|^2
    // (p_0 is the plane origin, so |p_0|^2 vanishes).
    let d0 = origin.distance_m;
    let mut ata = [[0.0f64; 2]; 2];
    let mut atb = [0.0f64; 2];
    for a in &anchors[1..] {
        let (xi, yi) = to_plane(a);
        let ai = [2.0 * xi, 2.0 * yi];
        let bi = d0 * d0 - a.distance_m * a.distance_m + xi * xi + yi * yi;

        ata[0][0] += ai[0] * ai[0];
        ata[0][1] += ai[0] * ai[1];
        ata[1][0] += ai[1] * ai[0];
        ata[1][1] += ai[1] * ai[1];
        atb[0] += ai[0] * bi;
        atb[1] += ai[1] * bi;
    }

    let det = ata[0][0] * ata[1][1] - ata[0][1] * ata[1][0];
    if det.abs() < SINGULAR_EPS {
        return Err(TrilaterationError::Singular);
    }
    let x = (ata[1][1] * atb[0] - ata[0][1] * atb[1]) / det;
    let y = (ata[0][0] * atb[1] - ata[1][0] * atb[0]) / det;

    let lat = origin.lat + (y / EARTH_RADIUS_M).to_degrees();
    let lng = origin.lng + (x / (EARTH_RADIUS_M * cos_lat0)).to_degrees();

    // RMS of the range residuals at the solved point.
    let mut sum_sq = 0.0;
    for a in anchors {
        let r = haversine_m(lat, lng, a.lat, a.lng) - a.distance_m;
        sum_sq += r * r;
    }
    let residual_m = (sum_sq / anchors.len() as f64).sqrt();
    if residual_m > residual_cap_m {
        return Err(TrilaterationError::ResidualTooLarge {
            residual_m,
            cap_m: residual_cap_m,
        });
    }

    Ok((lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(lat: f64, lng: f64, to_lat: f64, to_lng: f64) -> AnchorReading {
        AnchorReading {
            lat,
            lng,
            distance_m: haversine_m(lat, lng, to_lat, to_lng),
        }
    }

    #[test]
    fn test_exact_fix_from_three_anchors() {
        let truth = (0.0005, 0.0005);
        let anchors = [
            reading(0.0, 0.0, truth.0, truth.1),
            reading(0.0, 0.001, truth.0, truth.1),
            reading(0.001, 0.0, truth.0, truth.1),
        ];
        let (lat, lng) = trilaterate(&anchors).unwrap();
        assert!(haversine_m(lat, lng, truth.0, truth.1) < 0.5);
    }

    #[test]
    fn test_four_anchors_least_squares() {
        let truth = (47.0004, 8.0003);
        let anchors = [
            reading(47.0, 8.0, truth.0, truth.1),
            reading(47.001, 8.0, truth.0, truth.1),
            reading(47.0, 8.001, truth.0, truth.1),
            reading(47.001, 8.001, truth.0, truth.1),
        ];
        let (lat, lng) = trilaterate(&anchors).unwrap();
        assert!(haversine_m(lat, lng, truth.0, truth.1) < 0.5);
    }

    #[test]
    fn test_too_few_anchors() {
        let anchors = [
            reading(0.0, 0.0, 0.0005, 0.0005),
            reading(0.0, 0.001, 0.0005, 0.0005),
        ];
        assert_eq!(
            trilaterate(&anchors),
            Err(TrilaterationError::NotEnoughAnchors(2))
        );
    }

    #[test]
    fn test_colinear_anchors_are_singular() {
        let anchors = [
            reading(0.0, 0.0, 0.0005, 0.0005),
            reading(0.0, 0.001, 0.0005, 0.0005),
            reading(0.0, 0.002, 0.0005, 0.0005),
        ];
        assert_eq!(trilaterate(&anchors), Err(TrilaterationError::Singular));
    }

    #[test]
    fn test_inconsistent_ranges_rejected() {
        let mut anchors = [
            reading(0.0, 0.0, 0.0005, 0.0005),
            reading(0.0, 0.001, 0.0005, 0.0005),
            reading(0.001, 0.0, 0.0005, 0.0005),
        ];
        anchors[2].distance_m += 500.0;
        assert!(matches!(
            trilaterate(&anchors),
            Err(TrilaterationError::ResidualTooLarge { .. })
        ));
    }
}
