// src/calibration.rs
//
// Builds the image <-> ground mapping from four point correspondences.
// The four image points are paired positionally with the ground rectangle
// corners (0,0), (w,0), (w,h), (0,h); the caller supplies them in one
// consistent winding. Point collection (GUI clicks, manual entry) lives
// upstream — this module only does the math.

use nalgebra::{Matrix3, SMatrix, SVector};
use thiserror::Error;
use tracing::info;

use crate::transform::CoordinateTransform;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("degenerate calibration: {reason}")]
    Degenerate { reason: String },
}

impl CalibrationError {
    fn degenerate(reason: impl Into<String>) -> Self {
        Self::Degenerate {
            reason: reason.into(),
        }
    }
}

/// Outcome of one calibration session. Immutable; recalibration replaces
/// the whole value rather than mutating it.
#[derive(Debug, Clone)]
pub struct CalibrationResult {
    pub image_points: [[f64; 2]; 4],
    pub ground_width: f64,
    pub ground_height: f64,
    pub transform: CoordinateTransform,
}

pub struct Calibrator;

impl Calibrator {
    /// Solve the unique projective transform mapping the four image points
    /// onto the ground rectangle, plus its algebraic inverse.
    pub fn calibrate(
        image_points: [[f64; 2]; 4],
        ground_width: f64,
        ground_height: f64,
    ) -> Result<CalibrationResult, CalibrationError> {
        if ground_width <= 0.0 || ground_height <= 0.0 {
            return Err(CalibrationError::degenerate(format!(
                "ground dimensions must be positive, got {ground_width}x{ground_height}"
            )));
        }

        let ground_points = [
            [0.0, 0.0],
            [ground_width, 0.0],
            [ground_width, ground_height],
            [0.0, ground_height],
        ];

        let forward = solve_homography(&image_points, &ground_points)?;
        let transform = CoordinateTransform::from_forward(forward).ok_or_else(|| {
            CalibrationError::degenerate("homography is singular (collinear or coincident points)")
        })?;

        info!(
            "Calibration completed: {:.1}m x {:.1}m ground area",
            ground_width, ground_height
        );

        Ok(CalibrationResult {
            image_points,
            ground_width,
            ground_height,
            transform,
        })
    }
}

/// Exact four-correspondence homography: fix h22 = 1 and solve the 8x8
/// linear system for the remaining entries. With exactly four points this
/// is equivalent to the usual DLT but needs no eigen decomposition.
fn solve_homography(
    src: &[[f64; 2]; 4],
    dst: &[[f64; 2]; 4],
) -> Result<Matrix3<f64>, CalibrationError> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for i in 0..4 {
        let [u, v] = src[i];
        let [x, y] = dst[i];

        // x * (h20 u + h21 v + 1) = h00 u + h01 v + h02
        a[(2 * i, 0)] = u;
        a[(2 * i, 1)] = v;
        a[(2 * i, 2)] = 1.0;
        a[(2 * i, 6)] = -x * u;
        a[(2 * i, 7)] = -x * v;
        b[2 * i] = x;

        // y * (h20 u + h21 v + 1) = h10 u + h11 v + h12
        a[(2 * i + 1, 3)] = u;
        a[(2 * i + 1, 4)] = v;
        a[(2 * i + 1, 5)] = 1.0;
        a[(2 * i + 1, 6)] = -y * u;
        a[(2 * i + 1, 7)] = -y * v;
        b[2 * i + 1] = y;
    }

    let h = a.lu().solve(&b).ok_or_else(|| {
        CalibrationError::degenerate("calibration points are collinear or coincident")
    })?;

    Ok(Matrix3::new(
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const UNIT_SQUARE_PX: [[f64; 2]; 4] =
        [[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]];

    #[test]
    fn test_axis_aligned_square() {
        let result = Calibrator::calibrate(UNIT_SQUARE_PX, 10.0, 10.0).unwrap();
        let t = &result.transform;

        // Corners land exactly on the ground rectangle
        let w = t.image_to_world(0.0, 0.0).unwrap();
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(w[1], 0.0, epsilon = 1e-6);
        let w = t.image_to_world(100.0, 100.0).unwrap();
        assert_relative_eq!(w[0], 10.0, epsilon = 1e-6);
        assert_relative_eq!(w[1], 10.0, epsilon = 1e-6);

        // Interior point scales linearly for this affine case
        let w = t.image_to_world(50.0, 50.0).unwrap();
        assert_relative_eq!(w[0], 5.0, epsilon = 1e-6);
        assert_relative_eq!(w[1], 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_perspective_quad_maps_corners() {
        // A tilted camera view of a 4m x 6m patch
        let image_points = [[210.0, 80.0], [1050.0, 95.0], [1230.0, 690.0], [40.0, 660.0]];
        let result = Calibrator::calibrate(image_points, 4.0, 6.0).unwrap();
        let t = &result.transform;

        let expected = [[0.0, 0.0], [4.0, 0.0], [4.0, 6.0], [0.0, 6.0]];
        for (img, gnd) in image_points.iter().zip(expected.iter()) {
            let w = t.image_to_world(img[0], img[1]).unwrap();
            assert_relative_eq!(w[0], gnd[0], epsilon = 1e-6);
            assert_relative_eq!(w[1], gnd[1], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_roundtrip_within_tolerance() {
        let image_points = [[210.0, 80.0], [1050.0, 95.0], [1230.0, 690.0], [40.0, 660.0]];
        let result = Calibrator::calibrate(image_points, 4.0, 6.0).unwrap();
        let t = &result.transform;

        for &(px, py) in &[(300.0, 200.0), (640.0, 360.0), (900.0, 500.0)] {
            let w = t.image_to_world(px, py).unwrap();
            let back = t.world_to_image(w[0], w[1]).unwrap();
            assert_relative_eq!(back[0], px, epsilon = 1e-3);
            assert_relative_eq!(back[1], py, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_collinear_points_rejected() {
        let image_points = [[0.0, 0.0], [10.0, 10.0], [20.0, 20.0], [30.0, 30.0]];
        let err = Calibrator::calibrate(image_points, 10.0, 10.0).unwrap_err();
        assert!(matches!(err, CalibrationError::Degenerate { .. }));
    }

    #[test]
    fn test_coincident_points_rejected() {
        let image_points = [[0.0, 0.0], [0.0, 0.0], [100.0, 100.0], [0.0, 100.0]];
        let err = Calibrator::calibrate(image_points, 10.0, 10.0).unwrap_err();
        assert!(matches!(err, CalibrationError::Degenerate { .. }));
    }

    #[test]
    fn test_nonpositive_dimensions_rejected() {
        assert!(Calibrator::calibrate(UNIT_SQUARE_PX, 0.0, 10.0).is_err());
        assert!(Calibrator::calibrate(UNIT_SQUARE_PX, 10.0, -2.0).is_err());
    }
}
