// src/transform.rs
//
// Projective image <-> ground-plane mapping. Pure and stateless once
// built; the calibrator is the only place instances come from.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use crate::geometry::GroundPolygon;

/// Homogeneous weights below this are treated as points at infinity.
const W_EPSILON: f64 = 1e-9;

/// Projected polygons at or below this area (m^2) are unusable.
pub const MIN_POLYGON_AREA: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("point projects to infinity (homogeneous weight {w:.3e})")]
    PointAtInfinity { w: f64 },
    #[error("projected polygon is degenerate (area {area:.3e} m^2)")]
    DegeneratePolygon { area: f64 },
}

/// A pair of mutually-inverse 3x3 projective matrices.
/// `forward` maps image pixels to ground meters; `inverse` maps back.
#[derive(Debug, Clone)]
pub struct CoordinateTransform {
    forward: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl CoordinateTransform {
    /// Build from a forward matrix. Fails (returns None) when the matrix is
    /// numerically singular; the calibrator wraps this into its own error.
    pub(crate) fn from_forward(forward: Matrix3<f64>) -> Option<Self> {
        if forward.determinant().abs() <= W_EPSILON {
            return None;
        }
        let inverse = forward.try_inverse()?;
        Some(Self { forward, inverse })
    }

    /// Image pixels -> ground meters.
    pub fn image_to_world(&self, px: f64, py: f64) -> Result<[f64; 2], ProjectionError> {
        apply(&self.forward, px, py)
    }

    /// Ground meters -> image pixels.
    pub fn world_to_image(&self, x: f64, y: f64) -> Result<[f64; 2], ProjectionError> {
        apply(&self.inverse, x, y)
    }

    /// Project a pixel bbox to a ground-plane quadrilateral. Perspective
    /// makes the result non-rectangular in general. Fails when any corner
    /// is at infinity or the polygon collapses to (near) zero area —
    /// callers skip such boxes for the frame.
    pub fn project_box_to_ground(&self, bbox: [f32; 4]) -> Result<GroundPolygon, ProjectionError> {
        let [x1, y1, x2, y2] = bbox;
        let corners = [
            (x1 as f64, y1 as f64),
            (x2 as f64, y1 as f64),
            (x2 as f64, y2 as f64),
            (x1 as f64, y2 as f64),
        ];
        let mut vertices = Vec::with_capacity(4);
        for (px, py) in corners {
            vertices.push(self.image_to_world(px, py)?);
        }
        let polygon = GroundPolygon::new(vertices);
        let area = polygon_area(&polygon);
        if area <= MIN_POLYGON_AREA {
            return Err(ProjectionError::DegeneratePolygon { area });
        }
        Ok(polygon)
    }
}

fn apply(m: &Matrix3<f64>, x: f64, y: f64) -> Result<[f64; 2], ProjectionError> {
    let p = m * Vector3::new(x, y, 1.0);
    if p[2].abs() < W_EPSILON {
        return Err(ProjectionError::PointAtInfinity { w: p[2] });
    }
    Ok([p[0] / p[2], p[1] / p[2]])
}

// Local shoelace so the transform does not depend on a geometry backend.
fn polygon_area(polygon: &GroundPolygon) -> f64 {
    let v = &polygon.vertices;
    if v.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..v.len() {
        let a = v[i];
        let b = v[(i + 1) % v.len()];
        sum += a[0] * b[1] - b[0] * a[1];
    }
    (sum * 0.5).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scale_transform(s: f64) -> CoordinateTransform {
        // image px -> ground m, uniform scale
        let m = Matrix3::new(s, 0.0, 0.0, 0.0, s, 0.0, 0.0, 0.0, 1.0);
        CoordinateTransform::from_forward(m).unwrap()
    }

    #[test]
    fn test_roundtrip_scale() {
        let t = scale_transform(0.1);
        let w = t.image_to_world(100.0, 50.0).unwrap();
        assert_relative_eq!(w[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(w[1], 5.0, epsilon = 1e-9);
        let p = t.world_to_image(w[0], w[1]).unwrap();
        assert_relative_eq!(p[0], 100.0, epsilon = 1e-3);
        assert_relative_eq!(p[1], 50.0, epsilon = 1e-3);
    }

    #[test]
    fn test_roundtrip_perspective() {
        let m = Matrix3::new(1.2, 0.1, -3.0, -0.05, 0.9, 2.0, 1e-4, -5e-5, 1.0);
        let t = CoordinateTransform::from_forward(m).unwrap();
        for &(px, py) in &[(0.0, 0.0), (640.0, 360.0), (1279.0, 719.0)] {
            let w = t.image_to_world(px, py).unwrap();
            let back = t.world_to_image(w[0], w[1]).unwrap();
            assert_relative_eq!(back[0], px, epsilon = 1e-3);
            assert_relative_eq!(back[1], py, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        assert!(CoordinateTransform::from_forward(m).is_none());
    }

    #[test]
    fn test_point_at_infinity() {
        // Bottom row sends y = 1 to w = 0
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, -1.0, 1.0);
        let t = CoordinateTransform::from_forward(m).unwrap();
        let err = t.image_to_world(5.0, 1.0).unwrap_err();
        assert!(matches!(err, ProjectionError::PointAtInfinity { .. }));
    }

    #[test]
    fn test_project_box_scale() {
        let t = scale_transform(0.1);
        let poly = t.project_box_to_ground([100.0, 100.0, 200.0, 200.0]).unwrap();
        assert_eq!(poly.vertices.len(), 4);
        assert_relative_eq!(polygon_area(&poly), 100.0, epsilon = 1e-9);
        let (min_x, min_y, max_x, max_y) = poly.bounds();
        assert_relative_eq!(min_x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(min_y, 10.0, epsilon = 1e-9);
        assert_relative_eq!(max_x, 20.0, epsilon = 1e-9);
        assert_relative_eq!(max_y, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_project_degenerate_box() {
        let t = scale_transform(0.1);
        let err = t.project_box_to_ground([100.0, 100.0, 100.0, 200.0]).unwrap_err();
        assert!(matches!(err, ProjectionError::DegeneratePolygon { .. }));
    }
}
