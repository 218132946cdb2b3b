//! Affine transforms.
//!
//! ```text
//! x' = a * x + b * y + tx
//! y' = c * x + d * y + ty
//! ```

use nalgebra::{Matrix2, Vector2};

use super::{Transform, TransformError};
use crate::geometry::Point2D;

/// Linear map plus translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    linear: Matrix2<f64>,
    translation: Vector2<f64>,
}

impl AffineTransform {
    pub fn new(linear: Matrix2<f64>, translation: Vector2<f64>) -> Self {
        Self {
            linear,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Matrix2::identity(), Vector2::zeros())
    }

    /// Purely linear transform (no translation)
    pub fn from_linear(linear: Matrix2<f64>) -> Self {
        Self::new(linear, Vector2::zeros())
    }

    /// Build from the six coefficients of the module-level formula
    pub fn from_coefficients(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self::new(Matrix2::new(a, b, c, d), Vector2::new(tx, ty))
    }

    /// Affine map with the given Jacobian that sends `from` exactly to `to`
    pub fn from_jacobian_at(jacobian: Matrix2<f64>, from: &Point2D, to: &Point2D) -> Self {
        Self::new(jacobian, to.coords - jacobian * from.coords)
    }

    pub fn linear(&self) -> &Matrix2<f64> {
        &self.linear
    }

    pub fn translation(&self) -> &Vector2<f64> {
        &self.translation
    }

    pub fn determinant(&self) -> f64 {
        self.linear.determinant()
    }

    pub fn apply(&self, point: &Point2D) -> Point2D {
        Point2D::from(self.linear * point.coords + self.translation)
    }

    /// Apply only the linear part, to an offset rather than a position
    pub fn apply_linear(&self, offset: &Vector2<f64>) -> Vector2<f64> {
        self.linear * offset
    }

    pub fn inverted(&self) -> Result<Self, TransformError> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(TransformError::Singular(det));
        }
        let inv = self
            .linear
            .try_inverse()
            .ok_or(TransformError::Singular(det))?;
        Ok(Self::new(inv, -(inv * self.translation)))
    }

    /// The transform that applies `self` first and then `next`
    pub fn then(&self, next: &AffineTransform) -> Self {
        Self::new(
            next.linear * self.linear,
            next.linear * self.translation + next.translation,
        )
    }

    /// Largest singular value of the linear part: the strongest local stretch
    pub fn max_scale(&self) -> f64 {
        self.linear.singular_values().max()
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform for AffineTransform {
    fn forward(&self, point: &Point2D) -> Point2D {
        self.apply(point)
    }

    fn inverse(&self, point: &Point2D) -> Result<Point2D, TransformError> {
        let offset = point.coords - self.translation;
        super::solve_2x2(&self.linear, &offset)
            .map(Point2D::from)
            .map_err(|e| TransformError::NotInvertible {
                x: point.x,
                y: point.y,
                reason: e.to_string(),
            })
    }

    fn linearize(&self, _point: &Point2D) -> AffineTransform {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn rotation(angle: f64) -> Matrix2<f64> {
        let (s, c) = angle.sin_cos();
        Matrix2::new(c, -s, s, c)
    }

    #[test]
    fn test_apply_coefficients() {
        let t = AffineTransform::from_coefficients(2.0, 0.5, -1.0, 1.0, 10.0, 20.0);
        let p = t.apply(&Point2D::new(1.0, 2.0));
        assert_relative_eq!(p, Point2D::new(13.0, 21.0), epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = AffineTransform::new(rotation(PI / 6.0) * 1.3, Vector2::new(4.0, -2.0));
        let p = Point2D::new(-7.5, 3.25);
        let q = t.inverse(&t.forward(&p)).unwrap();
        assert_relative_eq!(q, p, epsilon = 1e-12);

        let inv = t.inverted().unwrap();
        assert_relative_eq!(inv.apply(&t.apply(&p)), p, epsilon = 1e-12);
    }

    #[test]
    fn test_singular() {
        let t = AffineTransform::from_coefficients(1.0, 2.0, 2.0, 4.0, 0.0, 0.0);
        assert!(matches!(t.inverted(), Err(TransformError::Singular(_))));
        assert!(matches!(
            t.inverse(&Point2D::new(1.0, 1.0)),
            Err(TransformError::NotInvertible { .. })
        ));
    }

    #[test]
    fn test_then_composes_in_order() {
        let scale = AffineTransform::from_linear(Matrix2::new(2.0, 0.0, 0.0, 2.0));
        let shift = AffineTransform::new(Matrix2::identity(), Vector2::new(1.0, 0.0));
        let p = Point2D::new(1.0, 1.0);
        assert_relative_eq!(scale.then(&shift).apply(&p), Point2D::new(3.0, 2.0));
        assert_relative_eq!(shift.then(&scale).apply(&p), Point2D::new(4.0, 2.0));
    }

    #[test]
    fn test_from_jacobian_at() {
        let jac = Matrix2::new(1.1, 0.2, -0.1, 0.9);
        let from = Point2D::new(5.0, 6.0);
        let to = Point2D::new(-3.0, 2.0);
        let t = AffineTransform::from_jacobian_at(jac, &from, &to);
        assert_relative_eq!(t.apply(&from), to, epsilon = 1e-12);
    }

    #[test]
    fn test_max_scale() {
        let t = AffineTransform::from_linear(rotation(0.3) * Matrix2::new(3.0, 0.0, 0.0, 0.5));
        assert_relative_eq!(t.max_scale(), 3.0, epsilon = 1e-12);
    }
}
