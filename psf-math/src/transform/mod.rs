//! Coordinate transforms between pixel frames.
//!
//! A [`Transform`] maps points from a source frame to a destination frame, can map them
//! back, and can produce an affine approximation of itself around any point. The PSF
//! warping code only ever talks to this trait, so any distortion model that can answer
//! those three questions can be used.

mod affine;
mod polynomial;

use std::fmt;

use nalgebra::{Matrix2, Vector2};
use thiserror::Error;

use crate::geometry::Point2D;

pub use affine::AffineTransform;
pub use polynomial::{PolynomialTerm, PolynomialTransform};

/// Step used by the default finite-difference linearization, in pixels
const LINEARIZE_STEP: f64 = 1e-3;

/// Errors that can occur while mapping points
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("transform is not invertible at ({x:.4}, {y:.4}): {reason}")]
    NotInvertible { x: f64, y: f64, reason: String },

    #[error("inverse did not converge at ({x:.4}, {y:.4}) after {iterations} iterations")]
    NoConvergence { x: f64, y: f64, iterations: usize },

    #[error("linear transform is singular (determinant {0:e})")]
    Singular(f64),
}

/// Mapping from a source pixel frame to a destination pixel frame
pub trait Transform: Send + Sync + fmt::Debug {
    /// Map a source-frame point into the destination frame
    fn forward(&self, point: &Point2D) -> Point2D;

    /// Map a destination-frame point back into the source frame
    fn inverse(&self, point: &Point2D) -> Result<Point2D, TransformError>;

    /// Affine approximation of [`forward`](Transform::forward) valid near `point`
    /// (a source-frame position).
    ///
    /// The default uses central differences of `forward`; implementations with an
    /// analytic Jacobian should override it.
    fn linearize(&self, point: &Point2D) -> AffineTransform {
        let h = LINEARIZE_STEP;
        let dx = self.forward(&Point2D::new(point.x + h, point.y))
            - self.forward(&Point2D::new(point.x - h, point.y));
        let dy = self.forward(&Point2D::new(point.x, point.y + h))
            - self.forward(&Point2D::new(point.x, point.y - h));
        let jacobian = Matrix2::from_columns(&[dx / (2.0 * h), dy / (2.0 * h)]);
        AffineTransform::from_jacobian_at(jacobian, point, &self.forward(point))
    }
}

/// Transform that leaves every point where it is
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdentityTransform;

impl Transform for IdentityTransform {
    fn forward(&self, point: &Point2D) -> Point2D {
        *point
    }

    fn inverse(&self, point: &Point2D) -> Result<Point2D, TransformError> {
        Ok(*point)
    }

    fn linearize(&self, _point: &Point2D) -> AffineTransform {
        AffineTransform::identity()
    }
}

pub(crate) fn solve_2x2(
    matrix: &Matrix2<f64>,
    rhs: &Vector2<f64>,
) -> Result<Vector2<f64>, TransformError> {
    let det = matrix.determinant();
    if det.abs() < f64::EPSILON * matrix.abs().max().max(1.0) {
        return Err(TransformError::Singular(det));
    }
    matrix
        .try_inverse()
        .map(|inv| inv * rhs)
        .ok_or(TransformError::Singular(det))
}
