//! 2-D polynomial distortion with an iterative inverse.
//!
//! Each output coordinate is an independent polynomial in the input coordinates:
//!
//! ```text
//! x' = Σ cx_k · x^p_k · y^q_k
//! y' = Σ cy_k · x^p_k · y^q_k
//! ```
//!
//! The forward direction is evaluated directly; the inverse is found by Newton-Raphson
//! iteration on the analytic Jacobian, starting from the inverse of the local affine
//! approximation.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use super::{solve_2x2, AffineTransform, Transform, TransformError};
use crate::geometry::Point2D;

/// Default convergence threshold on the Newton step, in pixels
pub const DEFAULT_INVERSE_TOLERANCE: f64 = 1e-10;

/// Default cap on Newton iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// One monomial `coefficient · x^x_power · y^y_power`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolynomialTerm {
    pub coefficient: f64,
    pub x_power: u32,
    pub y_power: u32,
}

impl PolynomialTerm {
    pub fn new(coefficient: f64, x_power: u32, y_power: u32) -> Self {
        Self {
            coefficient,
            x_power,
            y_power,
        }
    }

    fn eval(&self, x: f64, y: f64) -> f64 {
        self.coefficient * x.powi(self.x_power as i32) * y.powi(self.y_power as i32)
    }

    /// Partial derivatives (d/dx, d/dy) at `(x, y)`
    fn gradient(&self, x: f64, y: f64) -> (f64, f64) {
        let ddx = if self.x_power == 0 {
            0.0
        } else {
            self.coefficient
                * self.x_power as f64
                * x.powi(self.x_power as i32 - 1)
                * y.powi(self.y_power as i32)
        };
        let ddy = if self.y_power == 0 {
            0.0
        } else {
            self.coefficient
                * self.y_power as f64
                * x.powi(self.x_power as i32)
                * y.powi(self.y_power as i32 - 1)
        };
        (ddx, ddy)
    }
}

/// Polynomial mapping between pixel frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialTransform {
    x_terms: Vec<PolynomialTerm>,
    y_terms: Vec<PolynomialTerm>,
    tolerance: f64,
    max_iterations: usize,
}

impl PolynomialTransform {
    pub fn new(x_terms: Vec<PolynomialTerm>, y_terms: Vec<PolynomialTerm>) -> Self {
        Self {
            x_terms,
            y_terms,
            tolerance: DEFAULT_INVERSE_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Full quadratic in the term order `[1, x, y, x², xy, y²]`
    pub fn quadratic(cx: [f64; 6], cy: [f64; 6]) -> Self {
        const POWERS: [(u32, u32); 6] = [(0, 0), (1, 0), (0, 1), (2, 0), (1, 1), (0, 2)];
        let terms = |c: [f64; 6]| -> Vec<PolynomialTerm> {
            POWERS
                .iter()
                .zip(c)
                .filter(|(_, coeff)| *coeff != 0.0)
                .map(|(&(p, q), coeff)| PolynomialTerm::new(coeff, p, q))
                .collect()
        };
        Self::new(terms(cx), terms(cy))
    }

    /// Override the Newton iteration controls used by [`Transform::inverse`]
    pub fn with_inverse_controls(mut self, tolerance: f64, max_iterations: usize) -> Self {
        self.tolerance = tolerance;
        self.max_iterations = max_iterations;
        self
    }

    pub fn x_terms(&self) -> &[PolynomialTerm] {
        &self.x_terms
    }

    pub fn y_terms(&self) -> &[PolynomialTerm] {
        &self.y_terms
    }

    fn eval(&self, x: f64, y: f64) -> Vector2<f64> {
        let px: f64 = self.x_terms.iter().map(|t| t.eval(x, y)).sum();
        let py: f64 = self.y_terms.iter().map(|t| t.eval(x, y)).sum();
        Vector2::new(px, py)
    }

    fn jacobian(&self, x: f64, y: f64) -> Matrix2<f64> {
        let row = |terms: &[PolynomialTerm]| {
            terms.iter().fold((0.0, 0.0), |(ax, ay), t| {
                let (gx, gy) = t.gradient(x, y);
                (ax + gx, ay + gy)
            })
        };
        let (xx, xy) = row(self.x_terms.as_slice());
        let (yx, yy) = row(self.y_terms.as_slice());
        Matrix2::new(xx, xy, yx, yy)
    }
}

impl Transform for PolynomialTransform {
    fn forward(&self, point: &Point2D) -> Point2D {
        Point2D::from(self.eval(point.x, point.y))
    }

    fn inverse(&self, point: &Point2D) -> Result<Point2D, TransformError> {
        let not_invertible = |reason: String| TransformError::NotInvertible {
            x: point.x,
            y: point.y,
            reason,
        };

        // Start from the inverse of the local affine approximation at the target
        let mut guess = self
            .linearize(point)
            .inverted()
            .map(|inv| inv.apply(point))
            .unwrap_or(*point);

        for _ in 0..self.max_iterations {
            let residual = self.eval(guess.x, guess.y) - point.coords;
            let step = solve_2x2(&self.jacobian(guess.x, guess.y), &residual)
                .map_err(|e| not_invertible(e.to_string()))?;
            guess -= step;

            if !guess.x.is_finite() || !guess.y.is_finite() {
                return Err(not_invertible("Newton iteration diverged".to_string()));
            }
            if step.norm() < self.tolerance {
                return Ok(guess);
            }
        }

        Err(TransformError::NoConvergence {
            x: point.x,
            y: point.y,
            iterations: self.max_iterations,
        })
    }

    fn linearize(&self, point: &Point2D) -> AffineTransform {
        AffineTransform::from_jacobian_at(
            self.jacobian(point.x, point.y),
            point,
            &self.forward(point),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn mild_distortion() -> PolynomialTransform {
        PolynomialTransform::quadratic(
            [0.5, 1.02, 0.03, 2e-5, -3e-5, 1e-5],
            [-1.0, -0.01, 0.97, 4e-5, 1e-5, -2e-5],
        )
    }

    #[test]
    fn test_forward_evaluates_terms() {
        let t = PolynomialTransform::quadratic(
            [0.0, 1.0, 0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        );
        let p = t.forward(&Point2D::new(3.0, 2.0));
        assert_relative_eq!(p, Point2D::new(12.0, 2.0));
    }

    #[test]
    fn test_inverse_roundtrip_random() {
        let t = mild_distortion();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let p = Point2D::new(
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
            );
            let q = t.inverse(&t.forward(&p)).unwrap();
            assert!((q - p).norm() < 1e-7, "roundtrip failed at {p}: got {q}");
        }
    }

    #[test]
    fn test_analytic_linearize_matches_finite_difference() {
        let t = mild_distortion();
        let p = Point2D::new(-40.0, 75.0);
        let analytic = t.linearize(&p);

        let h = 1e-4;
        let dx = (t.forward(&Point2D::new(p.x + h, p.y)) - t.forward(&Point2D::new(p.x - h, p.y)))
            / (2.0 * h);
        let dy = (t.forward(&Point2D::new(p.x, p.y + h)) - t.forward(&Point2D::new(p.x, p.y - h)))
            / (2.0 * h);
        let numeric = Matrix2::from_columns(&[dx, dy]);

        assert_relative_eq!(*analytic.linear(), numeric, epsilon = 1e-7);
        assert_relative_eq!(analytic.apply(&p), t.forward(&p), epsilon = 1e-10);
    }

    #[test]
    fn test_singular_jacobian_fails() {
        // x' = x², y' = y: Jacobian is singular along x = 0 and the inverse of a
        // negative x' does not exist
        let t = PolynomialTransform::new(
            vec![PolynomialTerm::new(1.0, 2, 0)],
            vec![PolynomialTerm::new(1.0, 0, 1)],
        );
        assert!(t.inverse(&Point2D::new(-4.0, 1.0)).is_err());
    }

    #[test]
    fn test_iteration_cap() {
        let t = mild_distortion().with_inverse_controls(0.0, 3);
        assert!(matches!(
            t.inverse(&Point2D::new(10.0, 10.0)),
            Err(TransformError::NoConvergence { iterations: 3, .. })
        ));
    }
}
