//! Analytic profiles and the polynomials that make their parameters vary across the
//! detector.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::KernelError;

/// Elliptical Gaussian, normalized to unit integral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianFunction2 {
    /// Sigma along the rotated x axis
    pub sigma1: f64,
    /// Sigma along the rotated y axis
    pub sigma2: f64,
    /// Rotation of the major axis, in radians counter-clockwise from +x
    pub angle: f64,
}

impl GaussianFunction2 {
    pub fn new(sigma1: f64, sigma2: f64, angle: f64) -> Self {
        Self {
            sigma1,
            sigma2,
            angle,
        }
    }

    pub fn circular(sigma: f64) -> Self {
        Self::new(sigma, sigma, 0.0)
    }

    fn validate(&self) -> Result<(), String> {
        if !(self.sigma1 > 0.0 && self.sigma2 > 0.0) || !self.angle.is_finite() {
            return Err(format!(
                "Gaussian needs positive sigmas, got {} and {}",
                self.sigma1, self.sigma2
            ));
        }
        Ok(())
    }

    pub fn value(&self, x: f64, y: f64) -> f64 {
        let (sin, cos) = self.angle.sin_cos();
        let u = x * cos + y * sin;
        let v = -x * sin + y * cos;
        let s1 = self.sigma1;
        let s2 = self.sigma2;
        (-0.5 * (u * u / (s1 * s1) + v * v / (s2 * s2))).exp() / (2.0 * PI * s1 * s2)
    }
}

/// Sum of two concentric circular Gaussians with peak ratio `b`.
///
/// A `sigma2` of zero turns the outer component off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoubleGaussianFunction2 {
    pub sigma1: f64,
    pub sigma2: f64,
    /// Amplitude of the outer component relative to the inner one at the center
    pub b: f64,
}

impl DoubleGaussianFunction2 {
    pub fn new(sigma1: f64, sigma2: f64, b: f64) -> Self {
        Self { sigma1, sigma2, b }
    }

    fn validate(&self) -> Result<(), String> {
        if !(self.sigma1 > 0.0) {
            return Err(format!("inner sigma must be positive, got {}", self.sigma1));
        }
        if !(self.sigma2 >= 0.0) || !(self.b >= 0.0) {
            return Err(format!(
                "outer sigma and amplitude must be non-negative, got {} and {}",
                self.sigma2, self.b
            ));
        }
        Ok(())
    }

    pub fn value(&self, x: f64, y: f64) -> f64 {
        let r2 = x * x + y * y;
        let s1 = self.sigma1 * self.sigma1;
        let inner = (-0.5 * r2 / s1).exp();
        if self.sigma2 == 0.0 || self.b == 0.0 {
            return inner / (2.0 * PI * s1);
        }
        let s2 = self.sigma2 * self.sigma2;
        (inner + self.b * (-0.5 * r2 / s2).exp()) / (2.0 * PI * (s1 + self.b * s2))
    }
}

/// Profile evaluated by an [`AnalyticKernel`](super::AnalyticKernel)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KernelFunction {
    Gaussian(GaussianFunction2),
    DoubleGaussian(DoubleGaussianFunction2),
}

impl KernelFunction {
    /// Parameter vector, in the order spatial functions are matched to
    pub fn parameters(&self) -> Vec<f64> {
        match self {
            KernelFunction::Gaussian(g) => vec![g.sigma1, g.sigma2, g.angle],
            KernelFunction::DoubleGaussian(d) => vec![d.sigma1, d.sigma2, d.b],
        }
    }

    pub fn n_parameters(&self) -> usize {
        3
    }

    /// Same profile with a new parameter vector
    pub fn with_parameters(&self, params: &[f64]) -> Result<Self, KernelError> {
        if params.len() != self.n_parameters() {
            return Err(KernelError::InvalidParameter(format!(
                "expected {} parameters, got {}",
                self.n_parameters(),
                params.len()
            )));
        }
        let function = match self {
            KernelFunction::Gaussian(_) => {
                KernelFunction::Gaussian(GaussianFunction2::new(params[0], params[1], params[2]))
            }
            KernelFunction::DoubleGaussian(_) => KernelFunction::DoubleGaussian(
                DoubleGaussianFunction2::new(params[0], params[1], params[2]),
            ),
        };
        Ok(function)
    }

    /// Check parameters are inside the profile's domain
    pub fn validate(&self) -> Result<(), String> {
        match self {
            KernelFunction::Gaussian(g) => g.validate(),
            KernelFunction::DoubleGaussian(d) => d.validate(),
        }
    }

    pub fn value(&self, x: f64, y: f64) -> f64 {
        match self {
            KernelFunction::Gaussian(g) => g.value(x, y),
            KernelFunction::DoubleGaussian(d) => d.value(x, y),
        }
    }
}

impl From<GaussianFunction2> for KernelFunction {
    fn from(g: GaussianFunction2) -> Self {
        KernelFunction::Gaussian(g)
    }
}

impl From<DoubleGaussianFunction2> for KernelFunction {
    fn from(d: DoubleGaussianFunction2) -> Self {
        KernelFunction::DoubleGaussian(d)
    }
}

/// Bivariate polynomial of total degree `order`.
///
/// Coefficients are ordered by increasing total degree and, within a degree, by
/// decreasing power of x: `1, x, y, x^2, xy, y^2, x^3, ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialFunction2 {
    order: u32,
    coefficients: Vec<f64>,
}

impl PolynomialFunction2 {
    pub fn n_coefficients(order: u32) -> usize {
        let n = order as usize;
        (n + 1) * (n + 2) / 2
    }

    pub fn new(order: u32, coefficients: Vec<f64>) -> Result<Self, KernelError> {
        let expected = Self::n_coefficients(order);
        if coefficients.len() != expected {
            return Err(KernelError::InvalidParameter(format!(
                "order {order} polynomial needs {expected} coefficients, got {}",
                coefficients.len()
            )));
        }
        Ok(Self {
            order,
            coefficients,
        })
    }

    pub fn constant(value: f64) -> Self {
        Self {
            order: 0,
            coefficients: vec![value],
        }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// True if any non-constant coefficient is non-zero
    pub fn is_varying(&self) -> bool {
        self.coefficients.iter().skip(1).any(|c| *c != 0.0)
    }

    pub fn value(&self, x: f64, y: f64) -> f64 {
        let mut coefficients = self.coefficients.iter();
        let mut total = 0.0;
        for degree in 0..=self.order as i32 {
            for y_power in 0..=degree {
                let Some(c) = coefficients.next() else {
                    return total;
                };
                total += c * x.powi(degree - y_power) * y.powi(y_power);
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_integrates_to_one() {
        let g = GaussianFunction2::new(1.5, 2.5, 0.3);
        let mut total = 0.0;
        for y in -30..=30 {
            for x in -30..=30 {
                total += g.value(x as f64, y as f64);
            }
        }
        assert_relative_eq!(total, 1.0, max_relative = 1e-8);
    }

    #[test]
    fn test_gaussian_rotation() {
        let g = GaussianFunction2::new(3.0, 1.0, std::f64::consts::FRAC_PI_2);
        // major axis now along y
        assert!(g.value(0.0, 2.0) > g.value(2.0, 0.0));
    }

    #[test]
    fn test_double_gaussian_center() {
        let d = DoubleGaussianFunction2::new(1.0, 3.0, 0.2);
        let expected = 1.2 / (2.0 * PI * (1.0 + 0.2 * 9.0));
        assert_relative_eq!(d.value(0.0, 0.0), expected, max_relative = 1e-12);

        let single = DoubleGaussianFunction2::new(1.0, 0.0, 0.2);
        assert_relative_eq!(single.value(0.0, 0.0), 1.0 / (2.0 * PI), max_relative = 1e-12);
    }

    #[test]
    fn test_with_parameters_validates_count() {
        let f = KernelFunction::from(GaussianFunction2::circular(1.0));
        assert_eq!(f.parameters(), vec![1.0, 1.0, 0.0]);
        assert!(f.with_parameters(&[1.0, 2.0]).is_err());
        let g = f.with_parameters(&[2.0, 2.0, 0.0]).unwrap();
        assert_eq!(g, KernelFunction::from(GaussianFunction2::circular(2.0)));
    }

    #[test]
    fn test_domain_errors() {
        assert!(KernelFunction::from(GaussianFunction2::circular(-1.0))
            .validate()
            .is_err());
        assert!(KernelFunction::from(DoubleGaussianFunction2::new(1.0, 2.0, -0.1))
            .validate()
            .is_err());
        assert!(KernelFunction::from(DoubleGaussianFunction2::new(1.0, 0.0, 0.0))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_polynomial_term_order() {
        let p = PolynomialFunction2::new(2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let (x, y) = (0.5, -2.0);
        let expected = 1.0 + 2.0 * x + 3.0 * y + 4.0 * x * x + 5.0 * x * y + 6.0 * y * y;
        assert_relative_eq!(p.value(x, y), expected, epsilon = 1e-12);
        assert!(p.is_varying());
        assert!(!PolynomialFunction2::constant(4.0).is_varying());
    }

    #[test]
    fn test_polynomial_coefficient_count() {
        assert_eq!(PolynomialFunction2::n_coefficients(0), 1);
        assert_eq!(PolynomialFunction2::n_coefficients(1), 3);
        assert_eq!(PolynomialFunction2::n_coefficients(3), 10);
        assert!(PolynomialFunction2::new(1, vec![1.0, 0.5]).is_err());
    }
}
