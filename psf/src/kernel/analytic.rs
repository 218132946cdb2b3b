use psf_math::{Image, Point2D};

use super::functions::{KernelFunction, PolynomialFunction2};
use super::{check_size, Kernel, KernelError};

/// Kernel sampled from an analytic profile at pixel centers.
///
/// When spatial functions are supplied, parameter `i` of the profile at a position is
/// `spatial[i]` evaluated there, so the profile can change across the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticKernel {
    width: usize,
    height: usize,
    function: KernelFunction,
    spatial: Vec<PolynomialFunction2>,
}

impl AnalyticKernel {
    /// Spatially invariant kernel
    pub fn new(
        width: usize,
        height: usize,
        function: impl Into<KernelFunction>,
    ) -> Result<Self, KernelError> {
        check_size(width, height)?;
        let function = function.into();
        function.validate().map_err(KernelError::InvalidParameter)?;
        Ok(Self {
            width,
            height,
            function,
            spatial: Vec::new(),
        })
    }

    /// Kernel whose profile parameters follow one spatial function each
    pub fn with_spatial_functions(
        width: usize,
        height: usize,
        function: impl Into<KernelFunction>,
        spatial: Vec<PolynomialFunction2>,
    ) -> Result<Self, KernelError> {
        check_size(width, height)?;
        let function = function.into();
        if spatial.len() != function.n_parameters() {
            return Err(KernelError::InvalidParameter(format!(
                "profile has {} parameters but {} spatial functions were given",
                function.n_parameters(),
                spatial.len()
            )));
        }
        Ok(Self {
            width,
            height,
            function,
            spatial,
        })
    }

    pub fn function(&self) -> &KernelFunction {
        &self.function
    }

    /// Profile with its parameters set for `position`
    pub fn function_at(&self, position: &Point2D) -> Result<KernelFunction, KernelError> {
        if self.spatial.is_empty() {
            return Ok(self.function);
        }
        let params: Vec<f64> = self
            .spatial
            .iter()
            .map(|f| f.value(position.x, position.y))
            .collect();
        let function = self.function.with_parameters(&params)?;
        function
            .validate()
            .map_err(|reason| KernelError::OutOfDomain {
                x: position.x,
                y: position.y,
                reason,
            })?;
        Ok(function)
    }
}

impl Kernel for AnalyticKernel {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn is_spatially_varying(&self) -> bool {
        self.spatial.iter().any(PolynomialFunction2::is_varying)
    }

    fn evaluate(&self, position: &Point2D) -> Result<Image, KernelError> {
        let function = self.function_at(position)?;
        Ok(Image::from_fn(self.bbox(), |x, y| {
            function.value(x as f64, y as f64)
        }))
    }

    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn Kernel>, KernelError> {
        check_size(width, height)?;
        Ok(Box::new(Self {
            width,
            height,
            ..self.clone()
        }))
    }

    fn clone_kernel(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::GaussianFunction2;
    use approx::assert_relative_eq;
    use psf_math::BoundingBox;

    fn varying_sigma() -> AnalyticKernel {
        let sigma = PolynomialFunction2::new(1, vec![1.0, 0.5, 0.5]).unwrap();
        AnalyticKernel::with_spatial_functions(
            7,
            7,
            GaussianFunction2::circular(1.0),
            vec![sigma.clone(), sigma, PolynomialFunction2::constant(0.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_invariant_kernel() {
        let kernel = AnalyticKernel::new(7, 5, GaussianFunction2::circular(1.0)).unwrap();
        assert!(!kernel.is_spatially_varying());
        let image = kernel.compute_image(&Point2D::new(40.0, 2.0), true).unwrap();
        assert_eq!(image.bbox(), BoundingBox::centered(7, 5));
        assert_relative_eq!(image.sum(), 1.0, epsilon = 1e-12);
        assert_eq!(image.max_value(), image.get(0, 0).unwrap());
    }

    #[test]
    fn test_spatial_functions_change_profile() {
        let kernel = varying_sigma();
        assert!(kernel.is_spatially_varying());
        let narrow = kernel.compute_image(&Point2D::new(0.0, 0.0), true).unwrap();
        let wide = kernel.compute_image(&Point2D::new(5.0, 6.0), true).unwrap();
        assert!(narrow.get(0, 0).unwrap() > wide.get(0, 0).unwrap());
    }

    #[test]
    fn test_out_of_domain_position() {
        let kernel = varying_sigma();
        // sigma = 1 + 0.5 * (-3) + 0.5 * (-3) < 0
        assert!(matches!(
            kernel.evaluate(&Point2D::new(-3.0, -3.0)),
            Err(KernelError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn test_invalid_construction() {
        assert!(AnalyticKernel::new(0, 5, GaussianFunction2::circular(1.0)).is_err());
        assert!(AnalyticKernel::new(5, 5, GaussianFunction2::circular(0.0)).is_err());
        assert!(AnalyticKernel::with_spatial_functions(
            5,
            5,
            GaussianFunction2::circular(1.0),
            vec![PolynomialFunction2::constant(1.0)],
        )
        .is_err());
    }

    #[test]
    fn test_resized_keeps_profile() {
        let kernel = AnalyticKernel::new(5, 5, GaussianFunction2::circular(1.5)).unwrap();
        let big = kernel.resized(11, 9).unwrap();
        let small_image = kernel.evaluate(&Point2D::origin()).unwrap();
        let big_image = big.evaluate(&Point2D::origin()).unwrap();
        assert_eq!(big_image.bbox(), BoundingBox::centered(11, 9));
        assert_relative_eq!(big_image.get(2, -1).unwrap(), small_image.get(2, -1).unwrap());
    }
}
