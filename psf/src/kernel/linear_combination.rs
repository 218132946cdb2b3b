use psf_math::{BoundingBox, Image, Point2D};

use super::functions::PolynomialFunction2;
use super::{Kernel, KernelError};

/// Weighted sum of fixed basis images, with weights that vary across the detector.
///
/// This is the shape of a principal-component PSF model: a mean image plus a few
/// eigen-images whose amplitudes are low-order polynomials in position.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearCombinationKernel {
    basis: Vec<Image>,
    weights: Vec<PolynomialFunction2>,
}

impl LinearCombinationKernel {
    /// Every basis image is re-centered on the local origin; all must share a size.
    pub fn new(
        basis: Vec<Image>,
        weights: Vec<PolynomialFunction2>,
    ) -> Result<Self, KernelError> {
        let Some(first) = basis.first() else {
            return Err(KernelError::InvalidParameter(
                "linear combination needs at least one basis image".to_string(),
            ));
        };
        if basis.len() != weights.len() {
            return Err(KernelError::InvalidParameter(format!(
                "{} basis images but {} weight functions",
                basis.len(),
                weights.len()
            )));
        }

        let (width, height) = (first.width(), first.height());
        super::check_size(width, height)?;
        let bbox = BoundingBox::centered(width, height);
        let basis = basis
            .iter()
            .map(|image| {
                if image.width() != width || image.height() != height {
                    return Err(KernelError::InvalidParameter(format!(
                        "basis image is {}x{}, expected {width}x{height}",
                        image.width(),
                        image.height()
                    )));
                }
                Ok(image.with_origin(bbox.min_x, bbox.min_y))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { basis, weights })
    }

    pub fn n_basis(&self) -> usize {
        self.basis.len()
    }

    pub fn basis(&self) -> &[Image] {
        &self.basis
    }

    /// Basis weights at `position`
    pub fn weights_at(&self, position: &Point2D) -> Vec<f64> {
        self.weights
            .iter()
            .map(|f| f.value(position.x, position.y))
            .collect()
    }
}

impl Kernel for LinearCombinationKernel {
    fn width(&self) -> usize {
        self.basis[0].width()
    }

    fn height(&self) -> usize {
        self.basis[0].height()
    }

    fn is_spatially_varying(&self) -> bool {
        self.weights.iter().any(PolynomialFunction2::is_varying)
    }

    fn evaluate(&self, position: &Point2D) -> Result<Image, KernelError> {
        let mut out = Image::new(self.bbox());
        for (image, weight) in self.basis.iter().zip(self.weights_at(position)) {
            if weight != 0.0 {
                out.array_mut().scaled_add(weight, image.array());
            }
        }
        Ok(out)
    }

    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn Kernel>, KernelError> {
        super::check_size(width, height)?;
        let bbox = BoundingBox::centered(width, height);
        Ok(Box::new(Self {
            basis: self.basis.iter().map(|image| image.reframed(&bbox)).collect(),
            weights: self.weights.clone(),
        }))
    }

    fn clone_kernel(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}
