//! Convolution kernels: pixel stencils that may vary with position.
//!
//! A [`Kernel`] knows its stencil size and produces the stencil at a position. The
//! stencil is centered on the local origin via [`BoundingBox::centered`], so the center
//! pixel of a `w x h` kernel is `((w - 1) / 2, (h - 1) / 2)` from its corner.

pub mod analytic;
pub mod functions;
pub mod linear_combination;

pub use analytic::AnalyticKernel;
pub use functions::{
    DoubleGaussianFunction2, GaussianFunction2, KernelFunction, PolynomialFunction2,
};
pub use linear_combination::LinearCombinationKernel;

use std::fmt;

use psf_math::{BoundingBox, Image, ImageError, Point2D};
use thiserror::Error;

/// Errors raised while building or evaluating a kernel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("invalid kernel parameter: {0}")]
    InvalidParameter(String),

    #[error("kernel is undefined at ({x:.3}, {y:.3}): {reason}")]
    OutOfDomain { x: f64, y: f64, reason: String },

    #[error("kernel image error: {0}")]
    Image(#[from] ImageError),
}

pub trait Kernel: Send + Sync + fmt::Debug {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Kernel-local extent of the stencil
    fn bbox(&self) -> BoundingBox {
        BoundingBox::centered(self.width(), self.height())
    }

    fn is_spatially_varying(&self) -> bool;

    /// Raw stencil at `position`, covering [`bbox`](Self::bbox)
    fn evaluate(&self, position: &Point2D) -> Result<Image, KernelError>;

    /// Stencil at `position`, optionally scaled to unit sum
    fn compute_image(&self, position: &Point2D, normalize: bool) -> Result<Image, KernelError> {
        let mut image = self.evaluate(position)?;
        if normalize {
            image.normalize()?;
        }
        Ok(image)
    }

    /// Same kernel evaluated over a different stencil size
    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn Kernel>, KernelError>;

    fn clone_kernel(&self) -> Box<dyn Kernel>;
}

impl Clone for Box<dyn Kernel> {
    fn clone(&self) -> Self {
        self.clone_kernel()
    }
}

pub(crate) fn check_size(width: usize, height: usize) -> Result<(), KernelError> {
    if width == 0 || height == 0 {
        return Err(KernelError::InvalidParameter(format!(
            "kernel size must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Constant stencil
#[derive(Debug, Clone, PartialEq)]
pub struct FixedKernel {
    image: Image,
}

impl FixedKernel {
    /// Kernel from a `(height, width)` pixel array, re-centered on the local origin
    pub fn new(pixels: ndarray::Array2<f64>) -> Result<Self, KernelError> {
        let (height, width) = pixels.dim();
        check_size(width, height)?;
        let bbox = BoundingBox::centered(width, height);
        Ok(Self {
            image: Image::from_array(pixels, bbox.min_x, bbox.min_y),
        })
    }

    /// Kernel whose stencil is `image`'s pixels, re-centered on the local origin
    pub fn from_image(image: &Image) -> Result<Self, KernelError> {
        Self::new(image.array().clone())
    }

    pub fn image(&self) -> &Image {
        &self.image
    }
}

impl Kernel for FixedKernel {
    fn width(&self) -> usize {
        self.image.width()
    }

    fn height(&self) -> usize {
        self.image.height()
    }

    fn is_spatially_varying(&self) -> bool {
        false
    }

    fn evaluate(&self, _position: &Point2D) -> Result<Image, KernelError> {
        Ok(self.image.clone())
    }

    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn Kernel>, KernelError> {
        check_size(width, height)?;
        Ok(Box::new(Self {
            image: self.image.reframed(&BoundingBox::centered(width, height)),
        }))
    }

    fn clone_kernel(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}
