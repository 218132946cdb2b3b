use psf_math::{BoundingBox, Image, Point2D};

use crate::cache::PsfCaches;
use crate::color::Color;
use crate::config::PsfConfig;
use crate::error::PsfError;
use crate::kernel::{
    AnalyticKernel, DoubleGaussianFunction2, Kernel, KernelError, LinearCombinationKernel,
};
use crate::model::PsfModel;

/// PSF whose kernel image is a normalized [`Kernel`] stencil.
///
/// Color is ignored: the kernel is the same in every band.
#[derive(Debug, Clone)]
pub struct KernelPsf {
    kernel: Box<dyn Kernel>,
    average_position: Point2D,
    caches: PsfCaches,
}

impl KernelPsf {
    pub fn new(kernel: impl Kernel + 'static, average_position: Point2D) -> Self {
        Self::from_boxed(Box::new(kernel), average_position)
    }

    pub fn from_boxed(kernel: Box<dyn Kernel>, average_position: Point2D) -> Self {
        log::debug!(
            "KernelPsf: {}x{} kernel, spatially {}",
            kernel.width(),
            kernel.height(),
            if kernel.is_spatially_varying() {
                "varying"
            } else {
                "invariant"
            }
        );
        Self {
            kernel,
            average_position,
            caches: PsfCaches::default(),
        }
    }

    /// Circular double Gaussian on a `width x height` stencil. `sigma2 = 0` gives a
    /// single Gaussian.
    pub fn double_gaussian(
        width: usize,
        height: usize,
        sigma1: f64,
        sigma2: f64,
        b: f64,
    ) -> Result<Self, PsfError> {
        let function = DoubleGaussianFunction2::new(sigma1, sigma2, b);
        let kernel = AnalyticKernel::new(width, height, function).map_err(invalid)?;
        Ok(Self::new(kernel, Point2D::origin()))
    }

    /// Principal-component PSF from a mean image plus spatially weighted eigen-images
    pub fn pca(kernel: LinearCombinationKernel, average_position: Point2D) -> Self {
        Self::new(kernel, average_position)
    }

    /// Apply engine tunables. Resets the caches.
    pub fn with_config(mut self, config: &PsfConfig) -> Result<Self, PsfError> {
        config.validate()?;
        self.caches = PsfCaches::new(config.cache_tolerance)?;
        Ok(self)
    }

    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }
}

fn invalid(err: KernelError) -> PsfError {
    PsfError::InvalidArgument(err.to_string())
}

impl PsfModel for KernelPsf {
    fn do_compute_kernel_image(
        &self,
        position: &Point2D,
        color: &Color,
    ) -> Result<Image, PsfError> {
        self.kernel
            .compute_image(position, true)
            .map_err(|err| PsfError::computation(position, color, err.to_string()))
    }

    fn do_compute_bbox(&self, _position: &Point2D, _color: &Color) -> Result<BoundingBox, PsfError> {
        Ok(self.kernel.bbox())
    }

    fn is_spatially_invariant(&self) -> bool {
        !self.kernel.is_spatially_varying()
    }

    fn average_position(&self) -> Point2D {
        self.average_position
    }

    fn clone_psf(&self) -> Box<dyn PsfModel> {
        Box::new(self.clone())
    }

    fn resized(&self, width: i32, height: i32) -> Result<Box<dyn PsfModel>, PsfError> {
        if width <= 0 || height <= 0 {
            return Err(PsfError::InvalidArgument(format!(
                "resized dimensions must be positive, got {width}x{height}"
            )));
        }
        let kernel = self
            .kernel
            .resized(width as usize, height as usize)
            .map_err(invalid)?;
        Ok(Box::new(Self {
            kernel,
            average_position: self.average_position,
            caches: self.caches.clone(),
        }))
    }

    fn caches(&self) -> &PsfCaches {
        &self.caches
    }
}
