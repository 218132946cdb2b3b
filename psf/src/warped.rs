//! A PSF seen through a geometric distortion.
//!
//! [`WarpedPsf`] wraps a model defined in a source frame and a [`Transform`] from
//! that frame to the destination frame. Its kernel image at a destination position is
//! the underlying kernel image at the matching source position, resampled through the
//! transform and renormalized.
//!
//! The destination box comes from the local linearization: the source box corners are
//! pushed through the linear part and the enclosing box is taken. Resampling uses the
//! exact inverse for every pixel, and the source image is evaluated over a region
//! large enough that no destination pixel falls off its edge.

use std::sync::Arc;

use psf_math::{resample, AffineTransform, BoundingBox, Image, Point2D, Transform};

use crate::cache::PsfCaches;
use crate::color::Color;
use crate::config::{PsfConfig, WarpConfig, MAX_WARP_EXTENT};
use crate::error::PsfError;
use crate::model::PsfModel;

// Resampled flux below this before renormalization means most of the PSF fell outside
// the source image
const NEARLY_EMPTY: f64 = 1e-3;

/// Geometry shared by the box and image computations
#[derive(Debug, Clone, Copy)]
struct WarpPlan {
    /// Source position matching the requested destination position
    src_position: Point2D,
    /// Kernel box of the underlying model at `src_position`
    natural_bbox: BoundingBox,
    /// Kernel box of the warped image
    dest_bbox: BoundingBox,
    /// Source-local region resampling must be able to read
    needed_bbox: BoundingBox,
}

#[derive(Debug, Clone)]
pub struct WarpedPsf {
    underlying: Box<dyn PsfModel>,
    transform: Arc<dyn Transform>,
    config: WarpConfig,
    /// Fixed destination kernel size, set by [`PsfModel::resized`]
    output_size: Option<(usize, usize)>,
    caches: PsfCaches,
}

impl WarpedPsf {
    /// Warp `underlying` (defined in the source frame) by `transform` (source to
    /// destination)
    pub fn new(underlying: Box<dyn PsfModel>, transform: Arc<dyn Transform>) -> Self {
        log::debug!("WarpedPsf over {underlying:?} through {transform:?}");
        Self {
            underlying,
            transform,
            config: WarpConfig::default(),
            output_size: None,
            caches: PsfCaches::default(),
        }
    }

    /// Apply engine tunables. Resets the caches.
    pub fn with_config(mut self, config: &PsfConfig) -> Result<Self, PsfError> {
        config.validate()?;
        self.config = config.warp;
        self.caches = PsfCaches::new(config.cache_tolerance)?;
        Ok(self)
    }

    pub fn underlying(&self) -> &dyn PsfModel {
        self.underlying.as_ref()
    }

    pub fn transform(&self) -> &Arc<dyn Transform> {
        &self.transform
    }

    pub fn warp_config(&self) -> &WarpConfig {
        &self.config
    }

    fn plan(&self, position: &Point2D, color: &Color) -> Result<WarpPlan, PsfError> {
        let src_position = self
            .transform
            .inverse(position)
            .map_err(|err| PsfError::computation(position, color, err.to_string()))?;

        let forward = self.transform.linearize(&src_position);
        let backward: AffineTransform = forward.inverted().map_err(|err| {
            log::warn!("degenerate warp at ({}, {}): {err}", position.x, position.y);
            PsfError::computation(position, color, err.to_string())
        })?;

        let natural_bbox = self.underlying.compute_bbox(&src_position, color)?;

        let dest_bbox = match self.output_size {
            Some((width, height)) => BoundingBox::centered(width, height),
            None => bounded_hull(&map_corners(&natural_bbox, &forward), position, color)?,
        };

        let reach = self.config.interpolation.half_width() + self.config.padding as i32;
        let needed_bbox = bounded_hull(&map_corners(&dest_bbox, &backward), position, color)?
            .dilated(reach, reach);

        log::trace!(
            "warp plan at ({:.3}, {:.3}): source {natural_bbox}, dest {dest_bbox}, needs {needed_bbox}",
            position.x,
            position.y
        );
        Ok(WarpPlan {
            src_position,
            natural_bbox,
            dest_bbox,
            needed_bbox,
        })
    }

    /// Underlying kernel image covering at least `plan.needed_bbox`
    fn source_image(&self, plan: &WarpPlan, color: &Color) -> Result<Arc<Image>, PsfError> {
        if plan.natural_bbox.contains(&plan.needed_bbox) {
            return self
                .underlying
                .compute_kernel_image(&plan.src_position, color);
        }

        let padded = plan.needed_bbox.union(&plan.natural_bbox).symmetrized();
        log::debug!(
            "padding source PSF from {} to {padded} for warping",
            plan.natural_bbox
        );
        let resized = self
            .underlying
            .resized(padded.width as i32, padded.height as i32)?;
        resized.compute_kernel_image(&plan.src_position, color)
    }
}

/// Pixel-center corners of `bbox` pushed through the linear part of `affine`
fn map_corners(bbox: &BoundingBox, affine: &AffineTransform) -> [Point2D; 4] {
    bbox.corners()
        .map(|corner| Point2D::from(affine.apply_linear(&corner.coords)))
}

/// Enclosing box of `corners`, refused once it would exceed [`MAX_WARP_EXTENT`]
fn bounded_hull(
    corners: &[Point2D; 4],
    position: &Point2D,
    color: &Color,
) -> Result<BoundingBox, PsfError> {
    let limit = MAX_WARP_EXTENT as f64;
    corners
        .iter()
        .all(|c| c.x.abs() <= limit && c.y.abs() <= limit)
        .then(|| BoundingBox::enclosing(corners))
        .filter(|bbox| bbox.width <= MAX_WARP_EXTENT && bbox.height <= MAX_WARP_EXTENT)
        .ok_or_else(|| {
            PsfError::computation(
                position,
                color,
                format!("warped kernel would exceed {MAX_WARP_EXTENT} pixels per side"),
            )
        })
}

impl PsfModel for WarpedPsf {
    fn do_compute_kernel_image(
        &self,
        position: &Point2D,
        color: &Color,
    ) -> Result<Image, PsfError> {
        let plan = self.plan(position, color)?;
        let source = self.source_image(&plan, color)?;

        let transform = &self.transform;
        let src_position = plan.src_position;
        let mut image = resample(
            &source,
            plan.dest_bbox,
            self.config.interpolation,
            |offset| {
                let dest = Point2D::new(position.x + offset.x, position.y + offset.y);
                transform
                    .inverse(&dest)
                    .ok()
                    .map(|src| Point2D::from(src - src_position))
            },
        );

        let total = image.normalize().map_err(|err| {
            PsfError::computation(position, color, format!("warped image is empty: {err}"))
        })?;
        if total.abs() < NEARLY_EMPTY {
            log::warn!(
                "warped PSF at ({:.3}, {:.3}) kept only {total:.3e} of its flux before renormalizing",
                position.x,
                position.y
            );
        } else {
            log::trace!("warped image renormalized from {total:.6}");
        }
        Ok(image)
    }

    fn do_compute_bbox(&self, position: &Point2D, color: &Color) -> Result<BoundingBox, PsfError> {
        Ok(self.plan(position, color)?.dest_bbox)
    }

    fn average_position(&self) -> Point2D {
        self.transform
            .forward(&self.underlying.average_position())
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
        if width as usize > MAX_WARP_EXTENT || height as usize > MAX_WARP_EXTENT {
            return Err(PsfError::InvalidArgument(format!(
                "resized dimensions {width}x{height} exceed {MAX_WARP_EXTENT} pixels per side"
            )));
        }
        Ok(Box::new(Self {
            output_size: Some((width as usize, height as usize)),
            ..self.clone()
        }))
    }

    fn caches(&self) -> &PsfCaches {
        &self.caches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel_psf::KernelPsf;
    use approx::assert_relative_eq;
    use psf_math::IdentityTransform;

    fn gaussian() -> Box<dyn PsfModel> {
        Box::new(KernelPsf::double_gaussian(9, 9, 1.5, 0.0, 0.0).unwrap())
    }

    #[test]
    fn test_identity_bbox_matches_underlying() {
        let warped = WarpedPsf::new(gaussian(), Arc::new(IdentityTransform));
        let bbox = warped
            .compute_bbox(&Point2D::new(3.0, 4.0), &Color::default())
            .unwrap();
        assert_eq!(bbox, BoundingBox::centered(9, 9));
    }

    #[test]
    fn test_scaling_grows_bbox() {
        let scale = AffineTransform::from_coefficients(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let warped = WarpedPsf::new(gaussian(), Arc::new(scale));
        let bbox = warped
            .compute_bbox(&Point2D::new(10.0, 10.0), &Color::default())
            .unwrap();
        assert_eq!(bbox, BoundingBox::centered(17, 17));
        let image = warped
            .compute_kernel_image(&Point2D::new(10.0, 10.0), &Color::default())
            .unwrap();
        assert_eq!(image.bbox(), bbox);
        assert_relative_eq!(image.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_transform_is_computation_error() {
        let collapse = AffineTransform::from_coefficients(1.0, 1.0, 1.0, 1.0, 0.0, 0.0);
        let warped = WarpedPsf::new(gaussian(), Arc::new(collapse));
        let err = warped
            .compute_kernel_image(&Point2D::new(1.0, 2.0), &Color::default())
            .unwrap_err();
        assert!(err.is_computation());
    }

    #[test]
    fn test_average_position_is_forwarded() {
        let shift = AffineTransform::from_coefficients(1.0, 0.0, 0.0, 1.0, 5.0, -2.0);
        let warped = WarpedPsf::new(gaussian(), Arc::new(shift));
        assert_eq!(warped.average_position(), Point2D::new(5.0, -2.0));
    }

    #[test]
    fn test_resized_fixes_output_size() {
        let warped = WarpedPsf::new(gaussian(), Arc::new(IdentityTransform));
        let small = warped.resized(5, 7).unwrap();
        let image = small
            .compute_kernel_image(&Point2D::new(0.0, 0.0), &Color::default())
            .unwrap();
        assert_eq!(image.bbox(), BoundingBox::centered(5, 7));
        assert_relative_eq!(image.sum(), 1.0, epsilon = 1e-12);
        assert!(warped.resized(-1, 5).is_err());
        assert!(matches!(
            warped.resized(MAX_WARP_EXTENT as i32 + 1, 5),
            Err(PsfError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_extreme_scale_is_refused() {
        let color = Color::default();
        let position = Point2D::new(2.0, 3.0);
        for scale in [1e4, 1e-5] {
            let affine = AffineTransform::from_coefficients(scale, 0.0, 0.0, scale, 0.0, 0.0);
            let warped = WarpedPsf::new(gaussian(), Arc::new(affine));
            assert!(warped.compute_bbox(&position, &color).unwrap_err().is_computation());
            assert!(warped
                .compute_kernel_image(&position, &color)
                .unwrap_err()
                .is_computation());
        }
    }
}
