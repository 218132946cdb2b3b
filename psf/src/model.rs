//! The polymorphic PSF contract.
//!
//! Concrete models implement the `do_*` hooks plus a handful of descriptive methods;
//! every public computation ([`PsfModel::compute_kernel_image`],
//! [`PsfModel::compute_image`], the bounding boxes and the summary statistics) is a
//! provided method, so caching, placement and consistency checks behave identically
//! for every model.

use std::fmt;
use std::sync::Arc;

use psf_math::{BoundingBox, Image, Point2D};

use crate::cache::{CacheKey, PsfCaches};
use crate::color::Color;
use crate::error::PsfError;
use crate::measure::{self, PsfShape};

/// Pixel whose center is nearest to `value`, or `None` outside the `i32` pixel range
pub fn nearest_pixel(value: f64) -> Option<i32> {
    let pixel = (value + 0.5).floor();
    (pixel >= i32::MIN as f64 && pixel <= i32::MAX as f64).then_some(pixel as i32)
}

fn ensure_finite(position: &Point2D, color: &Color) -> Result<(), PsfError> {
    if position.x.is_finite() && position.y.is_finite() {
        Ok(())
    } else {
        Err(PsfError::computation(position, color, "position is not finite"))
    }
}

/// `bbox` moved onto the pixel nearest `position`
fn placed(
    bbox: &BoundingBox,
    position: &Point2D,
    color: &Color,
) -> Result<BoundingBox, PsfError> {
    nearest_pixel(position.x)
        .zip(nearest_pixel(position.y))
        .and_then(|(dx, dy)| bbox.checked_shifted(dx, dy))
        .ok_or_else(|| {
            PsfError::computation(
                position,
                color,
                "position is outside the pixel coordinate range",
            )
        })
}

fn ensure_matches(expected: &BoundingBox, image: &Image) -> Result<(), PsfError> {
    if image.bbox() != *expected {
        return Err(PsfError::Consistency(format!(
            "computed image covers {} but the model reports {expected}",
            image.bbox()
        )));
    }
    Ok(())
}

/// A point-spread function: the normalized image a point source leaves on the
/// detector, as a function of position and color.
///
/// Kernel images live in a local frame with the source at pixel `(0, 0)`. Placed
/// images are the same pixels shifted so the local origin lands on the pixel nearest
/// the requested position.
pub trait PsfModel: Send + Sync + fmt::Debug {
    /// Uncached kernel image, normalized to unit sum, covering exactly
    /// [`do_compute_bbox`](Self::do_compute_bbox)
    fn do_compute_kernel_image(&self, position: &Point2D, color: &Color)
        -> Result<Image, PsfError>;

    /// Kernel-local box the kernel image at this position will cover
    fn do_compute_bbox(&self, position: &Point2D, color: &Color) -> Result<BoundingBox, PsfError>;

    /// True if the kernel image is the same at every position
    fn is_spatially_invariant(&self) -> bool {
        false
    }

    /// Position at which the model is most representative
    fn average_position(&self) -> Point2D;

    /// Independent copy with the same parameters and empty caches
    fn clone_psf(&self) -> Box<dyn PsfModel>;

    /// Copy whose kernel images cover a `width x height` box centered on the origin
    fn resized(&self, width: i32, height: i32) -> Result<Box<dyn PsfModel>, PsfError>;

    fn caches(&self) -> &PsfCaches;

    /// Kernel image at `position`, served from the kernel slot when the request matches
    /// the previous one. Spatially invariant models ignore position when matching.
    fn compute_kernel_image(
        &self,
        position: &Point2D,
        color: &Color,
    ) -> Result<Arc<Image>, PsfError> {
        ensure_finite(position, color)?;
        let caches = self.caches();
        let key = if self.is_spatially_invariant() {
            CacheKey::position_independent(color)
        } else {
            CacheKey::quantized(position, color, caches.tolerance())
        };
        caches.kernel_image().get_or_compute(key, || {
            let image = self.do_compute_kernel_image(position, color)?;
            ensure_matches(&self.do_compute_bbox(position, color)?, &image)?;
            Ok(image)
        })
    }

    /// Kernel image placed at `position`, served from the image slot.
    ///
    /// Always keyed on position, since placement depends on it even when the kernel
    /// does not. Never reads or disturbs the kernel slot.
    fn compute_image(&self, position: &Point2D, color: &Color) -> Result<Arc<Image>, PsfError> {
        ensure_finite(position, color)?;
        let caches = self.caches();
        let key = CacheKey::quantized(position, color, caches.tolerance());
        caches.image().get_or_compute(key, || {
            let mut image = self.do_compute_kernel_image(position, color)?;
            ensure_matches(&self.do_compute_bbox(position, color)?, &image)?;
            let bbox = placed(&image.bbox(), position, color)?;
            image.set_origin(bbox.min_x, bbox.min_y);
            Ok(image)
        })
    }

    /// Kernel-local bounding box
    fn compute_bbox(&self, position: &Point2D, color: &Color) -> Result<BoundingBox, PsfError> {
        ensure_finite(position, color)?;
        self.do_compute_bbox(position, color)
    }

    /// Bounding box of [`compute_image`](Self::compute_image) at `position`
    fn compute_image_bbox(
        &self,
        position: &Point2D,
        color: &Color,
    ) -> Result<BoundingBox, PsfError> {
        let bbox = self.compute_bbox(position, color)?;
        placed(&bbox, position, color)
    }

    /// Value of the kernel image at its center pixel
    fn compute_peak(&self, position: &Point2D, color: &Color) -> Result<f64, PsfError> {
        let image = self.compute_kernel_image(position, color)?;
        image.get(0, 0).ok_or_else(|| {
            PsfError::Consistency(format!(
                "kernel image {} does not contain its center pixel",
                image.bbox()
            ))
        })
    }

    /// Kernel-image flux inside a circle of `radius` pixels around the center
    fn compute_aperture_flux(
        &self,
        radius: f64,
        position: &Point2D,
        color: &Color,
    ) -> Result<f64, PsfError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(PsfError::InvalidArgument(format!(
                "aperture radius must be positive, got {radius}"
            )));
        }
        let image = self.compute_kernel_image(position, color)?;
        Ok(measure::aperture_sum(&image, radius))
    }

    /// Second moments of the kernel image
    fn compute_shape(&self, position: &Point2D, color: &Color) -> Result<PsfShape, PsfError> {
        let image = self.compute_kernel_image(position, color)?;
        PsfShape::from_image(&image)
            .ok_or_else(|| PsfError::computation(position, color, "kernel image has no flux"))
    }
}

impl Clone for Box<dyn PsfModel> {
    fn clone(&self) -> Self {
        self.clone_psf()
    }
}
