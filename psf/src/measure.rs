//! Summary measurements built on PSF images: moments, aperture sums and
//! PSF-weighted photometry.

use psf_math::{Image, Point2D};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::PsfError;
use crate::model::PsfModel;

/// Second central moments of an image, in pixels squared
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsfShape {
    pub ixx: f64,
    pub iyy: f64,
    pub ixy: f64,
}

impl PsfShape {
    /// Flux-weighted moments about the image centroid. `None` if the image has no flux.
    pub fn from_image(image: &Image) -> Option<Self> {
        let total = image.sum();
        if !total.is_finite() || total == 0.0 {
            return None;
        }

        let mut sx = 0.0;
        let mut sy = 0.0;
        for ((row, col), value) in image.array().indexed_iter() {
            sx += value * (image.x0() + col as i32) as f64;
            sy += value * (image.y0() + row as i32) as f64;
        }
        let (cx, cy) = (sx / total, sy / total);

        let mut ixx = 0.0;
        let mut iyy = 0.0;
        let mut ixy = 0.0;
        for ((row, col), value) in image.array().indexed_iter() {
            let dx = (image.x0() + col as i32) as f64 - cx;
            let dy = (image.y0() + row as i32) as f64 - cy;
            ixx += value * dx * dx;
            iyy += value * dy * dy;
            ixy += value * dx * dy;
        }
        Some(Self {
            ixx: ixx / total,
            iyy: iyy / total,
            ixy: ixy / total,
        })
    }

    pub fn trace(&self) -> f64 {
        self.ixx + self.iyy
    }

    /// `(ixx * iyy - ixy^2)^(1/4)`, the geometric-mean sigma
    pub fn determinant_radius(&self) -> f64 {
        (self.ixx * self.iyy - self.ixy * self.ixy).max(0.0).powf(0.25)
    }

    pub fn e1(&self) -> f64 {
        (self.ixx - self.iyy) / self.trace()
    }

    pub fn e2(&self) -> f64 {
        2.0 * self.ixy / self.trace()
    }

    /// `sqrt((ixx + iyy) / 2)`
    pub fn rms(&self) -> f64 {
        (0.5 * self.trace()).sqrt()
    }
}

/// Sum of pixels whose centers lie within `radius` of the local origin
pub(crate) fn aperture_sum(image: &Image, radius: f64) -> f64 {
    let r2 = radius * radius;
    image
        .array()
        .indexed_iter()
        .filter(|((row, col), _)| {
            let dx = (image.x0() + *col as i32) as f64;
            let dy = (image.y0() + *row as i32) as f64;
            dx * dx + dy * dy <= r2
        })
        .map(|(_, value)| value)
        .sum()
}

/// Result of PSF-weighted photometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsfFlux {
    pub flux: f64,
    /// Present when a variance plane was supplied
    pub flux_err: Option<f64>,
}

/// Flux of a point source at `center`, measured by weighting `image` with the PSF.
///
/// With weights `w` from [`PsfModel::compute_image`], the estimate is
/// `sum(w * I) * sum(w) / sum(w^2)`, which is unbiased for a source that is exactly
/// the PSF. Only pixels in both the PSF image and `image` contribute to `sum(w * I)`.
pub fn psf_flux(
    image: &Image,
    variance: Option<&Image>,
    psf: &dyn PsfModel,
    center: &Point2D,
    color: &Color,
) -> Result<PsfFlux, PsfError> {
    if let Some(variance) = variance {
        if variance.bbox() != image.bbox() {
            return Err(PsfError::InvalidArgument(format!(
                "variance plane {} does not match image {}",
                variance.bbox(),
                image.bbox()
            )));
        }
    }

    let weights = psf.compute_image(center, color)?;
    let overlap = weights.bbox().intersection(&image.bbox()).ok_or_else(|| {
        PsfError::computation(center, color, "PSF footprint does not overlap the image")
    })?;

    let mut sum_wi = 0.0;
    let mut sum_wv = 0.0;
    for y in overlap.min_y..=overlap.max_y() {
        for x in overlap.min_x..=overlap.max_x() {
            let (Some(w), Some(i)) = (weights.get(x, y), image.get(x, y)) else {
                continue;
            };
            sum_wi += w * i;
            if let Some(v) = variance.and_then(|v| v.get(x, y)) {
                sum_wv += w * w * v;
            }
        }
    }

    let sum_w = weights.sum();
    let sum_w2: f64 = weights.array().iter().map(|w| w * w).sum();
    if sum_w2 == 0.0 {
        return Err(PsfError::computation(center, color, "PSF image is empty"));
    }

    Ok(PsfFlux {
        flux: sum_wi * sum_w / sum_w2,
        flux_err: variance.map(|_| sum_wv.sqrt() * sum_w.abs() / sum_w2),
    })
}
