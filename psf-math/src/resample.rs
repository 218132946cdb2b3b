//! Image resampling through an arbitrary point mapping.
//!
//! [`resample`] fills a destination grid by mapping every destination pixel center into
//! the source frame and interpolating the source there. A destination pixel only gets a
//! value when the interpolation footprint around its source position lies entirely
//! inside the source image; anything else (including pixels the mapping cannot place)
//! is left at exactly zero. Callers that need clean edges must therefore hand in a
//! source image padded beyond the region they care about.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point2D};
use crate::image::Image;

// Offsets closer than this to a whole pixel are treated as landing on it exactly
const EXACT_HIT: f64 = 1e-12;

/// Interpolation rule used when sampling between pixel centers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interpolation {
    /// Linear in x and y over the 2x2 neighborhood
    Bilinear,
    /// Separable windowed sinc over a `2 * order` square neighborhood
    Lanczos { order: u32 },
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Lanczos { order: 3 }
    }
}

impl Interpolation {
    /// Number of source pixels the footprint reaches on each side of the sample point
    pub fn half_width(&self) -> i32 {
        match self {
            Interpolation::Bilinear => 1,
            Interpolation::Lanczos { order } => (*order).max(1) as i32,
        }
    }

    /// Normalized 1-D weights for pixels `floor(x) - half_width + 1 ..= floor(x) + half_width`
    fn weights(&self, frac: f64) -> Vec<f64> {
        let hw = self.half_width();
        let mut weights: Vec<f64> = ((1 - hw)..=hw)
            .map(|k| {
                let t = frac - k as f64;
                match self {
                    Interpolation::Bilinear => (1.0 - t.abs()).max(0.0),
                    Interpolation::Lanczos { .. } => lanczos(t, hw as f64),
                }
            })
            .collect();

        let total: f64 = weights.iter().sum();
        if total != 0.0 {
            weights.iter_mut().for_each(|w| *w /= total);
        }
        weights
    }

    /// Interpolated value of `source` at an absolute position.
    ///
    /// Returns `None` when the footprint is not fully inside the source.
    pub fn interpolate(&self, source: &Image, point: &Point2D) -> Option<f64> {
        let (ix, fx) = split(point.x);
        let (iy, fy) = split(point.y);
        let hw = self.half_width();

        let footprint = BoundingBox::from_corners(ix - hw + 1, iy - hw + 1, ix + hw, iy + hw);
        if !source.bbox().contains(&footprint) {
            return None;
        }

        if fx == 0.0 && fy == 0.0 {
            return source.get(ix, iy);
        }

        let wx = self.weights(fx);
        let wy = self.weights(fy);
        let col0 = (footprint.min_x - source.x0()) as usize;
        let row0 = (footprint.min_y - source.y0()) as usize;
        let array = source.array();

        let mut value = 0.0;
        for (j, wyj) in wy.iter().enumerate() {
            if *wyj == 0.0 {
                continue;
            }
            let row_sum: f64 = wx
                .iter()
                .enumerate()
                .map(|(i, wxi)| wxi * array[[row0 + j, col0 + i]])
                .sum();
            value += wyj * row_sum;
        }
        Some(value)
    }
}

/// Integer part and fractional offset, snapping near-integers onto the integer
fn split(x: f64) -> (i32, f64) {
    let nearest = x.round();
    if (x - nearest).abs() < EXACT_HIT {
        return (nearest as i32, 0.0);
    }
    let floor = x.floor();
    (floor as i32, x - floor)
}

fn lanczos(t: f64, order: f64) -> f64 {
    if t.abs() < EXACT_HIT {
        return 1.0;
    }
    if t.abs() >= order {
        return 0.0;
    }
    let pt = PI * t;
    order * pt.sin() * (pt / order).sin() / (pt * pt)
}

/// Resample `source` onto `dest_bbox`.
///
/// `map` takes an absolute destination pixel center and returns the matching absolute
/// source position, or `None` if there is none. Uncovered pixels are zero.
pub fn resample<F>(
    source: &Image,
    dest_bbox: BoundingBox,
    interpolation: Interpolation,
    mut map: F,
) -> Image
where
    F: FnMut(&Point2D) -> Option<Point2D>,
{
    let mut uncovered = 0usize;
    let image = Image::from_fn(dest_bbox, |x, y| {
        map(&Point2D::new(x as f64, y as f64))
            .and_then(|src| interpolation.interpolate(source, &src))
            .unwrap_or_else(|| {
                uncovered += 1;
                0.0
            })
    });

    if uncovered > 0 {
        log::trace!(
            "resample: {uncovered} of {} destination pixels had no source coverage",
            dest_bbox.pixel_count()
        );
    }
    image
}
