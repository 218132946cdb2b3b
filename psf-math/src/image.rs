//! `f64` pixel grids with an absolute origin.
//!
//! An [`Image`] stores its pixels in an `ndarray::Array2<f64>` and remembers which
//! absolute pixel coordinate its first element corresponds to. Array indices follow the
//! row-major convention used throughout the workspace: `array[[row, col]]` holds the
//! pixel at absolute `(x0 + col, y0 + row)`.

use ndarray::{s, Array2};
use thiserror::Error;

use crate::geometry::BoundingBox;

/// Errors raised by image accessors and reshaping operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("pixel ({x}, {y}) is outside image bounds {bbox}")]
    OutOfBounds { x: i32, y: i32, bbox: BoundingBox },

    #[error("region {requested} is not contained in image bounds {bbox}")]
    RegionOutOfBounds {
        requested: BoundingBox,
        bbox: BoundingBox,
    },

    #[error("cannot normalize an image whose pixel sum is {0}")]
    DegenerateSum(f64),
}

/// Real-valued image with an integer origin offset
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    array: Array2<f64>,
    x0: i32,
    y0: i32,
}

impl Image {
    /// Zero-filled image covering `bbox`
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            array: Array2::zeros((bbox.height, bbox.width)),
            x0: bbox.min_x,
            y0: bbox.min_y,
        }
    }

    /// Wrap an existing `(height, width)` array whose first pixel sits at `(x0, y0)`
    pub fn from_array(array: Array2<f64>, x0: i32, y0: i32) -> Self {
        Self { array, x0, y0 }
    }

    /// Image covering `bbox` with every pixel set from its absolute coordinates
    pub fn from_fn<F>(bbox: BoundingBox, mut f: F) -> Self
    where
        F: FnMut(i32, i32) -> f64,
    {
        let array = Array2::from_shape_fn((bbox.height, bbox.width), |(row, col)| {
            f(bbox.min_x + col as i32, bbox.min_y + row as i32)
        });
        Self::from_array(array, bbox.min_x, bbox.min_y)
    }

    pub fn width(&self) -> usize {
        self.array.ncols()
    }

    pub fn height(&self) -> usize {
        self.array.nrows()
    }

    pub fn x0(&self) -> i32 {
        self.x0
    }

    pub fn y0(&self) -> i32 {
        self.y0
    }

    /// Absolute pixel box this image occupies
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x0, self.y0, self.width(), self.height())
    }

    pub fn array(&self) -> &Array2<f64> {
        &self.array
    }

    pub fn array_mut(&mut self) -> &mut Array2<f64> {
        &mut self.array
    }

    pub fn into_array(self) -> Array2<f64> {
        self.array
    }

    /// Pixel value at absolute coordinates, `None` outside the image
    pub fn get(&self, x: i32, y: i32) -> Option<f64> {
        let (row, col) = self.index_of(x, y)?;
        Some(self.array[[row, col]])
    }

    /// Set the pixel at absolute coordinates
    pub fn set(&mut self, x: i32, y: i32, value: f64) -> Result<(), ImageError> {
        let (row, col) = self.index_of(x, y).ok_or(ImageError::OutOfBounds {
            x,
            y,
            bbox: self.bbox(),
        })?;
        self.array[[row, col]] = value;
        Ok(())
    }

    fn index_of(&self, x: i32, y: i32) -> Option<(usize, usize)> {
        if !self.bbox().contains_pixel(x, y) {
            return None;
        }
        Some(((y - self.y0) as usize, (x - self.x0) as usize))
    }

    pub fn sum(&self) -> f64 {
        self.array.sum()
    }

    /// Largest pixel value (`NEG_INFINITY` for an empty image)
    pub fn max_value(&self) -> f64 {
        self.array.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Scale pixels so they sum to one. Returns the sum before scaling.
    pub fn normalize(&mut self) -> Result<f64, ImageError> {
        let total = self.sum();
        if !total.is_finite() || total == 0.0 {
            return Err(ImageError::DegenerateSum(total));
        }
        self.array.mapv_inplace(|v| v / total);
        Ok(total)
    }

    /// Move the image without touching its pixels
    pub fn set_origin(&mut self, x0: i32, y0: i32) {
        self.x0 = x0;
        self.y0 = y0;
    }

    /// Copy of this image placed at a new origin
    pub fn with_origin(&self, x0: i32, y0: i32) -> Self {
        Self::from_array(self.array.clone(), x0, y0)
    }

    /// Sub-image covering `bbox`, which must lie inside this image
    pub fn cropped(&self, bbox: &BoundingBox) -> Result<Self, ImageError> {
        if !self.bbox().contains(bbox) {
            return Err(ImageError::RegionOutOfBounds {
                requested: *bbox,
                bbox: self.bbox(),
            });
        }
        let row0 = (bbox.min_y - self.y0) as usize;
        let col0 = (bbox.min_x - self.x0) as usize;
        let view = self
            .array
            .slice(s![row0..row0 + bbox.height, col0..col0 + bbox.width]);
        Ok(Self::from_array(view.to_owned(), bbox.min_x, bbox.min_y))
    }

    /// Image over `bbox` holding this image's pixels where the two overlap and zero
    /// elsewhere. Crops, pads, or both.
    pub fn reframed(&self, bbox: &BoundingBox) -> Self {
        let mut out = Self::new(*bbox);
        if let Some(overlap) = self.bbox().intersection(bbox) {
            let src_row = (overlap.min_y - self.y0) as usize;
            let src_col = (overlap.min_x - self.x0) as usize;
            let dst_row = (overlap.min_y - bbox.min_y) as usize;
            let dst_col = (overlap.min_x - bbox.min_x) as usize;
            out.array
                .slice_mut(s![
                    dst_row..dst_row + overlap.height,
                    dst_col..dst_col + overlap.width
                ])
                .assign(&self.array.slice(s![
                    src_row..src_row + overlap.height,
                    src_col..src_col + overlap.width
                ]));
        }
        out
    }
}
