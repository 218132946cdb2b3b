//! Pixel-space primitives used by the PSF engine.
//!
//! This crate holds the pieces the PSF models lean on but do not own:
//!
//! - **Geometry**: real-valued points and integer bounding boxes
//! - **Images**: `f64` pixel grids carrying an absolute origin
//! - **Transforms**: forward/inverse coordinate mappings with local linearization
//! - **Resampling**: pulling a source image through a mapping onto a destination grid

pub mod geometry;
pub mod image;
pub mod resample;
pub mod transform;

pub use geometry::{BoundingBox, Point2D};
pub use image::{Image, ImageError};
pub use resample::{resample, Interpolation};
pub use transform::{
    AffineTransform, IdentityTransform, PolynomialTransform, Transform, TransformError,
};
