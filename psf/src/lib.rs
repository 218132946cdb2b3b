//! Point-spread function models.
//!
//! A [`PsfModel`] answers "what image does a point source at this position and color
//! leave on the detector". Every model caches its most recent kernel image and its
//! most recent placed image, and hands out `Arc<Image>` so repeated requests for the
//! same position are free.
//!
//! Two model families are provided:
//!
//! * [`KernelPsf`] wraps a pixel [`Kernel`](kernel::Kernel): analytic profiles,
//!   fixed stencils or principal-component combinations.
//! * [`WarpedPsf`] pushes any model through a [`Transform`](psf_math::Transform), for
//!   example from the focal plane onto a distorted detector.

pub mod batch;
pub mod cache;
pub mod color;
pub mod config;
pub mod error;
pub mod kernel;
pub mod kernel_psf;
pub mod measure;
pub mod model;
pub mod warped;

pub use batch::{compute_images_parallel, PsfRequest};
pub use cache::{CacheKey, CacheStats, ImageCache, PsfCaches};
pub use color::Color;
pub use config::{ConfigError, PsfConfig, WarpConfig};
pub use error::PsfError;
pub use kernel_psf::KernelPsf;
pub use measure::{psf_flux, PsfFlux, PsfShape};
pub use model::PsfModel;
pub use warped::WarpedPsf;

pub use psf_math::{BoundingBox, Image, Point2D};
