//! Tunable constants of the PSF engine.
//!
//! Neither constant has an analytic derivation; both trade cost against accuracy and
//! can be overridden per model or loaded from a JSON file:
//!
//! ```json
//! {
//!   "cache_tolerance": 0.01,
//!   "warp": { "interpolation": { "kind": "lanczos", "order": 3 }, "padding": 2 }
//! }
//! ```

use std::path::Path;

use psf_math::Interpolation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PsfError;

/// Default cache-key quantization step, in pixels
pub const DEFAULT_CACHE_TOLERANCE: f64 = 0.01;

/// Default extra source margin for warping, in pixels beyond the interpolation support
pub const DEFAULT_WARP_PADDING: u32 = 2;

/// Largest warped kernel, in pixels per side, that a warp may produce or read from its
/// underlying model. Larger boxes mean the local scale of the transform is far outside
/// what a PSF stencil can represent, and the request fails instead of allocating.
pub const MAX_WARP_EXTENT: usize = 4096;

/// Errors reading or writing a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] PsfError),
}

/// Controls for [`WarpedPsf`](crate::WarpedPsf) resampling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    /// Interpolation rule used to resample the source PSF
    pub interpolation: Interpolation,
    /// Source pixels evaluated beyond what the interpolation footprint needs, to absorb
    /// the nonlinearity the local linearization ignores
    pub padding: u32,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::default(),
            padding: DEFAULT_WARP_PADDING,
        }
    }
}

/// Engine-wide tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsfConfig {
    /// Positions closer than this (per axis) share a cache entry
    pub cache_tolerance: f64,
    pub warp: WarpConfig,
}

impl Default for PsfConfig {
    fn default() -> Self {
        Self {
            cache_tolerance: DEFAULT_CACHE_TOLERANCE,
            warp: WarpConfig::default(),
        }
    }
}

impl PsfConfig {
    pub fn validate(&self) -> Result<(), PsfError> {
        if !(self.cache_tolerance.is_finite() && self.cache_tolerance > 0.0) {
            return Err(PsfError::InvalidArgument(format!(
                "cache tolerance must be positive, got {}",
                self.cache_tolerance
            )));
        }
        if let Interpolation::Lanczos { order: 0 } = self.warp.interpolation {
            return Err(PsfError::InvalidArgument(
                "Lanczos interpolation order must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a JSON config file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        log::debug!("Loaded PSF config from {}: {config:?}", path.display());
        Ok(config)
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
