//! Error type shared by every PSF model

use psf_math::Point2D;
use thiserror::Error;

use crate::color::Color;

/// Failures surfaced by PSF evaluation.
///
/// All variants are deterministic in (model, position, color): retrying the same
/// request fails the same way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PsfError {
    /// Malformed request rejected before any computation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Well-formed request the model or its transform cannot satisfy
    #[error("cannot compute PSF at ({x:.3}, {y:.3}) for {color}: {reason}")]
    Computation {
        x: f64,
        y: f64,
        color: Color,
        reason: String,
    },

    /// A computed image disagrees with the box the model reported for it
    #[error("internal consistency failure: {0}")]
    Consistency(String),
}

impl PsfError {
    pub fn computation(position: &Point2D, color: &Color, reason: impl Into<String>) -> Self {
        PsfError::Computation {
            x: position.x,
            y: position.y,
            color: color.clone(),
            reason: reason.into(),
        }
    }

    pub fn is_computation(&self) -> bool {
        matches!(self, PsfError::Computation { .. })
    }
}
