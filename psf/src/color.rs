//! Photometric band tags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque band tag a PSF may depend on.
///
/// Two colors are the same request if and only if they compare equal. The default
/// value carries no band and means "band-independent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    band: Option<String>,
}

impl Color {
    /// Color tagged with a named band, e.g. `"r"` or `"i"`
    pub fn band(name: impl Into<String>) -> Self {
        Self {
            band: Some(name.into()),
        }
    }

    /// Band name, if any
    pub fn name(&self) -> Option<&str> {
        self.band.as_deref()
    }

    /// True for the band-independent default
    pub fn is_indeterminate(&self) -> bool {
        self.band.is_none()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.band {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "<any band>"),
        }
    }
}
