//! Single-entry image caches keyed by quantized position and color.
//!
//! Every model owns one [`PsfCaches`], holding one slot for kernel images and one for
//! placed images. A lookup either returns the stored `Arc` (same allocation, no copy)
//! or computes a fresh image outside the lock and replaces whatever the slot held.
//! Concurrent misses on the same key may both compute; the last writer wins and both
//! callers still get a correct image.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use psf_math::{Image, Point2D};

use crate::color::Color;
use crate::config::DEFAULT_CACHE_TOLERANCE;
use crate::error::PsfError;

/// Snap a coordinate onto the tolerance grid
pub fn quantize(value: f64, tolerance: f64) -> i64 {
    (value / tolerance).round() as i64
}

/// Identity of a cached request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    position: Option<(i64, i64)>,
    color: Color,
}

impl CacheKey {
    /// Key for a position-dependent request
    pub fn quantized(position: &Point2D, color: &Color, tolerance: f64) -> Self {
        Self {
            position: Some((quantize(position.x, tolerance), quantize(position.y, tolerance))),
            color: color.clone(),
        }
    }

    /// Key that ignores position, for results that cannot depend on it
    pub fn position_independent(color: &Color) -> Self {
        Self {
            position: None,
            color: color.clone(),
        }
    }
}

/// Hit/miss counters of one slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct Entry {
    key: CacheKey,
    image: Arc<Image>,
}

/// One-slot memo of the most recent request
#[derive(Debug, Default)]
pub struct ImageCache {
    slot: Mutex<Option<Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the slot half-written, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Option<Entry>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached image for `key`, or compute, store and return a new one.
    ///
    /// The lock is held only for the lookup and for the final replace. A failed
    /// computation leaves the slot untouched.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<Arc<Image>, PsfError>
    where
        F: FnOnce() -> Result<Image, PsfError>,
    {
        {
            let slot = self.lock();
            if let Some(entry) = slot.as_ref() {
                if entry.key == key {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    log::trace!("cache hit for {key:?}");
                    return Ok(Arc::clone(&entry.image));
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let image = Arc::new(compute()?);

        let mut slot = self.lock();
        if let Some(old) = slot.as_ref() {
            log::debug!("cache evicting {:?} for {key:?}", old.key);
        }
        *slot = Some(Entry {
            key,
            image: Arc::clone(&image),
        });
        Ok(image)
    }

    /// Key of the stored entry, if any
    pub fn cached_key(&self) -> Option<CacheKey> {
        self.lock().as_ref().map(|entry| entry.key.clone())
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// The pair of caches every model carries.
///
/// Cloning yields empty caches with the same tolerance, so a cloned model never shares
/// or inherits cached images.
#[derive(Debug)]
pub struct PsfCaches {
    tolerance: f64,
    kernel_image: ImageCache,
    image: ImageCache,
}

impl PsfCaches {
    /// Empty caches quantizing positions to `tolerance` pixels
    pub fn new(tolerance: f64) -> Result<Self, PsfError> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(PsfError::InvalidArgument(format!(
                "cache tolerance must be positive, got {tolerance}"
            )));
        }
        Ok(Self {
            tolerance,
            kernel_image: ImageCache::new(),
            image: ImageCache::new(),
        })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Slot for kernel images (centered on the local origin)
    pub fn kernel_image(&self) -> &ImageCache {
        &self.kernel_image
    }

    /// Slot for images placed at their absolute position
    pub fn image(&self) -> &ImageCache {
        &self.image
    }

    pub fn clear(&self) {
        self.kernel_image.clear();
        self.image.clear();
    }
}

impl Default for PsfCaches {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_CACHE_TOLERANCE,
            kernel_image: ImageCache::new(),
            image: ImageCache::new(),
        }
    }
}

impl Clone for PsfCaches {
    fn clone(&self) -> Self {
        Self {
            tolerance: self.tolerance,
            kernel_image: ImageCache::new(),
            image: ImageCache::new(),
        }
    }
}
