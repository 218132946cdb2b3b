//! Points and integer pixel boxes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Real-valued position in a pixel coordinate frame.
pub type Point2D = nalgebra::Point2<f64>;

// Slack applied before rounding corner coordinates outward, so that a corner landing
// a few ulps past an integer does not grow the box by a whole pixel.
const HULL_SLACK: f64 = 1e-9;

/// Integer pixel rectangle
///
/// Described by its minimum corner and extent. Both corners are inclusive pixel
/// coordinates, so a box with `min_x = -3` and `width = 7` spans `-3..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum x pixel coordinate (inclusive)
    pub min_x: i32,
    /// Minimum y pixel coordinate (inclusive)
    pub min_y: i32,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl BoundingBox {
    /// Create a box from its minimum corner and extent
    pub fn new(min_x: i32, min_y: i32, width: usize, height: usize) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    /// Create a box from inclusive corners. Inverted corners yield an empty box.
    pub fn from_corners(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        let width = (max_x as i64 - min_x as i64 + 1).max(0) as usize;
        let height = (max_y as i64 - min_y as i64 + 1).max(0) as usize;
        Self::new(min_x, min_y, width, height)
    }

    /// Box of the given size whose center pixel sits on the origin.
    ///
    /// The center pixel is `(width - 1) / 2` from the minimum corner, so even sizes
    /// extend one pixel further in the positive direction.
    pub fn centered(width: usize, height: usize) -> Self {
        let ctr_x = (width.max(1) as i32 - 1) / 2;
        let ctr_y = (height.max(1) as i32 - 1) / 2;
        Self::new(-ctr_x, -ctr_y, width, height)
    }

    /// Smallest box containing every point, rounding outward to whole pixels
    pub fn enclosing(points: &[Point2D]) -> Self {
        if points.is_empty() {
            return Self::new(0, 0, 0, 0);
        }

        let mut lo_x = f64::INFINITY;
        let mut lo_y = f64::INFINITY;
        let mut hi_x = f64::NEG_INFINITY;
        let mut hi_y = f64::NEG_INFINITY;
        for p in points {
            lo_x = lo_x.min(p.x);
            lo_y = lo_y.min(p.y);
            hi_x = hi_x.max(p.x);
            hi_y = hi_y.max(p.y);
        }

        Self::from_corners(
            (lo_x + HULL_SLACK).floor() as i32,
            (lo_y + HULL_SLACK).floor() as i32,
            (hi_x - HULL_SLACK).ceil() as i32,
            (hi_y - HULL_SLACK).ceil() as i32,
        )
    }

    /// Maximum x pixel coordinate (inclusive)
    pub fn max_x(&self) -> i32 {
        self.min_x + self.width as i32 - 1
    }

    /// Maximum y pixel coordinate (inclusive)
    pub fn max_y(&self) -> i32 {
        self.min_y + self.height as i32 - 1
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Real-valued positions of the four corner pixel centers
    pub fn corners(&self) -> [Point2D; 4] {
        let (x0, y0) = (self.min_x as f64, self.min_y as f64);
        let (x1, y1) = (self.max_x() as f64, self.max_y() as f64);
        [
            Point2D::new(x0, y0),
            Point2D::new(x1, y0),
            Point2D::new(x0, y1),
            Point2D::new(x1, y1),
        ]
    }

    pub fn contains_pixel(&self, x: i32, y: i32) -> bool {
        !self.is_empty()
            && x >= self.min_x
            && x <= self.max_x()
            && y >= self.min_y
            && y <= self.max_y()
    }

    /// True if `other` lies entirely inside this box
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.is_empty()
            || (self.contains_pixel(other.min_x, other.min_y)
                && self.contains_pixel(other.max_x(), other.max_y()))
    }

    /// Same extent, origin moved by `(dx, dy)`
    pub fn shifted(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.min_x + dx, self.min_y + dy, self.width, self.height)
    }

    /// Like [`shifted`](Self::shifted), or `None` if either corner would leave the
    /// `i32` pixel range
    pub fn checked_shifted(&self, dx: i32, dy: i32) -> Option<Self> {
        let min_x = self.min_x.checked_add(dx)?;
        let min_y = self.min_y.checked_add(dy)?;
        let max_x = self.min_x as i64 + self.width as i64 - 1 + dx as i64;
        let max_y = self.min_y as i64 + self.height as i64 - 1 + dy as i64;
        if max_x > i32::MAX as i64 || max_y > i32::MAX as i64 {
            return None;
        }
        Some(Self::new(min_x, min_y, self.width, self.height))
    }

    /// Grow the box by `dx` pixels on the left and right and `dy` on top and bottom
    pub fn dilated(&self, dx: i32, dy: i32) -> Self {
        Self::from_corners(
            self.min_x - dx,
            self.min_y - dy,
            self.max_x() + dx,
            self.max_y() + dy,
        )
    }

    /// Smallest box holding both boxes
    pub fn union(&self, other: &BoundingBox) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::from_corners(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }

    /// Overlap of the two boxes, or `None` if they do not intersect
    pub fn intersection(&self, other: &BoundingBox) -> Option<Self> {
        let clipped = Self::from_corners(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x().min(other.max_x()),
            self.max_y().min(other.max_y()),
        );
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Box symmetric about the origin that still covers this one
    pub fn symmetrized(&self) -> Self {
        let half_x = self.min_x.abs().max(self.max_x().abs());
        let half_y = self.min_y.abs().max(self.max_y().abs());
        Self::from_corners(-half_x, -half_y, half_x, half_y)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}, {})..=({}, {}) [{}x{}]",
            self.min_x,
            self.min_y,
            self.max_x(),
            self.max_y(),
            self.width,
            self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_odd() {
        let bbox = BoundingBox::centered(7, 5);
        assert_eq!((bbox.min_x, bbox.max_x()), (-3, 3));
        assert_eq!((bbox.min_y, bbox.max_y()), (-2, 2));
    }

    #[test]
    fn test_centered_even() {
        let bbox = BoundingBox::centered(8, 8);
        assert_eq!((bbox.min_x, bbox.max_x()), (-3, 4));
    }

    #[test]
    fn test_enclosing_rounds_outward() {
        let points = [Point2D::new(-2.5, 0.1), Point2D::new(3.2, 4.0)];
        let bbox = BoundingBox::enclosing(&points);
        assert_eq!(bbox, BoundingBox::from_corners(-3, 0, 4, 4));
    }

    #[test]
    fn test_enclosing_ignores_roundoff() {
        let points = [
            Point2D::new(-3.0 - 1e-13, -3.0),
            Point2D::new(3.0 + 1e-13, 3.0),
        ];
        let bbox = BoundingBox::enclosing(&points);
        assert_eq!(bbox, BoundingBox::centered(7, 7));
    }

    #[test]
    fn test_inverted_corners_are_empty() {
        let bbox = BoundingBox::from_corners(5, 5, 2, 9);
        assert!(bbox.is_empty());
        assert_eq!(bbox.pixel_count(), 0);
    }

    #[test]
    fn test_full_range_corners_do_not_overflow() {
        let bbox = BoundingBox::from_corners(i32::MIN, 0, i32::MAX, 0);
        assert_eq!(bbox.width, 1 << 32);
    }

    #[test]
    fn test_checked_shift() {
        let bbox = BoundingBox::centered(7, 7);
        assert_eq!(bbox.checked_shifted(5, 6), Some(bbox.shifted(5, 6)));
        assert_eq!(
            bbox.checked_shifted(i32::MAX - 3, 0).map(|b| b.max_x()),
            Some(i32::MAX)
        );
        assert_eq!(bbox.checked_shifted(i32::MAX - 2, 0), None);
        assert_eq!(bbox.checked_shifted(0, i32::MIN), None);
    }

    #[test]
    fn test_contains_and_dilate() {
        let inner = BoundingBox::centered(5, 5);
        let outer = inner.dilated(2, 1);
        assert_eq!(outer.width, 9);
        assert_eq!(outer.height, 7);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_intersection() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, -5, 10, 10);
        assert_eq!(a.intersection(&b), Some(BoundingBox::from_corners(5, 0, 9, 4)));
        assert_eq!(a.intersection(&BoundingBox::new(20, 20, 2, 2)), None);
    }

    #[test]
    fn test_symmetrized() {
        let bbox = BoundingBox::from_corners(-2, -6, 4, 1).symmetrized();
        assert_eq!(bbox, BoundingBox::from_corners(-4, -6, 4, 6));
    }

    #[test]
    fn test_display() {
        let bbox = BoundingBox::centered(3, 3);
        assert_eq!(format!("{bbox}"), "(-1, -1)..=(1, 1) [3x3]");
    }
}
