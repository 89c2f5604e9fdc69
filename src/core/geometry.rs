//! Screen Geometry
//!
//! Entities live in normalized [0, 1] coordinates; taps arrive in pixels.
//! Hit tests convert the entity center into pixel space for the viewport the
//! tap came from, then compare a Euclidean distance against a pixel radius.

use std::fmt;
use serde::{Serialize, Deserialize};

/// A point in pixel space, as reported by the presentation layer.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X in pixels from the left edge
    pub x: f32,
    /// Y in pixels from the top edge
    pub y: f32,
}

impl Point {
    /// Create a new point.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({:.1}, {:.1})", self.x, self.y)
    }
}

/// Size of the surface a tap was made on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
}

impl Viewport {
    /// Create a new viewport.
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Map a normalized position to its pixel-space point.
    #[inline]
    pub fn to_pixels(self, x: f32, y: f32) -> Point {
        Point::new(x * self.width, y * self.height)
    }

    /// Check whether `point` lies within `reach` pixels of the normalized
    /// center `(x, y)`.
    #[inline]
    pub fn within(self, point: Point, x: f32, y: f32, reach: f32) -> bool {
        point.distance(self.to_pixels(x, y)) <= reach
    }
}

/// Clamp a normalized coordinate into [0, 1].
///
/// NaN collapses to 0 so a corrupted coordinate can never escape the field.
#[inline]
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

// =============================================================================
// TESTS
// =============================================================================
