//! Page-relative geometry for positioned fields
//!
//! All coordinates are page raster pixels with a top-left origin. The page
//! raster is a fixed logical canvas regardless of on-screen size.

use serde::{Deserialize, Serialize};

/// Logical page raster width in pixels
pub const PAGE_WIDTH: f64 = 1240.0;
/// Logical page raster height in pixels
pub const PAGE_HEIGHT: f64 = 1754.0;

/// Minimum field width enforced on create and resize
pub const MIN_FIELD_WIDTH: f64 = 50.0;
/// Minimum field height enforced on create and resize
pub const MIN_FIELD_HEIGHT: f64 = 30.0;

/// A pointer position in display or surface space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// An axis-aligned box on the page raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FieldRect {
    /// Geometry given to every newly placed field
    pub const DEFAULT: FieldRect = FieldRect {
        x: 100.0,
        y: 100.0,
        width: 200.0,
        height: 80.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rect for a newly created field, applying the placement invariant
    /// (`x >= 0`, `y >= 0`, `width >= 50`, `height >= 30`).
    pub fn for_create(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: clamp_min(x, 0.0),
            y: clamp_min(y, 0.0),
            width: clamp_min(width, MIN_FIELD_WIDTH),
            height: clamp_min(height, MIN_FIELD_HEIGHT),
        }
    }

    /// Move by a delta. The origin never goes negative; there is no upper clamp
    /// against the page bounds.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: clamp_min(self.x + dx, 0.0),
            y: clamp_min(self.y + dy, 0.0),
            ..*self
        }
    }

    /// Grow or shrink by a delta, never below the minimum field size
    pub fn resized(&self, dw: f64, dh: f64) -> Self {
        Self {
            width: clamp_min(self.width + dw, MIN_FIELD_WIDTH),
            height: clamp_min(self.height + dh, MIN_FIELD_HEIGHT),
            ..*self
        }
    }

    /// Multiply every component by a uniform scale factor
    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            x: self.x * scale,
            y: self.y * scale,
            width: self.width * scale,
            height: self.height * scale,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the rect lies entirely inside the page raster
    pub fn is_within_page(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= PAGE_WIDTH && self.bottom() <= PAGE_HEIGHT
    }
}

impl Default for FieldRect {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// NaN deltas collapse to the lower bound instead of poisoning the geometry
fn clamp_min(value: f64, min: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.max(min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_past_origin_clamps_to_zero() {
        let rect = FieldRect::DEFAULT.translated(-150.0, -150.0);
        assert_eq!((rect.x, rect.y), (0.0, 0.0));
        assert_eq!((rect.width, rect.height), (200.0, 80.0));
    }

    #[test]
    fn test_drag_has_no_upper_clamp() {
        let rect = FieldRect::DEFAULT.translated(5000.0, 5000.0);
        assert_eq!((rect.x, rect.y), (5100.0, 5100.0));
        assert!(!rect.is_within_page());
    }

    #[test]
    fn test_resize_clamps_to_minimum() {
        let rect = FieldRect::DEFAULT.resized(-1000.0, -1000.0);
        assert_eq!(rect.width, MIN_FIELD_WIDTH);
        assert_eq!(rect.height, MIN_FIELD_HEIGHT);
        assert_eq!((rect.x, rect.y), (100.0, 100.0));
    }

    #[test]
    fn test_for_create_applies_invariant() {
        let rect = FieldRect::for_create(-3.0, 12.0, 10.0, 400.0);
        assert_eq!(rect, FieldRect::new(0.0, 12.0, MIN_FIELD_WIDTH, 400.0));
    }

    #[test]
    fn test_nan_delta_is_absorbed() {
        let rect = FieldRect::DEFAULT.translated(f64::NAN, 0.0);
        assert_eq!(rect.x, 0.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_rect() -> impl Strategy<Value = FieldRect> {
        (0.0f64..2000.0, 0.0f64..2000.0, 50.0f64..800.0, 30.0f64..800.0)
            .prop_map(|(x, y, w, h)| FieldRect::new(x, y, w, h))
    }

    proptest! {
        /// Property: resize never produces a field below the minimum size
        #[test]
        fn resize_respects_minimum(
            rect in any_rect(),
            dw in -1.0e6f64..1.0e6,
            dh in -1.0e6f64..1.0e6,
        ) {
            let resized = rect.resized(dw, dh);
            prop_assert!(resized.width >= MIN_FIELD_WIDTH);
            prop_assert!(resized.height >= MIN_FIELD_HEIGHT);
        }

        /// Property: drag never produces a negative origin
        #[test]
        fn drag_keeps_origin_non_negative(
            rect in any_rect(),
            dx in -1.0e6f64..1.0e6,
            dy in -1.0e6f64..1.0e6,
        ) {
            let moved = rect.translated(dx, dy);
            prop_assert!(moved.x >= 0.0);
            prop_assert!(moved.y >= 0.0);
            prop_assert_eq!(moved.width, rect.width);
            prop_assert_eq!(moved.height, rect.height);
        }
    }
}
