//! Page geometry in top-left origin coordinates
//!
//! Every rectangle handled by the layout code has its origin at the top-left
//! corner of the page with Y growing downward. Inputs declared in a
//! bottom-left origin are flipped on the way in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle with `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// Build a rectangle from two opposite corners in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// True when the two rectangles share a non-empty area. Touching edges
    /// do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Grow by `dx` on the left and right and by `dy` on the top and bottom.
    pub fn padded(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x0: self.x0 - dx,
            y0: self.y0 - dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }

    /// Mirror the rectangle vertically inside a page of the given height.
    ///
    /// Converts between bottom-left and top-left origins; applying it twice
    /// returns the original rectangle.
    pub fn flip_y(&self, page_height: f64) -> Rect {
        Rect::new(self.x0, page_height - self.y1, self.x1, page_height - self.y0)
    }
}

/// Dimensions of a page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PageBounds {
    pub width: f64,
    pub height: f64,
}

impl PageBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Origin convention of an externally supplied bounding box.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoordOrigin {
    #[default]
    TopLeft,
    BottomLeft,
}

impl CoordOrigin {
    pub fn parse(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("BOTTOMLEFT") {
            CoordOrigin::BottomLeft
        } else {
            CoordOrigin::TopLeft
        }
    }
}
