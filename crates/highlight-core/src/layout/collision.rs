//! Callout box collision avoidance

use std::fmt::Debug;

use crate::geometry::{PageBounds, Rect};

/// Moves a candidate callout box off existing callout boxes.
pub trait CollisionStrategy: Debug + Send + Sync {
    fn resolve(&self, candidate: Rect, obstacles: &[Rect], bounds: PageBounds) -> Rect;
}

/// Visits each obstacle once, in order, pushing the candidate below an
/// overlapping obstacle or above it when below would leave the page.
///
/// A later push can land the box back on an earlier obstacle; that overlap is
/// left as is.
#[derive(Debug, Clone)]
pub struct SinglePassResolver {
    pub gap: f64,
}

impl Default for SinglePassResolver {
    fn default() -> Self {
        Self { gap: 5.0 }
    }
}

impl SinglePassResolver {
    /// Returns the nudged box and whether any obstacle was hit.
    fn pass(&self, mut candidate: Rect, obstacles: &[Rect], bounds: PageBounds) -> (Rect, bool) {
        let height = candidate.height();
        let width = candidate.width();
        let mut moved = false;

        for obstacle in obstacles {
            if !candidate.intersects(obstacle) {
                continue;
            }
            let mut y0 = obstacle.y1 + self.gap;
            if y0 + height > bounds.height {
                y0 = obstacle.y0 - height - self.gap;
            }
            candidate = Rect::from_origin_size(candidate.x0, y0, width, height);
            moved = true;
        }

        (candidate, moved)
    }
}

impl CollisionStrategy for SinglePassResolver {
    fn resolve(&self, candidate: Rect, obstacles: &[Rect], bounds: PageBounds) -> Rect {
        self.pass(candidate, obstacles, bounds).0
    }
}

/// Repeats single passes until the box is clear of every obstacle or the
/// iteration limit is reached.
#[derive(Debug, Clone)]
pub struct FixedPointResolver {
    pub inner: SinglePassResolver,
    pub max_iterations: usize,
}

impl Default for FixedPointResolver {
    fn default() -> Self {
        Self {
            inner: SinglePassResolver::default(),
            max_iterations: 8,
        }
    }
}

impl CollisionStrategy for FixedPointResolver {
    fn resolve(&self, mut candidate: Rect, obstacles: &[Rect], bounds: PageBounds) -> Rect {
        for _ in 0..self.max_iterations {
            let (next, moved) = self.inner.pass(candidate, obstacles, bounds);
            candidate = next;
            if !moved {
                break;
            }
        }
        candidate
    }
}
