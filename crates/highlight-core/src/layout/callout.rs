//! Elbow connector between a callout box and its highlight

use serde::Serialize;

use crate::document::CalloutLine;
use crate::geometry::{Point, Rect};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalloutRouter {
    /// A box whose top is more than this far below the target's bottom is
    /// treated as sitting below it
    pub below_threshold: f64,
    /// Horizontal inset of the box anchor when the box is above or below
    pub anchor_inset_x: f64,
    /// Vertical inset of the box anchor when the box is beside the target
    pub side_anchor_dy: f64,
}

impl Default for CalloutRouter {
    fn default() -> Self {
        Self {
            below_threshold: 10.0,
            anchor_inset_x: 20.0,
            side_anchor_dy: 15.0,
        }
    }
}

impl CalloutRouter {
    pub fn route(&self, callout_box: &Rect, target: &Rect) -> CalloutLine {
        let box_mid_x = callout_box.x0 + callout_box.width() / 2.0;

        let (box_anchor, target_anchor) = if callout_box.y0 > target.y1 + self.below_threshold {
            (
                Point::new(callout_box.x0 + self.anchor_inset_x, callout_box.y0),
                Point::new(target.x1.min(box_mid_x), target.y1),
            )
        } else if callout_box.y1 < target.y0 {
            (
                Point::new(callout_box.x0 + self.anchor_inset_x, callout_box.y1),
                Point::new(target.x1.min(box_mid_x), target.y0),
            )
        } else {
            (
                Point::new(callout_box.x0, callout_box.y0 + self.side_anchor_dy),
                target.bottom_right(),
            )
        };

        let knee = Point::new((box_anchor.x + target_anchor.x) / 2.0, box_anchor.y);

        CalloutLine {
            box_anchor,
            knee,
            target_anchor,
        }
    }
}
