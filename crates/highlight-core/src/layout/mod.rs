//! Callout box sizing and placement
//!
//! The planner sizes a comment box from its text, positions it next to the
//! highlighted target, nudges it off callouts already on the page, and clamps
//! it inside the page. The connector is routed from the final position.

pub mod callout;
pub mod collision;

use serde::Serialize;
use tracing::debug;

use crate::document::{AnnotationKind, CalloutLine, ExistingAnnotation};
use crate::geometry::{PageBounds, Rect};

pub use callout::CalloutRouter;
pub use collision::{CollisionStrategy, FixedPointResolver, SinglePassResolver};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutConfig {
    pub min_width: f64,
    pub max_width: f64,
    pub min_height: f64,
    /// Box width grows by this much per character
    pub width_per_char: f64,
    /// Characters assumed per rendered line when growing the height
    pub chars_per_line: usize,
    pub line_height: f64,
    pub base_height: f64,
    /// Gap between the target's right edge and the box
    pub offset_x: f64,
    /// Gap between the target's bottom edge and the box
    pub offset_y: f64,
    /// Extra drop used when the box goes underneath the target
    pub below_extra_y: f64,
    /// Margin kept from the page edges by the repositioning rules
    pub page_margin: f64,
    /// Targets wider than this share of the page width get the box below
    pub wide_target_ratio: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_width: 120.0,
            max_width: 250.0,
            min_height: 40.0,
            width_per_char: 2.0,
            chars_per_line: 25,
            line_height: 12.0,
            base_height: 30.0,
            offset_x: 10.0,
            offset_y: 15.0,
            below_extra_y: 20.0,
            page_margin: 20.0,
            wide_target_ratio: 0.8,
        }
    }
}

impl LayoutConfig {
    /// Box dimensions for a comment of `text_len` characters.
    pub fn box_size(&self, text_len: usize) -> (f64, f64) {
        let width = (text_len as f64 * self.width_per_char).clamp(self.min_width, self.max_width);
        let lines = (text_len / self.chars_per_line.max(1)) as f64;
        let height = (lines * self.line_height + self.base_height).max(self.min_height);
        (width, height)
    }
}

/// Annotations placed on one page so far.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub bounds: PageBounds,
    annotations: Vec<ExistingAnnotation>,
}

impl PageContext {
    pub fn new(bounds: PageBounds) -> Self {
        Self {
            bounds,
            annotations: Vec::new(),
        }
    }

    /// Start from the annotations already present on the page.
    pub fn with_existing(bounds: PageBounds, existing: Vec<ExistingAnnotation>) -> Self {
        Self {
            bounds,
            annotations: existing,
        }
    }

    pub fn record(&mut self, kind: AnnotationKind, rect: Rect) {
        self.annotations.push(ExistingAnnotation { kind, rect });
    }

    /// Records the highlight and, when present, the callout box.
    pub fn record_placed(&mut self, placed: &PlacedAnnotation) {
        self.record(AnnotationKind::Highlight, placed.highlight_rect);
        if let Some(callout_box) = placed.callout_box {
            self.record(AnnotationKind::FreeText, callout_box);
        }
    }

    pub fn annotations(&self) -> &[ExistingAnnotation] {
        &self.annotations
    }

    /// Free-text boxes only; highlights are not obstacles.
    pub fn callout_boxes(&self) -> Vec<Rect> {
        self.annotations
            .iter()
            .filter(|a| a.kind == AnnotationKind::FreeText)
            .map(|a| a.rect)
            .collect()
    }
}

/// Layout result for one mismatch on one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedAnnotation {
    pub highlight_rect: Rect,
    pub callout_box: Option<Rect>,
    pub callout: Option<CalloutLine>,
    pub comment_text: Option<String>,
}

#[derive(Debug)]
pub struct LayoutPlanner {
    config: LayoutConfig,
    collision: Box<dyn CollisionStrategy>,
    router: CalloutRouter,
}

impl Default for LayoutPlanner {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutPlanner {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            collision: Box::new(SinglePassResolver::default()),
            router: CalloutRouter::default(),
        }
    }

    pub fn with_collision_strategy(mut self, strategy: Box<dyn CollisionStrategy>) -> Self {
        self.collision = strategy;
        self
    }

    pub fn with_router(mut self, router: CalloutRouter) -> Self {
        self.router = router;
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Lay out the annotation for `target` without touching the context.
    pub fn plan(&self, target: Rect, comment: Option<&str>, ctx: &PageContext) -> PlacedAnnotation {
        let Some(text) = comment.filter(|t| !t.trim().is_empty()) else {
            return PlacedAnnotation {
                highlight_rect: target,
                callout_box: None,
                callout: None,
                comment_text: None,
            };
        };

        let callout_box = self.callout_box(&target, text.chars().count(), ctx);
        let callout = self.router.route(&callout_box, &target);
        debug!(?target, ?callout_box, "Planned callout");

        PlacedAnnotation {
            highlight_rect: target,
            callout_box: Some(callout_box),
            callout: Some(callout),
            comment_text: Some(text.to_string()),
        }
    }

    /// Lay out the annotation and record it in the page context.
    pub fn place(
        &self,
        target: Rect,
        comment: Option<&str>,
        ctx: &mut PageContext,
    ) -> PlacedAnnotation {
        let placed = self.plan(target, comment, ctx);
        ctx.record_placed(&placed);
        placed
    }

    /// Final box position: initial placement, collision nudging, then the
    /// page clamp.
    pub fn callout_box(&self, target: &Rect, text_len: usize, ctx: &PageContext) -> Rect {
        let (width, height) = self.config.box_size(text_len);
        let (x0, y0) = self.initial_origin(target, width, height, ctx.bounds);
        let candidate = Rect::from_origin_size(x0, y0, width, height);

        let nudged = self
            .collision
            .resolve(candidate, &ctx.callout_boxes(), ctx.bounds);

        let x0 = nudged.x0.min(ctx.bounds.width - width).max(0.0);
        let y0 = nudged.y0.min(ctx.bounds.height - height).max(0.0);
        Rect::from_origin_size(x0, y0, width, height)
    }

    fn initial_origin(
        &self,
        target: &Rect,
        width: f64,
        height: f64,
        bounds: PageBounds,
    ) -> (f64, f64) {
        let c = &self.config;

        if target.width() > bounds.width * c.wide_target_ratio {
            // No room on the right: go underneath
            let mut x0 = target.x0 + c.offset_x;
            let mut y0 = target.y1 + c.offset_y + c.below_extra_y;
            if x0 + width > bounds.width - c.page_margin {
                x0 = bounds.width - width - c.page_margin;
            }
            if y0 + height > bounds.height - c.page_margin {
                y0 = target.y0 - height - c.offset_y;
            }
            return (x0, y0);
        }

        let mut x0 = target.x1 + c.offset_x;
        let mut y0 = target.y1 + c.offset_y;
        if x0 + width > bounds.width {
            x0 = target.x0 - width - c.offset_x;
            if x0 < 0.0 {
                x0 = c.page_margin.max(target.x0);
                y0 = target.y1 + c.offset_y + c.below_extra_y;
            }
        }
        (x0, y0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use pretty_assertions::assert_eq;

    const LETTER: PageBounds = PageBounds {
        width: 612.0,
        height: 792.0,
    };

    #[test]
    fn test_box_size_bounds() {
        let config = LayoutConfig::default();
        assert_eq!(config.box_size(0), (120.0, 40.0));
        assert_eq!(config.box_size(10), (120.0, 40.0));
        assert_eq!(config.box_size(80), (160.0, 66.0));
        assert_eq!(config.box_size(500), (250.0, 270.0));
    }

    #[test]
    fn test_default_placement_is_diagonal() {
        let ctx = PageContext::new(LETTER);
        let target = Rect::new(100.0, 100.0, 200.0, 120.0);
        let placed = LayoutPlanner::default().plan(target, Some("MSKU1234567"), &ctx);
        assert_eq!(
            placed.callout_box,
            Some(Rect::new(210.0, 135.0, 330.0, 175.0))
        );
        assert_eq!(placed.comment_text.as_deref(), Some("MSKU1234567"));
        // Box top sits 15 below target bottom: routed as below
        let line = placed.callout.unwrap();
        assert_eq!(line.box_anchor, Point::new(230.0, 135.0));
        assert_eq!(line.target_anchor, Point::new(200.0, 120.0));
    }

    #[test]
    fn test_right_overflow_flips_left() {
        let ctx = PageContext::new(LETTER);
        let target = Rect::new(450.0, 100.0, 550.0, 120.0);
        let callout_box = LayoutPlanner::default().callout_box(&target, 10, &ctx);
        assert_eq!(callout_box, Rect::new(320.0, 135.0, 440.0, 175.0));
    }

    #[test]
    fn test_no_room_either_side_goes_below_at_margin() {
        let bounds = PageBounds::new(300.0, 400.0);
        let ctx = PageContext::new(bounds);
        let target = Rect::new(50.0, 100.0, 200.0, 120.0);
        let callout_box = LayoutPlanner::default().callout_box(&target, 10, &ctx);
        assert_eq!(callout_box, Rect::new(50.0, 155.0, 170.0, 195.0));
    }

    #[test]
    fn test_wide_target_goes_below() {
        let ctx = PageContext::new(LETTER);
        let target = Rect::new(20.0, 100.0, 590.0, 120.0);
        let callout_box = LayoutPlanner::default().callout_box(&target, 10, &ctx);
        assert_eq!(callout_box, Rect::new(30.0, 155.0, 150.0, 195.0));
    }

    #[test]
    fn test_wide_target_near_bottom_goes_above() {
        let ctx = PageContext::new(LETTER);
        let target = Rect::new(20.0, 720.0, 590.0, 740.0);
        let callout_box = LayoutPlanner::default().callout_box(&target, 10, &ctx);
        assert_eq!(callout_box, Rect::new(30.0, 665.0, 150.0, 705.0));
    }

    #[test]
    fn test_clamped_inside_page() {
        let ctx = PageContext::new(LETTER);
        let target = Rect::new(100.0, 770.0, 200.0, 790.0);
        let callout_box = LayoutPlanner::default().callout_box(&target, 10, &ctx);
        assert_eq!(callout_box, Rect::new(210.0, 752.0, 330.0, 792.0));
    }

    #[test]
    fn test_avoids_existing_callout() {
        let mut ctx = PageContext::new(LETTER);
        ctx.record(
            AnnotationKind::FreeText,
            Rect::new(210.0, 135.0, 330.0, 175.0),
        );
        // Highlights never push boxes around
        ctx.record(AnnotationKind::Highlight, Rect::new(0.0, 0.0, 612.0, 792.0));
        let target = Rect::new(100.0, 100.0, 200.0, 120.0);
        let callout_box = LayoutPlanner::default().callout_box(&target, 10, &ctx);
        assert_eq!(callout_box, Rect::new(210.0, 180.0, 330.0, 220.0));
    }

    #[test]
    fn test_place_records_both_rects() {
        let mut ctx = PageContext::new(LETTER);
        let planner = LayoutPlanner::default();
        let target = Rect::new(100.0, 100.0, 200.0, 120.0);

        let first = planner.place(target, Some("first"), &mut ctx);
        assert_eq!(ctx.annotations().len(), 2);
        assert_eq!(ctx.callout_boxes(), vec![first.callout_box.unwrap()]);

        let second = planner.place(target, Some("second"), &mut ctx);
        assert!(!second
            .callout_box
            .unwrap()
            .intersects(&first.callout_box.unwrap()));
    }

    #[test]
    fn test_no_comment_means_highlight_only() {
        let mut ctx = PageContext::new(LETTER);
        let target = Rect::new(100.0, 100.0, 200.0, 120.0);
        let placed = LayoutPlanner::default().place(target, None, &mut ctx);
        assert_eq!(placed.callout_box, None);
        assert_eq!(placed.callout, None);
        assert!(ctx.callout_boxes().is_empty());
        assert_eq!(ctx.annotations().len(), 1);
    }

    #[test]
    fn test_fixed_point_strategy_is_pluggable() {
        let strategy = Box::new(FixedPointResolver::default());
        let planner = LayoutPlanner::default().with_collision_strategy(strategy);
        let mut ctx = PageContext::new(LETTER);
        ctx.record(
            AnnotationKind::FreeText,
            Rect::new(210.0, 180.0, 330.0, 220.0),
        );
        ctx.record(
            AnnotationKind::FreeText,
            Rect::new(210.0, 135.0, 330.0, 175.0),
        );
        let target = Rect::new(100.0, 100.0, 200.0, 120.0);
        let callout_box = planner.callout_box(&target, 10, &ctx);
        for obstacle in ctx.callout_boxes() {
            assert!(!callout_box.intersects(&obstacle));
        }
    }
}
