//! Resolve a mismatch entry to a rectangle on the current page
//!
//! A supplied bbox is authoritative. Without one, the entry text is found by
//! chaining word matches that stay on the same line or wrap onto the next.

use serde::Serialize;
use tracing::debug;

use crate::document::TextSearch;
use crate::geometry::{PageBounds, Rect};
use crate::mismatch::DocumentEntry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatorConfig {
    /// Horizontal padding added on each side of the resolved region
    pub pad_x: f64,
    /// Vertical padding added above and below the resolved region
    pub pad_y: f64,
    /// Max distance between a word's top and the running bottom edge to count
    /// as the same line
    pub same_line_tolerance: f64,
    /// Max distance below the running bottom edge for a wrapped word
    pub wrap_tolerance: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            pad_x: 8.0,
            pad_y: 2.0,
            same_line_tolerance: 20.0,
            wrap_tolerance: 50.0,
        }
    }
}

/// Why a mismatch produced no highlight on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The entry for this document has no text.
    MissingText,
    /// The entry belongs to another page.
    PageMismatch { declared: u32 },
    /// Text search could not match every word.
    UnresolvedRegion,
}

#[derive(Debug, Clone, Default)]
pub struct RegionLocator {
    config: LocatorConfig,
}

impl RegionLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Target rectangle for `entry` on the page numbered `page_number`
    /// (1-indexed).
    pub fn locate<S: TextSearch + ?Sized>(
        &self,
        entry: &DocumentEntry,
        page: &S,
        bounds: PageBounds,
        page_number: u32,
    ) -> Result<Rect, SkipReason> {
        if !entry.has_text() {
            return Err(SkipReason::MissingText);
        }
        if let Some(declared) = entry.page_number {
            if declared != page_number {
                return Err(SkipReason::PageMismatch { declared });
            }
        }

        if let Some(bbox) = &entry.bbox {
            return Ok(self.pad(bbox.to_rect(bounds.height)));
        }

        self.search(&entry.text, page)
            .map(|rect| self.pad(rect))
            .ok_or(SkipReason::UnresolvedRegion)
    }

    /// Unpadded union of the first chain of word matches that covers every
    /// word of `text`.
    ///
    /// Candidates are the occurrences of the first word in the page's search
    /// order; the first candidate that matches all words wins.
    pub fn search<S: TextSearch + ?Sized>(&self, text: &str, page: &S) -> Option<Rect> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let (first, rest) = words.split_first()?;

        let rest_hits: Vec<Vec<Rect>> = rest.iter().map(|word| page.search_text(word)).collect();

        for start in page.search_text(first) {
            let mut region = start;
            let mut matched_all = true;

            for hits in &rest_hits {
                match hits.iter().find(|hit| self.continues(&region, hit)) {
                    Some(hit) => region = region.union(hit),
                    None => {
                        matched_all = false;
                        break;
                    }
                }
            }

            if matched_all {
                debug!(?region, words = words.len(), "Resolved text region");
                return Some(region);
            }
        }

        None
    }

    /// Whether `hit` can follow a region ending at `region.y1`.
    fn continues(&self, region: &Rect, hit: &Rect) -> bool {
        let gap = hit.y0 - region.y1;
        gap.abs() < self.config.same_line_tolerance
            || (gap > 0.0 && gap < self.config.wrap_tolerance)
    }

    fn pad(&self, rect: Rect) -> Rect {
        rect.padded(self.config.pad_x, self.config.pad_y)
    }
}
