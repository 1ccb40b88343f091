//! Document model seam
//!
//! The pipeline only talks to documents through these traits. All rectangles
//! crossing the seam are in top-left page coordinates.

use serde::{Deserialize, Serialize};

use crate::error::HighlightError;
use crate::geometry::{PageBounds, Point, Rect};

/// Annotation categories the layout cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Highlight,
    FreeText,
    Other(String),
}

impl AnnotationKind {
    pub fn from_subtype(subtype: &[u8]) -> Self {
        match subtype {
            b"Highlight" => AnnotationKind::Highlight,
            b"FreeText" => AnnotationKind::FreeText,
            other => AnnotationKind::Other(String::from_utf8_lossy(other).into_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingAnnotation {
    pub kind: AnnotationKind,
    pub rect: Rect,
}

/// Connector from a callout box to its anchor: box point, knee, target point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalloutLine {
    pub box_anchor: Point,
    pub knee: Point,
    pub target_anchor: Point,
}

impl CalloutLine {
    pub fn points(&self) -> [Point; 3] {
        [self.box_anchor, self.knee, self.target_anchor]
    }
}

/// Opaque reference to an annotation created on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationHandle(pub u32, pub u16);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    /// RGB, 0-1 range
    pub color: [f32; 3],
    pub opacity: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 0.0],
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalloutStyle {
    pub fill_color: [f32; 3],
    pub text_color: [f32; 3],
    pub border_color: [f32; 3],
    pub border_width: f32,
    pub opacity: f32,
    pub font_size: f32,
    /// Standard 14 font used in the default appearance string
    pub font_name: String,
}

impl Default for CalloutStyle {
    fn default() -> Self {
        Self {
            fill_color: [1.0, 1.0, 0.0],
            text_color: [0.0, 0.0, 0.0],
            border_color: [0.0, 1.0, 0.0],
            border_width: 1.0,
            opacity: 0.75,
            font_size: 8.0,
            font_name: "Helvetica".to_string(),
        }
    }
}

/// Text lookup on a page.
pub trait TextSearch {
    /// Every occurrence of `needle` on the page, case-insensitive, in
    /// reading order.
    fn search_text(&self, needle: &str) -> Vec<Rect>;
}

/// Read/write access to a single page.
pub trait PageSurface: TextSearch {
    fn bounds(&self) -> PageBounds;

    fn existing_annotations(&self) -> Vec<ExistingAnnotation>;

    fn add_highlight(
        &mut self,
        rect: Rect,
        style: &HighlightStyle,
    ) -> Result<AnnotationHandle, HighlightError>;

    fn add_free_text(
        &mut self,
        rect: Rect,
        text: &str,
        callout: &CalloutLine,
        style: &CalloutStyle,
    ) -> Result<AnnotationHandle, HighlightError>;
}

/// An opened, annotatable document.
pub trait AnnotatedDocument {
    type Page<'a>: PageSurface
    where
        Self: 'a;

    fn page_count(&self) -> usize;

    /// Page by 0-based index.
    fn page(&mut self, index: usize) -> Result<Self::Page<'_>, HighlightError>;

    fn serialize(&mut self) -> Result<Vec<u8>, HighlightError>;
}

/// Opens documents from raw bytes.
pub trait DocumentModel {
    type Document: AnnotatedDocument;

    fn open(&self, bytes: &[u8]) -> Result<Self::Document, HighlightError>;
}
