//! Mismatch highlighting for PDF document pairs
//!
//! Takes a set of field mismatches found between two documents, highlights
//! each mismatch on both PDFs, and on the secondary document attaches a
//! callout carrying the primary document's value.
//!
//! - `HighlightRequest::from_json`: parse and merge the request groups
//! - `Highlighter`: per-document pipeline, generic over the `DocumentModel`
//! - `place_annotations`: one-shot entry point backed by lopdf

pub mod correlator;
pub mod document;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod locator;
pub mod mismatch;
pub mod pdf;
pub mod pipeline;

pub use correlator::{resolve_placeholders, CommentOverrides, MismatchCorrelator};
pub use document::{
    AnnotatedDocument, AnnotationHandle, AnnotationKind, CalloutLine, CalloutStyle, DocumentModel,
    ExistingAnnotation, HighlightStyle, PageSurface, TextSearch,
};
pub use error::HighlightError;
pub use geometry::{CoordOrigin, PageBounds, Point, Rect};
pub use layout::{LayoutConfig, LayoutPlanner, PageContext, PlacedAnnotation};
pub use locator::{LocatorConfig, RegionLocator, SkipReason};
pub use mismatch::{
    BBox, DocumentEntry, DocumentPair, HighlightRequest, MismatchRecord, MismatchSet,
    PLACEHOLDER_FILENAME,
};
pub use pdf::{LopdfDocument, LopdfModel};
pub use pipeline::{
    place_annotations, AnnotatedOutput, AnnotationSummary, Highlighter, PairOutput, SkippedMismatch,
};
