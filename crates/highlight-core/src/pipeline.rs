//! Per-document annotation pipeline
//!
//! Pages are visited in order; on each page the mismatches are visited in
//! request order. Both orders matter: earlier callouts claim space first.

use serde::Serialize;
use tracing::{debug, info};

use crate::correlator::MismatchCorrelator;
use crate::document::{
    AnnotatedDocument, CalloutStyle, DocumentModel, HighlightStyle, PageSurface,
};
use crate::error::HighlightError;
use crate::layout::{LayoutPlanner, PageContext, PlacedAnnotation};
use crate::locator::{RegionLocator, SkipReason};
use crate::mismatch::{DocumentEntry, HighlightRequest, MismatchRecord};
use crate::pdf::LopdfModel;

/// A mismatch for the current document that produced no highlight anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMismatch {
    pub category: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnotationSummary {
    pub highlights: usize,
    pub callouts: usize,
    pub skipped: Vec<SkippedMismatch>,
}

#[derive(Debug, Clone)]
pub struct AnnotatedOutput {
    pub bytes: Vec<u8>,
    pub summary: AnnotationSummary,
}

/// Outputs for both documents of a request.
#[derive(Debug, Clone)]
pub struct PairOutput {
    pub primary: AnnotatedOutput,
    pub secondary: AnnotatedOutput,
}

#[derive(Debug)]
pub struct Highlighter<M: DocumentModel = LopdfModel> {
    model: M,
    locator: RegionLocator,
    planner: LayoutPlanner,
    correlator: MismatchCorrelator,
    highlight_style: HighlightStyle,
    callout_style: CalloutStyle,
}

impl Default for Highlighter<LopdfModel> {
    fn default() -> Self {
        Self::new(LopdfModel)
    }
}

impl<M: DocumentModel> Highlighter<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            locator: RegionLocator::default(),
            planner: LayoutPlanner::default(),
            correlator: MismatchCorrelator::default(),
            highlight_style: HighlightStyle::default(),
            callout_style: CalloutStyle::default(),
        }
    }

    pub fn with_locator(mut self, locator: RegionLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_planner(mut self, planner: LayoutPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_correlator(mut self, correlator: MismatchCorrelator) -> Self {
        self.correlator = correlator;
        self
    }

    pub fn with_styles(mut self, highlight: HighlightStyle, callout: CalloutStyle) -> Self {
        self.highlight_style = highlight;
        self.callout_style = callout;
        self
    }

    /// Annotate `pdf_bytes`, the document named `document_filename`, and
    /// return the new bytes.
    pub fn place_annotations(
        &self,
        pdf_bytes: &[u8],
        request: &HighlightRequest,
        document_filename: &str,
    ) -> Result<Vec<u8>, HighlightError> {
        Ok(self
            .annotate_document(pdf_bytes, request, document_filename)?
            .bytes)
    }

    /// Annotate both documents of the request. Fails if either fails.
    pub fn annotate_pair(
        &self,
        request: &HighlightRequest,
        primary_bytes: &[u8],
        secondary_bytes: &[u8],
    ) -> Result<PairOutput, HighlightError> {
        let primary =
            self.annotate_document(primary_bytes, request, &request.documents.primary)?;
        let secondary =
            self.annotate_document(secondary_bytes, request, &request.documents.secondary)?;
        Ok(PairOutput { primary, secondary })
    }

    pub fn annotate_document(
        &self,
        pdf_bytes: &[u8],
        request: &HighlightRequest,
        document_filename: &str,
    ) -> Result<AnnotatedOutput, HighlightError> {
        let mut doc = self.model.open(pdf_bytes)?;
        let page_count = doc.page_count();

        let relevant: Vec<(&MismatchRecord, &DocumentEntry)> = request
            .mismatches
            .records()
            .iter()
            .filter_map(|record| record.entry(document_filename).map(|entry| (record, entry)))
            .collect();
        let comments: Vec<Option<&str>> = relevant
            .iter()
            .map(|(record, _)| {
                self.correlator
                    .comment_for(record, &request.documents, document_filename)
            })
            .collect();

        let mut summary = AnnotationSummary::default();
        let mut placed_on_any_page = vec![false; relevant.len()];

        for index in 0..page_count {
            let page_number = (index + 1) as u32;
            let mut page = doc.page(index)?;
            let bounds = page.bounds();
            let mut ctx = PageContext::with_existing(bounds, page.existing_annotations());

            for (i, (record, entry)) in relevant.iter().enumerate() {
                let target = match self.locator.locate(*entry, &page, bounds, page_number) {
                    Ok(target) => target,
                    Err(reason) => {
                        debug!(
                            category = %record.category,
                            page = page_number,
                            ?reason,
                            "Skipping mismatch"
                        );
                        continue;
                    }
                };

                let placed = self.planner.place(target, comments[i], &mut ctx);
                self.materialize(&mut page, &placed, &mut summary)?;
                placed_on_any_page[i] = true;
            }
        }

        for ((record, entry), placed) in relevant.iter().zip(&placed_on_any_page) {
            if !placed {
                summary.skipped.push(SkippedMismatch {
                    category: record.category.clone(),
                    reason: never_placed_reason(entry, page_count),
                });
            }
        }

        info!(
            document = document_filename,
            pages = page_count,
            highlights = summary.highlights,
            callouts = summary.callouts,
            skipped = summary.skipped.len(),
            "Annotated document"
        );

        let bytes = if summary.highlights == 0 {
            pdf_bytes.to_vec()
        } else {
            doc.serialize()?
        };

        Ok(AnnotatedOutput { bytes, summary })
    }

    fn materialize<P: PageSurface>(
        &self,
        page: &mut P,
        placed: &PlacedAnnotation,
        summary: &mut AnnotationSummary,
    ) -> Result<(), HighlightError> {
        page.add_highlight(placed.highlight_rect, &self.highlight_style)?;
        summary.highlights += 1;

        if let (Some(callout_box), Some(callout), Some(text)) = (
            placed.callout_box,
            placed.callout.as_ref(),
            placed.comment_text.as_deref(),
        ) {
            page.add_free_text(callout_box, text, callout, &self.callout_style)?;
            summary.callouts += 1;
        }
        Ok(())
    }
}

fn never_placed_reason(entry: &DocumentEntry, page_count: usize) -> SkipReason {
    if !entry.has_text() {
        return SkipReason::MissingText;
    }
    match entry.page_number {
        Some(declared) if declared as usize > page_count => SkipReason::PageMismatch { declared },
        _ => SkipReason::UnresolvedRegion,
    }
}

/// Annotate one document with the default lopdf-backed highlighter.
pub fn place_annotations(
    pdf_bytes: &[u8],
    request: &HighlightRequest,
    document_filename: &str,
) -> Result<Vec<u8>, HighlightError> {
    Highlighter::default().place_annotations(pdf_bytes, request, document_filename)
}
