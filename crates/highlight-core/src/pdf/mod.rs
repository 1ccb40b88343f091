//! lopdf-backed document model

pub mod annotations;
pub mod text;

use lopdf::{Document, Object, ObjectId};

use crate::document::{
    AnnotatedDocument, AnnotationHandle, CalloutLine, CalloutStyle, DocumentModel,
    ExistingAnnotation, HighlightStyle, PageSurface, TextSearch,
};
use crate::error::HighlightError;
use crate::geometry::{PageBounds, Rect};

use annotations::{add_callout_annotation, add_highlight_annotation, read_annotations, PageSpace};
use text::{extract_page_runs, fold_case, TextRun};

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];
/// Guard against cyclic /Parent chains
const MAX_PARENT_DEPTH: usize = 32;

/// Opens PDFs with lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfModel;

impl DocumentModel for LopdfModel {
    type Document = LopdfDocument;

    fn open(&self, bytes: &[u8]) -> Result<Self::Document, HighlightError> {
        LopdfDocument::load(bytes)
    }
}

pub struct LopdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
    /// Text runs per page, extracted once at load
    runs: Vec<Vec<TextRun>>,
}

impl LopdfDocument {
    pub fn load(bytes: &[u8]) -> Result<Self, HighlightError> {
        let doc =
            Document::load_mem(bytes).map_err(|e| HighlightError::ParseError(e.to_string()))?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let runs = extract_page_runs(bytes, page_ids.len());
        Ok(Self {
            doc,
            page_ids,
            runs,
        })
    }

    pub fn inner(&self) -> &Document {
        &self.doc
    }
}

impl std::fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("pages", &self.page_ids.len())
            .finish()
    }
}

impl AnnotatedDocument for LopdfDocument {
    type Page<'a> = LopdfPage<'a>;

    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page(&mut self, index: usize) -> Result<Self::Page<'_>, HighlightError> {
        let page_id = *self.page_ids.get(index).ok_or_else(|| {
            HighlightError::PageError(format!(
                "Page index {} out of range (document has {} pages)",
                index,
                self.page_ids.len()
            ))
        })?;

        let space = PageSpace {
            media_box: media_box(&self.doc, page_id),
        };
        Ok(LopdfPage {
            doc: &mut self.doc,
            page_id,
            space,
            runs: self.runs.get(index).map(Vec::as_slice).unwrap_or_default(),
        })
    }

    fn serialize(&mut self) -> Result<Vec<u8>, HighlightError> {
        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| HighlightError::SerializationError(e.to_string()))?;
        Ok(output)
    }
}

/// One page of a [`LopdfDocument`] and the text runs extracted for it.
pub struct LopdfPage<'a> {
    doc: &'a mut Document,
    page_id: ObjectId,
    space: PageSpace,
    runs: &'a [TextRun],
}

impl LopdfPage<'_> {
    pub fn runs(&self) -> &[TextRun] {
        self.runs
    }
}

impl TextSearch for LopdfPage<'_> {
    fn search_text(&self, needle: &str) -> Vec<Rect> {
        let needle: Vec<char> = needle.chars().map(fold_case).collect();
        let mut hits: Vec<Rect> = self
            .runs
            .iter()
            .flat_map(|run| run.find(&needle))
            .map(|r| self.space.page_rect_from_user(r.x0, r.y0, r.x1, r.y1))
            .collect();
        hits.sort_by(|a, b| a.y0.total_cmp(&b.y0).then(a.x0.total_cmp(&b.x0)));
        hits
    }
}

impl PageSurface for LopdfPage<'_> {
    fn bounds(&self) -> PageBounds {
        PageBounds::new(self.space.width(), self.space.height())
    }

    fn existing_annotations(&self) -> Vec<ExistingAnnotation> {
        read_annotations(&*self.doc, self.page_id, &self.space)
            .into_iter()
            .map(|(kind, rect)| ExistingAnnotation { kind, rect })
            .collect()
    }

    fn add_highlight(
        &mut self,
        rect: Rect,
        style: &HighlightStyle,
    ) -> Result<AnnotationHandle, HighlightError> {
        let id = add_highlight_annotation(self.doc, self.page_id, &self.space, &rect, style)?;
        Ok(AnnotationHandle(id.0, id.1))
    }

    fn add_free_text(
        &mut self,
        rect: Rect,
        text: &str,
        callout: &CalloutLine,
        style: &CalloutStyle,
    ) -> Result<AnnotationHandle, HighlightError> {
        let id = add_callout_annotation(
            self.doc,
            self.page_id,
            &self.space,
            &rect,
            text,
            callout,
            style,
        )?;
        Ok(AnnotationHandle(id.0, id.1))
    }
}

/// MediaBox of a page, inherited from ancestors when the page lacks one.
fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let mut current = doc.get_object(page_id).and_then(Object::as_dict).ok();

    for _ in 0..MAX_PARENT_DEPTH {
        let Some(dict) = current else { break };

        if let Some(found) = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| parse_box(doc, obj))
        {
            return found;
        }

        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_object(id))
            .and_then(Object::as_dict)
            .ok();
    }

    DEFAULT_MEDIA_BOX
}

fn parse_box(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let values: Vec<f64> = obj
        .as_array()
        .ok()?
        .iter()
        .filter_map(|v| match v {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(f64::from(*r)),
            _ => None,
        })
        .collect();
    if values.len() != 4 {
        return None;
    }
    Some([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}
