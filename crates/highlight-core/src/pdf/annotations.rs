//! Annotation dictionaries on lopdf pages

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::document::{AnnotationKind, CalloutLine, CalloutStyle, HighlightStyle};
use crate::error::HighlightError;
use crate::geometry::{Point, Rect};

/// Page flags: NoZoom | NoRotate
const CALLOUT_FLAGS: i64 = 8 | 16;
/// Gap between the callout border and its text
const CALLOUT_TEXT_INSET: f32 = 2.0;

/// Maps top-left page coordinates to PDF user space for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpace {
    /// MediaBox as [llx, lly, urx, ury]
    pub media_box: [f64; 4],
}

impl PageSpace {
    pub fn width(&self) -> f64 {
        self.media_box[2] - self.media_box[0]
    }

    pub fn height(&self) -> f64 {
        self.media_box[3] - self.media_box[1]
    }

    pub fn to_user_rect(&self, rect: &Rect) -> [f32; 4] {
        [
            (rect.x0 + self.media_box[0]) as f32,
            (self.media_box[3] - rect.y1) as f32,
            (rect.x1 + self.media_box[0]) as f32,
            (self.media_box[3] - rect.y0) as f32,
        ]
    }

    pub fn to_user_point(&self, point: &Point) -> [f32; 2] {
        [
            (point.x + self.media_box[0]) as f32,
            (self.media_box[3] - point.y) as f32,
        ]
    }

    pub fn page_rect_from_user(&self, llx: f64, lly: f64, urx: f64, ury: f64) -> Rect {
        Rect::new(
            llx - self.media_box[0],
            self.media_box[3] - ury,
            urx - self.media_box[0],
            self.media_box[3] - lly,
        )
    }
}

fn reals(values: &[f32]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v)).collect())
}

fn color(rgb: &[f32; 3]) -> Object {
    reals(rgb)
}

/// PDF text string: literal bytes for ASCII, UTF-16BE with BOM otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Escape a PDF literal string for a content stream. The appearance font is
/// a standard 14 font, so anything outside ASCII becomes `?`.
fn escape_pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            _ if ch.is_ascii() && !ch.is_ascii_control() => out.push(ch),
            _ => out.push('?'),
        }
    }
    out
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Resources holding one `/GS0` graphics state with the given opacity.
fn opacity_resources(opacity: f32, blend_mode: &[u8]) -> Dictionary {
    let mut state = Dictionary::new();
    state.set("Type", Object::Name(b"ExtGState".to_vec()));
    state.set("ca", Object::Real(opacity));
    state.set("CA", Object::Real(opacity));
    state.set("BM", Object::Name(blend_mode.to_vec()));

    let mut states = Dictionary::new();
    states.set("GS0", Object::Dictionary(state));

    let mut resources = Dictionary::new();
    resources.set("ExtGState", Object::Dictionary(states));
    resources
}

/// Form XObject spanning `width` x `height`, for use as `/AP /N`.
fn form_xobject(width: f32, height: f32, resources: Dictionary, content: String) -> Stream {
    let content_bytes = content.into_bytes();

    let mut stream_dict = Dictionary::new();
    stream_dict.set("Type", Object::Name(b"XObject".to_vec()));
    stream_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    stream_dict.set("BBox", reals(&[0.0, 0.0, width, height]));
    stream_dict.set("Resources", Object::Dictionary(resources));
    stream_dict.set("Length", Object::Integer(content_bytes.len() as i64));

    Stream::new(stream_dict, content_bytes)
}

fn highlight_appearance(width: f32, height: f32, style: &HighlightStyle) -> Stream {
    let [r, g, b] = style.color;
    let content = format!(
        "q\n/GS0 gs\n{r} {g} {b} rg\n0 0 {w} {h} re f\nQ",
        w = width,
        h = height,
    );
    form_xobject(width, height, opacity_resources(style.opacity, b"Multiply"), content)
}

/// Filled, bordered box with one text line per line of `text`.
fn callout_appearance(width: f32, height: f32, text: &str, style: &CalloutStyle) -> Stream {
    let [fr, fg, fb] = style.fill_color;
    let [br, bg, bb] = style.border_color;
    let [tr, tg, tb] = style.text_color;
    let bw = style.border_width;
    let half = bw / 2.0;
    let size = style.font_size;
    let left = bw + CALLOUT_TEXT_INSET;
    let top = (height - bw - size).max(0.0);

    let mut content = format!(
        "q\n/GS0 gs\n{fr} {fg} {fb} rg\n0 0 {width} {height} re f\n\
         {br} {bg} {bb} RG\n{bw} w\n{half} {half} {} {} re S\nQ\n",
        width - bw,
        height - bw,
    );
    content.push_str(&format!(
        "q\n{tr} {tg} {tb} rg\nBT\n/{} {size} Tf\n{size} TL\n{left} {top} Td\n",
        style.font_name
    ));
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            content.push_str("T*\n");
        }
        content.push_str(&format!("({}) Tj\n", escape_pdf_string(line)));
    }
    content.push_str("ET\nQ");

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    let base_font = style.font_name.as_bytes().to_vec();
    font.set("BaseFont", Object::Name(base_font));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));

    let mut fonts = Dictionary::new();
    fonts.set(style.font_name.as_str(), Object::Dictionary(font));

    let mut resources = opacity_resources(style.opacity, b"Normal");
    resources.set("Font", Object::Dictionary(fonts));

    form_xobject(width, height, resources, content)
}

/// `/AP` dictionary whose normal appearance is `stream_id`.
fn appearance(stream_id: ObjectId) -> Object {
    let mut ap = Dictionary::new();
    ap.set("N", Object::Reference(stream_id));
    Object::Dictionary(ap)
}

pub fn add_highlight_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    space: &PageSpace,
    rect: &Rect,
    style: &HighlightStyle,
) -> Result<ObjectId, HighlightError> {
    let [llx, lly, urx, ury] = space.to_user_rect(rect);

    let mut annot = Dictionary::new();
    annot.set("Type", Object::Name(b"Annot".to_vec()));
    annot.set("Subtype", Object::Name(b"Highlight".to_vec()));
    annot.set("Rect", reals(&[llx, lly, urx, ury]));
    annot.set("QuadPoints", reals(&[llx, ury, urx, ury, llx, lly, urx, lly]));
    annot.set("C", color(&style.color));
    annot.set("CA", Object::Real(style.opacity));
    annot.set("F", Object::Integer(4));

    let ap_id = doc.add_object(highlight_appearance(urx - llx, ury - lly, style));
    annot.set("AP", appearance(ap_id));

    let annot_id = doc.add_object(Object::Dictionary(annot));
    add_annotation_to_page(doc, page_id, annot_id)?;
    Ok(annot_id)
}

pub fn add_callout_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    space: &PageSpace,
    rect: &Rect,
    text: &str,
    callout: &CalloutLine,
    style: &CalloutStyle,
) -> Result<ObjectId, HighlightError> {
    let mut line = Vec::with_capacity(6);
    for point in callout.points() {
        line.extend_from_slice(&space.to_user_point(&point));
    }

    let [tr, tg, tb] = style.text_color;
    let [br, bg, bb] = style.border_color;
    let da = format!(
        "{} {} {} rg {} {} {} RG /{} {} Tf",
        tr, tg, tb, br, bg, bb, style.font_name, style.font_size
    );
    let ds = format!(
        "font-size: {}pt; font-family: sans-serif; line-height: 1;",
        style.font_size
    );
    let rc = format!(
        "<?xml version=\"1.0\"?><body xmlns=\"http://www.w3.org/1999/xhtml\" \
         xmlns:xfa=\"http://www.xfa.org/schema/xfa-data/1.0/\" xfa:APIVersion=\"Acrobat:7.0.0\" \
         xfa:spec=\"2.0.2\"><p style=\"margin: 0; padding-left: 2px; text-align: left;\">{}</p></body>",
        escape_xml(text)
    );

    let mut bs = Dictionary::new();
    bs.set("W", Object::Real(style.border_width));

    let [llx, lly, urx, ury] = space.to_user_rect(rect);
    let ap_id = doc.add_object(callout_appearance(urx - llx, ury - lly, text, style));

    let mut annot = Dictionary::new();
    annot.set("Type", Object::Name(b"Annot".to_vec()));
    annot.set("Subtype", Object::Name(b"FreeText".to_vec()));
    annot.set("IT", Object::Name(b"FreeTextCallout".to_vec()));
    annot.set("Rect", reals(&[llx, lly, urx, ury]));
    annot.set("Contents", text_string(text));
    annot.set("CL", reals(&line));
    annot.set("LE", Object::Name(b"None".to_vec()));
    annot.set("DA", Object::String(da.into_bytes(), StringFormat::Literal));
    annot.set("DS", Object::String(ds.into_bytes(), StringFormat::Literal));
    annot.set("RC", text_string(&rc));
    annot.set("C", color(&style.fill_color));
    annot.set("CA", Object::Real(style.opacity));
    annot.set("BS", Object::Dictionary(bs));
    annot.set("F", Object::Integer(CALLOUT_FLAGS));
    annot.set("AP", appearance(ap_id));

    let annot_id = doc.add_object(Object::Dictionary(annot));
    add_annotation_to_page(doc, page_id, annot_id)?;
    Ok(annot_id)
}

/// Append `annot_id` to the page's `/Annots`, following an indirect array
/// when the page has one.
fn add_annotation_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), HighlightError> {
    let indirect = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .and_then(|dict| dict.get(b"Annots"))
        .and_then(Object::as_reference)
        .ok();

    if let Some(array_id) = indirect {
        if let Ok(Object::Array(ref mut arr)) = doc.get_object_mut(array_id) {
            arr.push(Object::Reference(annot_id));
            return Ok(());
        }
    }

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| HighlightError::OperationError(e.to_string()))?;

    if let Object::Dictionary(ref mut page_dict) = page {
        if let Ok(Object::Array(ref mut arr)) = page_dict.get_mut(b"Annots") {
            arr.push(Object::Reference(annot_id));
        } else {
            page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
        }
        Ok(())
    } else {
        Err(HighlightError::OperationError(format!(
            "Page object {:?} is not a dictionary",
            page_id
        )))
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Kind and top-left rectangle of every annotation on the page.
pub fn read_annotations(
    doc: &Document,
    page_id: ObjectId,
    space: &PageSpace,
) -> Vec<(AnnotationKind, Rect)> {
    let Ok(page) = doc.get_object(page_id).and_then(Object::as_dict) else {
        return Vec::new();
    };
    let Some(Object::Array(annots)) = page.get(b"Annots").ok().and_then(|a| resolve(doc, a))
    else {
        return Vec::new();
    };

    annots
        .iter()
        .filter_map(|annot| resolve(doc, annot)?.as_dict().ok())
        .filter_map(|dict| {
            let kind = match dict.get(b"Subtype") {
                Ok(Object::Name(name)) => AnnotationKind::from_subtype(name),
                _ => return None,
            };
            let rect = resolve(doc, dict.get(b"Rect").ok()?)?.as_array().ok()?;
            let edges: Vec<f64> = rect.iter().filter_map(number).collect();
            if edges.len() != 4 {
                return None;
            }
            Some((kind, space.page_rect_from_user(edges[0], edges[1], edges[2], edges[3])))
        })
        .collect()
}
