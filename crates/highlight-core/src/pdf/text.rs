//! Positioned text from pdf-extract
//!
//! pdf-extract interprets each page's content stream, resolves fonts,
//! encodings and ToUnicode maps, and reports every glyph with its text
//! rendering matrix and advance width. [`GlyphCollector`] keeps those
//! glyphs and joins them into baseline-aligned [`TextRun`]s per page.

use std::panic::{catch_unwind, AssertUnwindSafe};

use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};
use tracing::{debug, warn};

use crate::geometry::Rect;

/// Glyph top above the baseline, as a share of the font size.
const ASCENT_RATIO: f64 = 0.8;
/// Glyph bottom below the baseline, as a share of the font size.
const DESCENT_RATIO: f64 = 0.2;
/// Baselines closer than this share of the font size are one line.
const BASELINE_TOLERANCE_RATIO: f64 = 0.3;
/// Horizontal gaps wider than this share of the font size become a space.
const WORD_GAP_RATIO: f64 = 0.25;

/// One placed character, horizontal extent in user space.
#[derive(Debug, Clone, PartialEq)]
struct Glyph {
    ch: char,
    x0: f64,
    x1: f64,
}

/// A glyph as reported by pdf-extract, before it joins a line.
#[derive(Debug, Clone)]
struct PlacedGlyph {
    ch: char,
    x0: f64,
    x1: f64,
    baseline: f64,
    size: f64,
}

/// A line of characters sharing one baseline, in PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    glyphs: Vec<Glyph>,
    /// Baseline y in user space (bottom-left origin)
    pub baseline: f64,
    pub font_size: f64,
}

impl TextRun {
    fn start(glyph: PlacedGlyph) -> Self {
        Self {
            glyphs: vec![Glyph {
                ch: glyph.ch,
                x0: glyph.x0,
                x1: glyph.x1,
            }],
            baseline: glyph.baseline,
            font_size: glyph.size,
        }
    }

    /// Whether `glyph` continues this line left to right.
    fn continues_with(&self, glyph: &PlacedGlyph) -> bool {
        let Some(last) = self.glyphs.last() else {
            return true;
        };
        let tolerance = self.font_size.max(glyph.size) * BASELINE_TOLERANCE_RATIO;
        (glyph.baseline - self.baseline).abs() <= tolerance && glyph.x0 >= last.x1 - tolerance
    }

    fn push(&mut self, glyph: PlacedGlyph) {
        if let Some(last) = self.glyphs.last() {
            let gap = glyph.x0 - last.x1;
            let spaced = last.ch.is_whitespace() || glyph.ch.is_whitespace();
            if !spaced && gap > self.font_size.max(glyph.size) * WORD_GAP_RATIO {
                let x0 = last.x1;
                self.glyphs.push(Glyph {
                    ch: ' ',
                    x0,
                    x1: glyph.x0,
                });
            }
        }
        self.font_size = self.font_size.max(glyph.size);
        self.glyphs.push(Glyph {
            ch: glyph.ch,
            x0: glyph.x0,
            x1: glyph.x1,
        });
    }

    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.ch).collect()
    }

    /// Bottom-left origin boxes of every case-insensitive occurrence of
    /// `needle` in this run.
    pub fn find(&self, needle: &[char]) -> Vec<Rect> {
        let mut hits = Vec::new();
        if needle.is_empty() || needle.len() > self.glyphs.len() {
            return hits;
        }

        let hay: Vec<char> = self.glyphs.iter().map(|g| fold_case(g.ch)).collect();
        let mut i = 0;
        while i + needle.len() <= hay.len() {
            if hay[i..i + needle.len()] == *needle {
                let first = &self.glyphs[i];
                let last = &self.glyphs[i + needle.len() - 1];
                hits.push(Rect::new(
                    first.x0,
                    self.baseline - DESCENT_RATIO * self.font_size,
                    last.x1,
                    self.baseline + ASCENT_RATIO * self.font_size,
                ));
                i += needle.len();
            } else {
                i += 1;
            }
        }
        hits
    }
}

pub fn fold_case(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

/// [`OutputDev`] that records glyph positions instead of rendering text.
#[derive(Debug, Default)]
struct GlyphCollector {
    pages: Vec<Vec<TextRun>>,
    page: Option<usize>,
}

impl GlyphCollector {
    fn place(&mut self, glyph: PlacedGlyph) {
        let Some(runs) = self.page.and_then(|index| self.pages.get_mut(index)) else {
            return;
        };
        match runs.last_mut() {
            Some(run) if run.continues_with(&glyph) => run.push(glyph),
            _ => runs.push(TextRun::start(glyph)),
        }
    }
}

impl OutputDev for GlyphCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        let index = (page_num as usize).saturating_sub(1);
        if self.pages.len() <= index {
            self.pages.resize_with(index + 1, Vec::new);
        }
        self.page = Some(index);
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        if let Some(runs) = self.page.take().and_then(|index| self.pages.get_mut(index)) {
            runs.retain(|run| run.glyphs.iter().any(|g| !g.ch.is_whitespace()));
        }
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> Result<(), OutputError> {
        let count = char.chars().count();
        if count == 0 {
            return Ok(());
        }

        // The rendering matrix maps unscaled text space, so the font size
        // still has to be applied on both axes.
        let sx = trm.m11.hypot(trm.m12);
        let sy = trm.m21.hypot(trm.m22);
        let advance = width * font_size * sx;
        let size = font_size * sy;
        let step = advance / count as f64;

        for (i, ch) in char.chars().enumerate() {
            let x0 = trm.m31 + step * i as f64;
            self.place(PlacedGlyph {
                ch,
                x0,
                x1: x0 + step,
                baseline: trm.m32,
                size,
            });
        }
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Text runs of every page in `bytes`, indexed by 0-based page number.
///
/// Always returns `page_count` entries. Pages pdf-extract cannot read come
/// back empty so the caller can still place regions that carry a bbox.
pub fn extract_page_runs(bytes: &[u8], page_count: usize) -> Vec<Vec<TextRun>> {
    let mut collector = GlyphCollector::default();

    match pdf_extract::Document::load_mem(bytes) {
        Ok(doc) => {
            // pdf_extract can panic on malformed PDFs
            let result = catch_unwind(AssertUnwindSafe(|| {
                pdf_extract::output_doc(&doc, &mut collector)
            }));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = ?e, "Text extraction stopped early"),
                Err(_) => warn!("Text extraction panicked, keeping pages read so far"),
            }
        }
        Err(e) => warn!(error = %e, "pdf-extract could not load document"),
    }

    let mut pages = collector.pages;
    pages.resize_with(page_count, Vec::new);
    debug!(
        pages = page_count,
        runs = pages.iter().map(Vec::len).sum::<usize>(),
        "Extracted text runs"
    );
    pages
}
