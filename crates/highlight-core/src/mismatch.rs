//! Mismatch records and request ingest
//!
//! A request carries mismatch groups (`item0_metadata`, `item1_metadata`),
//! each with a `mismatches` mapping of category -> filename -> entry, plus the
//! two document filenames (`item2_metadata`, `item3_metadata`). Category and
//! entry order is significant downstream, so everything is kept in insertion
//! order.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::correlator::resolve_placeholders;
use crate::error::HighlightError;
use crate::geometry::{CoordOrigin, Rect};

/// Key used upstream when a match could not be attributed to a filename.
pub const PLACEHOLDER_FILENAME: &str = "Unknown";

const MISMATCH_GROUPS: [&str; 2] = ["item0_metadata", "item1_metadata"];
const PRIMARY_GROUP: &str = "item2_metadata";
const SECONDARY_GROUP: &str = "item3_metadata";

/// Externally supplied bounding box, as `l`/`t`/`r`/`b` edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub l: f64,
    pub t: f64,
    pub r: f64,
    pub b: f64,
    pub origin: CoordOrigin,
}

impl BBox {
    /// Parse a bbox object. Returns `None` when any edge is missing or not a
    /// number, so the caller falls back to text search.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let edge = |key: &str| obj.get(key).and_then(Value::as_f64);
        let origin = obj
            .get("coord_origin")
            .and_then(Value::as_str)
            .map(CoordOrigin::parse)
            .unwrap_or_default();

        Some(Self {
            l: edge("l")?,
            t: edge("t")?,
            r: edge("r")?,
            b: edge("b")?,
            origin,
        })
    }

    /// Rectangle in top-left page coordinates.
    pub fn to_rect(&self, page_height: f64) -> Rect {
        match self.origin {
            CoordOrigin::TopLeft => Rect::new(self.l, self.t, self.r, self.b),
            CoordOrigin::BottomLeft => {
                Rect::new(self.l, page_height - self.t, self.r, page_height - self.b)
            }
        }
    }
}

/// One document's side of a mismatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentEntry {
    pub text: String,
    pub bbox: Option<BBox>,
    /// 1-indexed page the text lives on, when known.
    pub page_number: Option<u32>,
}

impl DocumentEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn on_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    fn from_value(value: &Map<String, Value>) -> Self {
        let text = match value.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let bbox = value.get("bbox").and_then(BBox::from_value);
        // Page 0 is treated as "not given".
        let page_number = value
            .get("page_no")
            .or_else(|| value.get("page_number"))
            .and_then(Value::as_u64)
            .filter(|&n| n > 0)
            .and_then(|n| u32::try_from(n).ok());

        Self {
            text,
            bbox,
            page_number,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A discrepancy for one data field, with per-document entries keyed by
/// filename.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchRecord {
    pub category: String,
    pub entries: Vec<(String, DocumentEntry)>,
}

impl MismatchRecord {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            entries: Vec::new(),
        }
    }

    /// Add or replace the entry for `filename`. Replacing keeps the entry's
    /// position; new keys are appended.
    pub fn with_entry(mut self, filename: impl Into<String>, entry: DocumentEntry) -> Self {
        self.insert(filename.into(), entry);
        self
    }

    pub fn insert(&mut self, filename: String, entry: DocumentEntry) {
        match self.entries.iter_mut().find(|(key, _)| *key == filename) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((filename, entry)),
        }
    }

    pub fn remove(&mut self, filename: &str) -> Option<DocumentEntry> {
        let pos = self.entries.iter().position(|(key, _)| key == filename)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn entry(&self, filename: &str) -> Option<&DocumentEntry> {
        self.entries
            .iter()
            .find(|(key, _)| key == filename)
            .map(|(_, entry)| entry)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entry(filename).is_some()
    }

    fn from_value(category: &str, value: &Value) -> Option<Self> {
        let Some(obj) = value.as_object() else {
            warn!(category, "Ignoring mismatch category that is not an object");
            return None;
        };
        let mut record = Self::new(category);
        for (filename, entry) in obj {
            // Non-object entries carry no text or location
            if let Some(entry) = entry.as_object() {
                record.insert(filename.clone(), DocumentEntry::from_value(entry));
            }
        }
        Some(record)
    }
}

/// Ordered collection of mismatch records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MismatchSet {
    records: Vec<MismatchRecord>,
}

impl MismatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. A record for an existing category replaces it in place.
    pub fn insert(&mut self, record: MismatchRecord) {
        match self
            .records
            .iter_mut()
            .find(|existing| existing.category == record.category)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn records(&self) -> &[MismatchRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [MismatchRecord] {
        &mut self.records
    }

    pub fn get(&self, category: &str) -> Option<&MismatchRecord> {
        self.records.iter().find(|r| r.category == category)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Merge a `category -> {filename -> entry}` mapping into the set.
    pub fn extend_from_value(&mut self, mismatches: &Map<String, Value>) {
        for (category, entries) in mismatches {
            if let Some(record) = MismatchRecord::from_value(category, entries) {
                self.insert(record);
            }
        }
    }
}

impl FromIterator<MismatchRecord> for MismatchSet {
    fn from_iter<I: IntoIterator<Item = MismatchRecord>>(iter: I) -> Self {
        let mut set = MismatchSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

/// The two documents of a request. `primary` is document A, whose text is
/// shown in callouts placed on `secondary` (document B).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentPair {
    pub primary: String,
    pub secondary: String,
}

impl DocumentPair {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    pub fn is_primary(&self, filename: &str) -> bool {
        self.primary == filename
    }
}

/// A parsed highlighting request with placeholders already resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightRequest {
    pub mismatches: MismatchSet,
    pub documents: DocumentPair,
}

impl HighlightRequest {
    /// Build a request from an already assembled mismatch set, resolving
    /// `"Unknown"` placeholders against the document pair.
    pub fn new(mut mismatches: MismatchSet, documents: DocumentPair) -> Self {
        resolve_placeholders(&mut mismatches, &documents);
        Self {
            mismatches,
            documents,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, HighlightError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| HighlightError::InvalidRequest(format!("Invalid JSON: {}", e)))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, HighlightError> {
        let root = value.as_object().ok_or_else(|| {
            HighlightError::InvalidRequest("Request JSON must be an object".to_string())
        })?;

        let mut mismatches = MismatchSet::new();
        for group in MISMATCH_GROUPS {
            match root.get(group).and_then(|g| g.get("mismatches")) {
                Some(Value::Object(map)) => mismatches.extend_from_value(map),
                Some(_) => warn!(group, "Ignoring mismatches that are not an object"),
                None => {}
            }
        }

        let filename = |group: &str| {
            root.get(group)
                .and_then(|g| g.get("filename"))
                .and_then(Value::as_str)
                .unwrap_or(PLACEHOLDER_FILENAME)
                .to_string()
        };
        let documents = DocumentPair::new(filename(PRIMARY_GROUP), filename(SECONDARY_GROUP));

        Ok(Self::new(mismatches, documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_bbox_requires_all_edges() {
        assert!(BBox::from_value(&json!({"l": 1, "t": 2, "r": 3})).is_none());
        assert!(BBox::from_value(&json!({"l": 1, "t": 2, "r": 3, "b": "x"})).is_none());
        assert!(BBox::from_value(&json!(null)).is_none());

        let bbox = BBox::from_value(&json!({"l": 1, "t": 2.5, "r": 3, "b": 4})).unwrap();
        assert_eq!(bbox.origin, CoordOrigin::TopLeft);
        assert_eq!(bbox.to_rect(100.0), Rect::new(1.0, 2.5, 3.0, 4.0));
    }

    #[test]
    fn test_bbox_bottom_left_is_flipped() {
        let bbox = BBox::from_value(
            &json!({"l": 72, "t": 712, "r": 200, "b": 700, "coord_origin": "BOTTOMLEFT"}),
        )
        .unwrap();
        let rect = bbox.to_rect(792.0);
        assert_eq!(rect, Rect::new(72.0, 80.0, 200.0, 92.0));
        assert!(rect.y0 < rect.y1);
    }

    #[test]
    fn test_entry_fields() {
        let value = json!({"text": "MSKU1234567", "page_no": 2, "bbox": {"l": 1}});
        let entry = DocumentEntry::from_value(value.as_object().unwrap());
        assert_eq!(entry.text, "MSKU1234567");
        assert_eq!(entry.page_number, Some(2));
        assert!(entry.bbox.is_none());

        let value = json!({"text": 4250, "page_no": 0});
        let entry = DocumentEntry::from_value(value.as_object().unwrap());
        assert_eq!(entry.text, "4250");
        assert_eq!(entry.page_number, None);
    }

    #[test]
    fn test_request_merges_groups_in_order() {
        let json = r#"{
            "item0_metadata": {"mismatches": {
                "seal": {"a.pdf": {"text": "S1"}},
                "weight": {"a.pdf": {"text": "100"}}
            }},
            "item1_metadata": {"mismatches": {
                "seal": {"b.pdf": {"text": "S2"}},
                "port": {"b.pdf": {"text": "Rotterdam"}}
            }},
            "item2_metadata": {"filename": "a.pdf"},
            "item3_metadata": {"filename": "b.pdf"}
        }"#;
        let request = HighlightRequest::from_json(json).unwrap();
        let categories: Vec<&str> = request
            .mismatches
            .records()
            .iter()
            .map(|r| r.category.as_str())
            .collect();
        assert_eq!(categories, vec!["seal", "weight", "port"]);
        // Later group replaces the earlier category's entries
        let seal = request.mismatches.get("seal").unwrap();
        assert!(seal.contains("b.pdf"));
        assert!(!seal.contains("a.pdf"));
        assert_eq!(request.documents, DocumentPair::new("a.pdf", "b.pdf"));
    }

    #[test]
    fn test_request_defaults_missing_filenames() {
        let request = HighlightRequest::from_json("{}").unwrap();
        assert!(request.mismatches.is_empty());
        assert_eq!(
            request.documents,
            DocumentPair::new(PLACEHOLDER_FILENAME, PLACEHOLDER_FILENAME)
        );
    }

    #[test]
    fn test_request_rejects_non_object() {
        assert!(matches!(
            HighlightRequest::from_json("[1, 2]"),
            Err(HighlightError::InvalidRequest(_))
        ));
        assert!(matches!(
            HighlightRequest::from_json("not json"),
            Err(HighlightError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_record_insert_keeps_position() {
        let mut record = MismatchRecord::new("seal")
            .with_entry("a.pdf", DocumentEntry::new("1"))
            .with_entry("b.pdf", DocumentEntry::new("2"));
        record.insert("a.pdf".to_string(), DocumentEntry::new("3"));
        assert_eq!(record.entries[0].0, "a.pdf");
        assert_eq!(record.entries[0].1.text, "3");
        assert_eq!(
            record.remove("b.pdf").map(|e| e.text),
            Some("2".to_string())
        );
        assert_eq!(record.entries.len(), 1);
    }
}
